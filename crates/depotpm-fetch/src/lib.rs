//! Low-level HTTP download support used by depotpm's artifact cache.
//!
//! A small, dependency-light crate that knows how to talk to the network
//! and nothing about the package store, hashing, or the depot layout above
//! it.

use std::io::Write;
use std::path::Path;

use curl::easy::Easy;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL `{0}`")]
    InvalidUrl(String),

    #[error("network request to `{url}` failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: curl::Error,
    },

    #[error("`{url}` returned HTTP {status}")]
    Status { url: String, status: u32 },

    #[error("could not write downloaded content: {0}")]
    Io(#[from] std::io::Error),
}

/// Download `url` into `dest`, overwriting any existing file. The caller is
/// responsible for writing to a temp path and renaming into place (content
/// addressing and atomic install live in the main crate's ArtifactCache).
pub fn download_to_file(url: &str, dest: &Path) -> Result<(), FetchError> {
    let mut handle = Easy::new();
    handle
        .url(url)
        .map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    handle.follow_location(true).map_err(|e| FetchError::Transport {
        url: url.to_string(),
        source: e,
    })?;
    handle.fail_on_error(true).map_err(|e| FetchError::Transport {
        url: url.to_string(),
        source: e,
    })?;

    let mut file = std::fs::File::create(dest)?;
    {
        let mut transfer = handle.transfer();
        transfer
            .write_function(|data| {
                file.write_all(data)
                    .map(|_| data.len())
                    .map_err(|_| curl::easy::WriteError::Pause)
            })
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                source: e,
            })?;
        transfer.perform().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            source: e,
        })?;
    }

    let status = handle.response_code().unwrap_or(0);
    if !(200..300).contains(&status) {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }
    Ok(())
}

/// Percent-encode a URL for use as a filesystem-safe cache key component.
pub fn url_to_cache_component(url: &str) -> String {
    percent_encoding::utf8_percent_encode(url, percent_encoding::NON_ALPHANUMERIC).to_string()
}

pub fn parse_url(raw: &str) -> Result<url::Url, FetchError> {
    url::Url::parse(raw).map_err(|_| FetchError::InvalidUrl(raw.to_string()))
}
