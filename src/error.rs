//! The component-local error enums below are the semantic error kinds of
//! `spec.md` §7; [`Error`] is the single top-level enum the rest of the
//! crate converts into: one enum per component, one enum for the crate.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::version::VersionSpec;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not parse {kind}: {text:?}")]
    BadSpec { kind: &'static str, text: String },

    #[error("package has a `name` without a `uuid`, or a `uuid` without a `name`")]
    InsufficientPackageKeys,

    #[error("field `{key}` has an unexpected shape, expected {expected}")]
    UnexpectedType { key: String, expected: &'static str },

    #[error(
        "manifest entry for `{name}` has `repo-rev` without `repo-url` (or vice versa)"
    )]
    InconsistentRepoDescriptor { name: String },

    #[error(
        "manifest entry for `{name}` specifies more than one of: path, git-tree-sha1, repo descriptor"
    )]
    AmbiguousLocation { name: String },

    #[error("`{name}` matches more than one registered package: {uuids:?}")]
    AmbiguousPackage { name: String, uuids: Vec<Uuid> },

    #[error("revision `{rev}` not found in `{url}`")]
    RevNotFound { url: String, rev: String },

    #[error("hash mismatch downloading `{url}`: expected {expected}, got {actual}")]
    HashMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("no version of {package} satisfies all constraints: {summary}")]
    Unsatisfiable { package: String, summary: String },

    #[error("operation requires network access but OFFLINE is set")]
    NetworkRequired,

    #[error("interrupted")]
    Interrupted,

    #[error("registry at {path:?} has uncommitted local changes")]
    RegistryDirty { path: PathBuf },

    #[error("registry at {path:?} is not on a tracking branch")]
    RegistryDetached { path: PathBuf },

    #[error("registry defect in {package} {version}: key `{key}` has conflicting values")]
    RegistryDefect {
        package: String,
        version: String,
        key: String,
    },

    #[error("compatibility spec {spec:?} does not admit the host language version {host}")]
    IncompatibleHost { spec: VersionSpec, host: String },

    #[error(transparent)]
    Schema(#[from] depotpm_schemas::SchemaError),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Fetch(#[from] depotpm_fetch::FetchError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
