use thiserror::Error;

/// Schema-level parse failures. Component-specific errors (bad semver
/// syntax, ambiguous package location, ...) live in the main `depotpm`
/// crate, which wraps these as sources.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("could not parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("could not serialize TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("field `{key}` has an unexpected shape, expected {expected}")]
    UnexpectedType {
        key: String,
        expected: &'static str,
    },

    #[error("`name` and `uuid` must both be present or both be absent")]
    InsufficientPackageKeys,
}
