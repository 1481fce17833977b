//! Resolves declared package dependencies into a reproducible,
//! content-addressed local environment.
//!
//! The crate is layered bottom-up: version algebra and the TOML codec at
//! the bottom, the Project/Manifest data model above that, then the
//! registry/stdlib/resolver/source/store components, with
//! [`context::Context`] tying them together for the CLI.

pub mod codec;
pub mod context;
pub mod depot;
pub mod error;
pub mod manifest;
pub mod project;
pub mod registry;
pub mod resolver;
pub mod source;
pub mod stdlib;
pub mod store;
pub mod version;

pub use error::{Error, Result};
