//! Deserialization schemas for depotpm's on-disk TOML formats.
//!
//! This crate knows the *shape* of the Project file, the Manifest file, and
//! a registry's package metadata files, but nothing about version algebra,
//! resolution, or the store. Ambiguous on-disk shapes (a `deps` table
//! written either as a name list or a name-to-uuid mapping) are modeled
//! with `serde-untagged` so a bad shape produces a real error message
//! instead of "data did not match any variant".

pub mod error;
pub mod manifest;
pub mod project;
pub mod registry;
pub mod stdlib;

pub use error::SchemaError;
