//! pkgsync - normalized package metadata from heterogeneous registries.
//!
//! Each upstream (crates.io, Maven-style repositories, PyPI, Debian-style
//! archives) is wrapped by an adapter that reduces its wire format to the
//! records in [`types`]. Persistence is left to the caller.

pub mod config;
pub mod fetch;
pub mod registry;
pub mod types;
