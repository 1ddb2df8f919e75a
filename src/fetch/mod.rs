//! Fetch layer shared by every registry adapter.
//!
//! One [`Fetcher`] performs outbound requests and decodes the four content
//! families the upstreams speak: JSON, XML, HTML and raw text (optionally
//! gzip-framed). Failures are always returned; adapters choose whether to
//! degrade to an empty result.

mod client;
mod error;
mod repository;
mod xml;

pub use client::{Fetched, Fetcher, decode_text};
pub use error::FetchError;
pub use repository::{normalize_forge_url, repository_fallback};
pub use xml::{XmlDocument, XmlElement};
