//! Registry adapter errors.

use thiserror::Error;

use crate::fetch::FetchError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("archive error: {0}")]
    Archive(String),
}
