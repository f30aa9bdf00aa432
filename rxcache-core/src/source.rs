//! Asynchronous producers of fresh values.

use async_trait::async_trait;

use crate::error::SourceError;

/// A reusable producer of fresh values for one request key.
///
/// Implementations typically wrap a network or database call. The engine
/// calls [`AsyncSource::fetch`] at most once per resolved request, and only
/// when the active strategy needs a fresh value.
#[async_trait]
pub trait AsyncSource<T>: Send + Sync {
    /// Produce a fresh value.
    async fn fetch(&self) -> Result<T, SourceError>;
}
