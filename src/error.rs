//! Error kinds surfaced across the crate.
//!
//! Modeled as a `thiserror`-derived enum rather than hand-rolled
//! `Display`/`Error` impls, matching the error-enum convention used across
//! the retrieval pack (`fondue`'s `CacheError`, `pcastone-orca`'s workspace
//! `thiserror::Error` types).

use std::fmt;

/// Errors this crate can surface.
///
/// Lookup absence and TTL expiry are *not* represented here — per §7 of the
/// specification they are "no value" results (a plain `None`), not errors.
/// `CapacityExceeded` exists for completeness with §7's error-kind table but
/// is never constructed: capacity is always enforced by eviction, never by
/// rejecting a write.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A key was expected to be present but was not found.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// A key was found but its entry had already expired.
    #[error("key expired: {0}")]
    Expired(String),

    /// Reserved for completeness with the specification's error-kind table;
    /// this crate enforces capacity through eviction and never rejects a
    /// write, so this variant is never constructed.
    #[error("capacity exceeded")]
    CapacityExceeded,

    /// A [`crate::LoadingCache`] loader (or [`crate::Cache::get_stale`]
    /// revalidation function) failed. The in-flight slot for the key is
    /// cleared before this error reaches the caller, so the next access
    /// re-races the loader rather than replaying the failure.
    #[error("loader failed for key {key}: {source}")]
    LoaderFailed {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A [`crate::Store`] I/O operation failed.
    #[error("store I/O failed: {0}")]
    StoreIoFailed(#[from] std::io::Error),

    /// [`crate::store::FileStore`] found a file it could not parse as a
    /// valid entry. The caller never sees the raw parse error: by the time
    /// this variant is constructed the corrupt file has already been
    /// deleted (self-healing, see §7).
    #[error("corrupt entry at {0}")]
    Corrupt(String),
}

impl CacheError {
    /// Wraps an arbitrary loader error for a given key.
    pub fn loader_failed<E>(key: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CacheError::LoaderFailed {
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// Wraps an arbitrary loader error that is already type-erased, useful
    /// when the caller only has a `Display`-able message rather than a
    /// concrete `std::error::Error`.
    pub fn loader_failed_msg(key: impl Into<String>, message: impl fmt::Display) -> Self {
        CacheError::LoaderFailed {
            key: key.into(),
            source: Box::new(StringError(message.to_string())),
        }
    }
}

/// A minimal `std::error::Error` wrapper around a plain message, used by
/// [`CacheError::loader_failed_msg`] when callers don't have a concrete
/// error type to wrap.
#[derive(Debug)]
struct StringError(String);

impl fmt::Display for StringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StringError {}

/// Convenience alias used throughout the crate's fallible APIs.
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_failed_preserves_source() {
        let err = CacheError::loader_failed_msg("k", "boom");
        match err {
            CacheError::LoaderFailed { key, source } => {
                assert_eq!(key, "k");
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn store_io_failed_converts_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CacheError = io_err.into();
        assert!(matches!(err, CacheError::StoreIoFailed(_)));
    }
}
