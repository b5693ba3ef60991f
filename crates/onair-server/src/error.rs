//! Error types for the server binary.
//!
//! [`ServerError`] is the top-level error type that wraps all possible
//! failure modes during startup and serving.

/// Top-level error for the server binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: onair_core::ConfigError,
    },

    /// Connecting to or migrating the durable store failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: onair_store::StoreError,
    },

    /// The upstream event source could not be built.
    #[error("upstream error: {source}")]
    Upstream {
        /// The underlying source error.
        #[from]
        source: onair_events::SourceError,
    },

    /// The API server failed to bind or serve.
    #[error("api error: {source}")]
    Api {
        /// The underlying server error.
        #[from]
        source: onair_observer::ServerError,
    },
}
