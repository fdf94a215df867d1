//! Defines the custom error types used throughout the `hero_rotator_rs` crate.
//!
//! This module centralizes error handling, providing specific error enums for
//! different categories of issues (configuration, asset catalog construction,
//! presentation surface playback, prefetching), and a top-level `AppError` to
//! wrap them if needed. Each error type implements `Debug`, `Display`, and
//! `std::error::Error`, and provides `From` implementations for common
//! underlying error types.
//!
//! None of these errors is fatal to the page: the rotation core logs surface and
//! prefetch failures and carries on.

use std::error::Error as StdError;
use std::fmt;

// --- ConfigError ---
/// Errors related to configuration loading and parsing.
#[must_use = "a configuration error should be handled or propagated"]
#[derive(Debug)]
pub enum ConfigError {
    /// An I/O error occurred while trying to read the configuration file.
    Io(std::io::Error),
    /// An error occurred while parsing the configuration file content.
    Parse(String),
    /// A required configuration key was missing from the file.
    MissingKey(String),
    /// A key was present but its value could not be used.
    Invalid { key: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "Configuration parse error: {}", e),
            ConfigError::MissingKey(key) => write!(f, "Missing configuration key: '{}'", key),
            ConfigError::Invalid { key, reason } => {
                write!(f, "Invalid value for configuration key '{}': {}", key, reason)
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

// --- CatalogError ---
/// Errors raised while building an `AssetCycle`.
///
/// These are configuration mistakes, caught once at construction time.
#[must_use = "a catalog error should be handled or propagated"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The cycle has no entries.
    Empty,
    /// The same key appears twice in the cycle order.
    DuplicateKey(String),
    /// The terminal-signal key does not name any entry of the cycle.
    UnknownTerminal(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Empty => write!(f, "Asset cycle has no entries"),
            CatalogError::DuplicateKey(key) => write!(f, "Duplicate asset key in cycle: '{}'", key),
            CatalogError::UnknownTerminal(key) => {
                write!(f, "Terminal-signal key '{}' is not part of the cycle", key)
            }
        }
    }
}

impl StdError for CatalogError {}

// --- SurfaceError ---
/// Errors reported by a presentation surface.
#[must_use = "a surface error should be handled or logged"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The host refused to start playback (e.g. autoplay policy).
    PlaybackRejected(String),
    /// The playback-start request did not settle in time.
    PlaybackTimedOut,
    /// The surface has no source sub-element to swap.
    MissingSource,
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceError::PlaybackRejected(reason) => write!(f, "Playback start rejected: {}", reason),
            SurfaceError::PlaybackTimedOut => write!(f, "Playback start timed out"),
            SurfaceError::MissingSource => write!(f, "Presentation surface has no source element"),
        }
    }
}

impl StdError for SurfaceError {}

// --- PrefetchError ---
/// Errors from background prefetching. Always swallowed by the caller.
#[must_use = "a prefetch error should be handled or logged"]
#[derive(Debug)]
pub enum PrefetchError {
    /// The HTTP request for the asset failed.
    Http(reqwest::Error),
    /// No async runtime was available to run the request on.
    NoRuntime,
}

impl fmt::Display for PrefetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefetchError::Http(e) => write!(f, "Prefetch request error: {}", e),
            PrefetchError::NoRuntime => write!(f, "Prefetch skipped: no async runtime available"),
        }
    }
}

impl StdError for PrefetchError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            PrefetchError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PrefetchError {
    fn from(err: reqwest::Error) -> Self {
        PrefetchError::Http(err)
    }
}

// --- AppError (Top-level error enum) ---
/// A top-level error type that can encompass any error within the crate.
#[must_use = "an application error should be handled or propagated"]
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Catalog(CatalogError),
    Surface(SurfaceError),
    Prefetch(PrefetchError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "Application Configuration Error: {}", e),
            AppError::Catalog(e) => write!(f, "Application Catalog Error: {}", e),
            AppError::Surface(e) => write!(f, "Application Surface Error: {}", e),
            AppError::Prefetch(e) => write!(f, "Application Prefetch Error: {}", e),
        }
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::Catalog(e) => Some(e),
            AppError::Surface(e) => Some(e),
            AppError::Prefetch(e) => Some(e),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self { AppError::Config(err) }
}
impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self { AppError::Catalog(err) }
}
impl From<SurfaceError> for AppError {
    fn from(err: SurfaceError) -> Self { AppError::Surface(err) }
}
impl From<PrefetchError> for AppError {
    fn from(err: PrefetchError) -> Self { AppError::Prefetch(err) }
}
