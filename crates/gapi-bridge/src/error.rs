//! Error types for loading and driving the Google API client.

use crate::vendor::VendorError;

/// Result type alias for facade operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A resource (the root script or a named library) failed to become available.
///
/// Load errors are `Clone` because a single in-flight load fans its outcome
/// out to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The script did not signal within the configured bound.
    #[error("gapi load timeout")]
    Timeout,

    /// The script signalled completion but the global object is absent.
    #[error("gapi load error")]
    Missing,

    /// The script element reported an error event.
    #[error("gapi load error: {0}")]
    Script(String),

    /// The vendor's named loader reported an error.
    #[error("gapi {library} load: {detail}")]
    Library {
        /// Library name (e.g., `auth2`).
        library: String,
        /// Detail reported by the vendor.
        detail: String,
    },

    /// The vendor's named loader did not complete within the bound.
    #[error("gapi {library} load: timeout")]
    LibraryTimeout {
        /// Library name.
        library: String,
    },

    /// The vendor reported success but never attached the library.
    #[error("gapi {library} load: library not attached")]
    LibraryMissing {
        /// Library name.
        library: String,
    },

    /// The task driving the load ended without publishing an outcome.
    #[error("gapi {resource} load: interrupted")]
    Interrupted {
        /// Resource key of the abandoned load.
        resource: String,
    },
}

impl LoadError {
    /// Returns true for either timeout kind.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout | Self::LibraryTimeout { .. })
    }
}

/// Errors surfaced by the configured facade.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Root script or named library could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The library's `init` primitive rejected. The vendor detail is dropped.
    #[error("gapi {library} init failed")]
    Init {
        /// Library name.
        library: String,
    },

    /// Error returned by a vendor operation (sign-in, request), unchanged.
    #[error(transparent)]
    Vendor(#[from] VendorError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Creates an init error for the given library.
    #[must_use]
    pub fn init(library: impl Into<String>) -> Self {
        Self::Init {
            library: library.into(),
        }
    }

    /// Returns the load error if this is one.
    #[must_use]
    pub const fn as_load(&self) -> Option<&LoadError> {
        match self {
            Self::Load(e) => Some(e),
            _ => None,
        }
    }
}
