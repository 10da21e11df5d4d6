//! The surface exposed by the vendor script once it has executed.
//!
//! The script populates a single global object. That object loads named
//! libraries on demand (`auth2`, `client`, ...), each of which must be
//! initialized with a [`ClientConfig`] before use. These traits describe only
//! what this crate calls; everything behind them (OAuth2, token handling,
//! request signing) belongs to the vendor.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::request::{ApiResponse, RequestArgs};

/// Name of the authentication library.
pub const AUTH2: &str = "auth2";

/// Name of the generic REST client library.
pub const CLIENT: &str = "client";

/// Error object produced by the vendor (`{ error, details }`).
///
/// Passed through to callers unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{error}")]
pub struct VendorError {
    /// Error code (e.g., `popup_closed_by_user`).
    pub error: String,
    /// Human-readable details, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl VendorError {
    /// Creates a vendor error with the given code.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    /// Attaches details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Outcome of the vendor's named-load primitive.
///
/// The vendor reports through one of three callbacks; exactly one fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryLoad {
    /// `callback`: the library is now attached to the global.
    Loaded,
    /// `onerror`: loading failed with the given detail.
    Failed(String),
    /// `ontimeout`: the vendor gave up waiting.
    TimedOut,
}

/// The global object installed by the vendor script.
pub trait GlobalApi: Send + Sync + 'static {
    /// Library type exposed by this global.
    type Library: Library;

    /// Returns the named library if it is already attached.
    fn library(&self, name: &str) -> Option<Arc<Self::Library>>;

    /// Asks the vendor to load a named library.
    ///
    /// `timeout` is forwarded to the vendor; callers still race the returned
    /// future against their own timer.
    fn load(&self, name: &str, timeout: Duration) -> impl Future<Output = LibraryLoad> + Send;
}

/// A named library attached to the global object.
pub trait Library: Send + Sync + 'static {
    /// Auth session type resolved by the authentication library's `init`.
    type Session: AuthSession;

    /// Initializes the library with the given configuration.
    ///
    /// The authentication library resolves with its session handle; other
    /// libraries resolve with `None`.
    fn init(
        &self,
        config: &ClientConfig,
    ) -> impl Future<Output = Result<Option<Self::Session>, VendorError>> + Send;

    /// Issues a generic REST request through the vendor's client.
    fn request(
        &self,
        args: RequestArgs,
    ) -> impl Future<Output = Result<ApiResponse, VendorError>> + Send;
}

/// The vendor's authentication session handle.
pub trait AuthSession: Send + Sync + 'static {
    /// Authenticated user type.
    type User: GoogleUser;

    /// Current signed-in flag.
    fn is_signed_in(&self) -> bool;

    /// The current user, signed in or not.
    fn current_user(&self) -> Self::User;

    /// Starts the interactive sign-in flow.
    fn sign_in(&self) -> impl Future<Output = Result<Self::User, VendorError>> + Send;

    /// Revokes the session.
    fn disconnect(&self);
}

/// A user object returned by the authentication library.
pub trait GoogleUser: Send {
    /// Profile accessor type.
    type Profile: BasicProfile;

    /// Returns the basic profile, or `None` if the user has no profile
    /// accessors (e.g., not signed in).
    fn basic_profile(&self) -> Option<Self::Profile>;
}

/// Basic profile accessors of a [`GoogleUser`].
pub trait BasicProfile {
    /// Stable account identifier.
    fn id(&self) -> Option<String>;
    /// Full display name.
    fn name(&self) -> Option<String>;
    /// Given name.
    fn given_name(&self) -> Option<String>;
    /// Family name.
    fn family_name(&self) -> Option<String>;
    /// Avatar URL.
    fn image_url(&self) -> Option<String>;
    /// Primary email address.
    fn email(&self) -> Option<String>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_error_deserialization() {
        let json = r#"{"error": "popup_closed_by_user"}"#;
        let err: VendorError = serde_json::from_str(json).unwrap();
        assert_eq!(err.error, "popup_closed_by_user");
        assert!(err.details.is_none());
        assert_eq!(err.to_string(), "popup_closed_by_user");
    }

    #[test]
    fn test_vendor_error_with_details() {
        let err = VendorError::new("idpiframe_initialization_failed")
            .with_details("Not a valid origin for the client");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["details"], "Not a valid origin for the client");
    }
}
