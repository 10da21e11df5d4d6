//! # gapi-bridge
//!
//! Lazy loading and configured access to Google's browser API client
//! (`gapi`).
//!
//! ## Features
//!
//! - **Single-flight script loading**: the vendor script is injected at most
//!   once while a load is pending; concurrent callers share the outcome
//! - **Named library loading**: `auth2`, `client` or any other library,
//!   deduplicated per name, bounded by a timeout
//! - **Configured facade**: per-call configuration overrides, re-initialized
//!   on every call so session state is always fresh
//! - **Auth helpers**: signed-in state, current user profile, sign in/out
//! - **Generic requests** through the vendor's REST client
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use gapi_bridge::{ClientConfig, Gapi, RequestArgs};
//!
//! let config = ClientConfig::from_env()?;
//! let gapi = Gapi::new(Arc::new(page), config)?;
//!
//! if let Some(user) = gapi.sign_in().await? {
//!     println!("Signed in as {}", user.email);
//! }
//!
//! let files = gapi
//!     .request(RequestArgs::new("https://www.googleapis.com/drive/v3/files"))
//!     .await?;
//! ```
//!
//! The page is any [`ScriptHost`]; [`mock::MockHost`] simulates one.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
pub mod config;
mod error;
pub mod flight;
pub mod host;
pub mod loader;
pub mod mock;
mod profile;
mod request;
pub mod vendor;

pub use client::{Gapi, Initialized, SessionOf};
pub use config::{ClientConfig, ConfigOverride, LoaderConfig};
pub use error::{Error, LoadError, Result};
pub use host::{ScriptEvent, ScriptHost};
pub use loader::{LibraryOf, ScriptLoader};
pub use profile::UserProfile;
pub use request::{ApiResponse, RequestArgs};
pub use vendor::{AUTH2, CLIENT, VendorError};
