//! Configured facade over the vendor libraries.
//!
//! Every operation reloads (a no-op once loaded) and re-initializes the
//! library it needs with the facade's configuration before delegating.
//! Session state may change between calls, so initialized handles are never
//! cached.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{ClientConfig, ConfigOverride, LoaderConfig};
use crate::error::{Error, Result};
use crate::host::ScriptHost;
use crate::loader::{LibraryOf, ScriptLoader};
use crate::profile::UserProfile;
use crate::request::{ApiResponse, RequestArgs};
use crate::vendor::{AUTH2, AuthSession, CLIENT, Library};

/// Auth session type produced by a host's libraries.
pub type SessionOf<H> = <LibraryOf<H> as Library>::Session;

/// Result of initializing a library.
#[derive(Debug)]
pub enum Initialized<L: Library> {
    /// The authentication library's session handle.
    Session(L::Session),
    /// Any other library, for direct use.
    Library(Arc<L>),
}

impl<L: Library> Initialized<L> {
    /// Returns the session handle, if this is one.
    #[must_use]
    pub fn into_session(self) -> Option<L::Session> {
        match self {
            Self::Session(session) => Some(session),
            Self::Library(_) => None,
        }
    }

    /// Returns the library, if this is one.
    #[must_use]
    pub fn into_library(self) -> Option<Arc<L>> {
        match self {
            Self::Library(library) => Some(library),
            Self::Session(_) => None,
        }
    }
}

/// Google API client facade bound to a default configuration.
///
/// Instances created with [`Gapi::with_config`] share the loader, so the
/// script and each library are still loaded at most once.
pub struct Gapi<H: ScriptHost> {
    loader: Arc<ScriptLoader<H>>,
    config: ClientConfig,
}

impl<H: ScriptHost> Clone for Gapi<H> {
    fn clone(&self) -> Self {
        Self {
            loader: Arc::clone(&self.loader),
            config: self.config.clone(),
        }
    }
}

impl<H: ScriptHost> std::fmt::Debug for Gapi<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gapi")
            .field("loader", &self.loader)
            .field("client_id", &self.config.client_id)
            .field("api_key_set", &!self.config.api_key.is_empty())
            .finish()
    }
}

impl<H: ScriptHost> Gapi<H> {
    /// Creates a facade that loads Google's hosted script into `host`.
    ///
    /// The configuration is passed to the vendor as given. A configuration
    /// that fails [`ClientConfig::validate`] is logged, not rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if the script URL cannot be parsed.
    pub fn new(host: Arc<H>, config: ClientConfig) -> Result<Self> {
        if let Err(e) = config.validate() {
            warn!(error = %e, "gapi client configuration looks incomplete");
        }
        let loader = ScriptLoader::new(host, LoaderConfig::google()?);
        Ok(Self::with_loader(Arc::new(loader), config))
    }

    /// Creates a facade over an existing loader.
    #[must_use]
    pub const fn with_loader(loader: Arc<ScriptLoader<H>>, config: ClientConfig) -> Self {
        Self { loader, config }
    }

    /// Returns a facade with a different default configuration that shares
    /// this facade's loader.
    #[must_use]
    pub fn with_config(&self, config: ClientConfig) -> Self {
        Self::with_loader(Arc::clone(&self.loader), config)
    }

    /// Returns the default configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the shared loader.
    #[must_use]
    pub const fn loader(&self) -> &Arc<ScriptLoader<H>> {
        &self.loader
    }

    /// Returns the vendor global, loading the script if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the script fails to load.
    pub async fn load(&self) -> Result<Arc<H::Global>> {
        Ok(self.loader.load().await?)
    }

    /// Returns the named library, loading it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the script or the library fails to load.
    pub async fn load_library(&self, name: &str) -> Result<Arc<LibraryOf<H>>> {
        Ok(self.loader.load_library(name).await?)
    }

    /// Returns the vendor global once its `client` library is loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the script or the client library fails to load.
    pub async fn load_client(&self) -> Result<Arc<H::Global>> {
        self.loader.load_library(CLIENT).await?;
        self.load().await
    }

    /// Loads and initializes a library.
    ///
    /// `overrides` are merged over the default configuration for this call
    /// only. The authentication library resolves to its session handle; any
    /// other library resolves to itself.
    ///
    /// # Errors
    ///
    /// Returns a load error, or [`Error::Init`] if the library's `init`
    /// rejects.
    pub async fn initialize(
        &self,
        name: &str,
        overrides: Option<&ConfigOverride>,
    ) -> Result<Initialized<LibraryOf<H>>> {
        let config = overrides.map_or_else(|| self.config.clone(), |o| self.config.merge(o));
        let library = self.loader.load_library(name).await?;

        match library.init(&config).await {
            Err(e) => {
                warn!(library = name, error = %e, "gapi library init rejected");
                Err(Error::init(name))
            }
            Ok(session) if name == AUTH2 => {
                session.map(Initialized::Session).ok_or_else(|| {
                    warn!(library = name, "Auth init resolved without a session");
                    Error::init(name)
                })
            }
            Ok(_) => Ok(Initialized::Library(library)),
        }
    }

    async fn auth(&self) -> Result<SessionOf<H>> {
        self.initialize(AUTH2, None)
            .await?
            .into_session()
            .ok_or_else(|| Error::init(AUTH2))
    }

    /// Returns whether a user is signed in.
    ///
    /// # Errors
    ///
    /// Returns an error if the auth library cannot be loaded or initialized.
    pub async fn is_signed_in(&self) -> Result<bool> {
        Ok(self.auth().await?.is_signed_in())
    }

    /// Returns the signed-in user's profile, or `None` if nobody is signed in
    /// or the user has no readable profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the auth library cannot be loaded or initialized.
    pub async fn current_user(&self) -> Result<Option<UserProfile>> {
        let auth = self.auth().await?;
        if !auth.is_signed_in() {
            return Ok(None);
        }
        Ok(UserProfile::from_user(&auth.current_user()))
    }

    /// Signs a user in.
    ///
    /// If a user is already signed in their profile is returned without
    /// prompting. Otherwise the vendor's interactive flow runs.
    ///
    /// # Errors
    ///
    /// Returns the vendor's error unchanged if the user cancels or the flow
    /// fails, or a load/init error.
    pub async fn sign_in(&self) -> Result<Option<UserProfile>> {
        let auth = self.auth().await?;
        if auth.is_signed_in() {
            debug!("Already signed in");
            return Ok(UserProfile::from_user(&auth.current_user()));
        }
        let user = auth.sign_in().await?;
        Ok(UserProfile::from_user(&user))
    }

    /// Disconnects the signed-in user. Does nothing if nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns an error if the auth library cannot be loaded or initialized.
    pub async fn sign_out(&self) -> Result<()> {
        let auth = self.auth().await?;
        if auth.is_signed_in() {
            auth.disconnect();
        }
        Ok(())
    }

    /// Issues a generic API request through the vendor's client library.
    ///
    /// # Errors
    ///
    /// Returns a load/init error, or the vendor's request error unchanged.
    pub async fn request(&self, args: RequestArgs) -> Result<ApiResponse> {
        let client = self
            .initialize(CLIENT, None)
            .await?
            .into_library()
            .ok_or_else(|| Error::init(CLIENT))?;
        Ok(client.request(args).await?)
    }
}
