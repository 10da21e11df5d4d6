//! Lazy, single-flight loading of the vendor script and its libraries.
//!
//! ## Design
//!
//! The root loader injects the script at most once while a load is pending
//! and races the element's terminal event against a timer. The library loader
//! sits on top of it and keys single-flight by library name, so loads of
//! different libraries overlap while duplicate requests share one vendor
//! call. A failed load clears its key and the next caller tries again.
//!
//! ```ignore
//! use gapi_bridge::{LoaderConfig, ScriptLoader, CLIENT};
//!
//! let loader = ScriptLoader::new(host, LoaderConfig::google()?);
//! let global = loader.load().await?;
//! let client = loader.load_library(CLIENT).await?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::flight::SingleFlight;
use crate::host::{ScriptEvent, ScriptHost};
use crate::vendor::{GlobalApi, LibraryLoad};

/// Single-flight key of the root script.
const ROOT_KEY: &str = "gapi";

/// Library type exposed by a host's global object.
pub type LibraryOf<H> = <<H as ScriptHost>::Global as GlobalApi>::Library;

/// Loads the vendor global and its named libraries on demand.
pub struct ScriptLoader<H: ScriptHost> {
    host: Arc<H>,
    config: LoaderConfig,
    root: SingleFlight<Arc<H::Global>>,
    libraries: SingleFlight<Arc<LibraryOf<H>>>,
}

impl<H: ScriptHost> fmt::Debug for ScriptLoader<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptLoader")
            .field("config", &self.config)
            .field("loading", &self.is_loading())
            .finish_non_exhaustive()
    }
}

impl<H: ScriptHost> ScriptLoader<H> {
    /// Creates a loader for the given host.
    #[must_use]
    pub fn new(host: Arc<H>, config: LoaderConfig) -> Self {
        Self {
            host,
            config,
            root: SingleFlight::new(),
            libraries: SingleFlight::new(),
        }
    }

    /// Returns the global object, injecting the script if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Timeout`] if the script does not signal in time,
    /// [`LoadError::Script`] on a script error event, and
    /// [`LoadError::Missing`] if the script loaded without installing the
    /// global.
    pub async fn load(&self) -> Result<Arc<H::Global>, LoadError> {
        if let Some(global) = self.host.global() {
            return Ok(global);
        }

        let host = Arc::clone(&self.host);
        let src = self.config.script_url.clone();
        let limit = self.config.timeout;
        self.root
            .run(ROOT_KEY, move || inject_script(host, src, limit))
            .await
    }

    /// Returns the named library, loading the global and then the library
    /// as needed.
    ///
    /// # Errors
    ///
    /// Returns the root load error, or a library load error if the vendor
    /// reports a failure, times out, or does not attach the library.
    pub async fn load_library(&self, name: &str) -> Result<Arc<LibraryOf<H>>, LoadError> {
        let global = self.load().await?;
        if let Some(library) = global.library(name) {
            return Ok(library);
        }

        let limit = self.config.timeout;
        let owned = name.to_string();
        self.libraries
            .run(name, move || load_named(global, owned, limit))
            .await
    }

    /// Returns true while the root script load is pending.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.root.is_pending(ROOT_KEY)
    }

    /// Returns true while a load of the named library is pending.
    #[must_use]
    pub fn is_loading_library(&self, name: &str) -> bool {
        self.libraries.is_pending(name)
    }
}

async fn inject_script<H: ScriptHost>(
    host: Arc<H>,
    src: Url,
    limit: Duration,
) -> Result<Arc<H::Global>, LoadError> {
    // Another attempt may have finished between the caller's check and ours.
    if let Some(global) = host.global() {
        return Ok(global);
    }

    info!(url = %src, timeout = ?limit, "Injecting gapi script");
    let script = host.append_script(&src);
    let event = timeout(limit, host.script_event(&script)).await;

    match event {
        Ok(ScriptEvent::Loaded) => match host.global() {
            Some(global) => {
                info!("gapi loaded");
                Ok(global)
            }
            None => {
                warn!(url = %src, "Script loaded without installing gapi");
                Err(LoadError::Missing)
            }
        },
        Ok(ScriptEvent::Failed(detail)) => {
            warn!(url = %src, %detail, "gapi script error");
            host.remove_script(script);
            Err(LoadError::Script(detail))
        }
        Err(_) => {
            warn!(url = %src, timeout = ?limit, "gapi load timed out");
            host.remove_script(script);
            Err(LoadError::Timeout)
        }
    }
}

async fn load_named<G: GlobalApi>(
    global: Arc<G>,
    name: String,
    limit: Duration,
) -> Result<Arc<G::Library>, LoadError> {
    if let Some(library) = global.library(&name) {
        return Ok(library);
    }

    debug!(library = %name, "Loading gapi library");
    let outcome = timeout(limit, global.load(&name, limit))
        .await
        .unwrap_or(LibraryLoad::TimedOut);

    match outcome {
        LibraryLoad::Loaded => global.library(&name).map_or_else(
            || {
                warn!(library = %name, "Library reported loaded but is not attached");
                Err(LoadError::LibraryMissing { library: name.clone() })
            },
            |library| {
                info!(library = %name, "gapi library loaded");
                Ok(library)
            },
        ),
        LibraryLoad::Failed(detail) => {
            warn!(library = %name, %detail, "gapi library load failed");
            Err(LoadError::Library {
                library: name,
                detail,
            })
        }
        LibraryLoad::TimedOut => {
            warn!(library = %name, "gapi library load timed out");
            Err(LoadError::LibraryTimeout { library: name })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{MockHost, MockLoad, ScriptBehavior};
    use crate::vendor::{AUTH2, CLIENT};

    fn loader(host: &Arc<MockHost>) -> ScriptLoader<MockHost> {
        ScriptLoader::new(Arc::clone(host), LoaderConfig::google().unwrap())
    }

    #[tokio::test]
    async fn test_preloaded_global_has_no_side_effects() {
        let host = Arc::new(MockHost::preloaded());
        let loader = loader(&host);

        let global = loader.load().await.unwrap();
        assert!(Arc::ptr_eq(&global, &host.global().unwrap()));
        assert_eq!(host.appended(), 0);
    }

    #[tokio::test]
    async fn test_injects_script_url() {
        let host = Arc::new(MockHost::new(ScriptBehavior::Install));
        let loader = loader(&host);

        loader.load().await.unwrap();
        assert_eq!(host.appended(), 1);
        assert_eq!(
            host.last_src().unwrap().as_str(),
            crate::config::DEFAULT_SCRIPT_URL
        );

        // Already present: no second injection.
        loader.load().await.unwrap();
        assert_eq!(host.appended(), 1);
    }

    #[tokio::test]
    async fn test_loaded_without_global_fails_fast() {
        let host = Arc::new(MockHost::new(ScriptBehavior::LoadWithoutGlobal));
        let result = loader(&host).load().await;
        assert_eq!(result.unwrap_err(), LoadError::Missing);
    }

    #[tokio::test]
    async fn test_script_error_detaches_element() {
        let host = Arc::new(MockHost::new(ScriptBehavior::Error("net::ERR_BLOCKED".into())));
        let result = loader(&host).load().await;
        assert_eq!(
            result.unwrap_err(),
            LoadError::Script("net::ERR_BLOCKED".into())
        );
        assert_eq!(host.attached(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_element() {
        let host = Arc::new(MockHost::new(ScriptBehavior::Manual));
        let result = loader(&host).load().await;
        assert_eq!(result.unwrap_err(), LoadError::Timeout);
        assert_eq!(host.appended(), 1);
        assert_eq!(host.removed(), 1);
        assert_eq!(host.attached(), 0);
    }

    #[tokio::test]
    async fn test_library_already_attached() {
        let host = Arc::new(MockHost::preloaded());
        host.prepared().attach(CLIENT);
        let loader = loader(&host);

        loader.load_library(CLIENT).await.unwrap();
        assert_eq!(host.prepared().load_calls(CLIENT), 0);
    }

    #[tokio::test]
    async fn test_library_load_outcomes() {
        let host = Arc::new(MockHost::preloaded());
        let global = host.prepared();
        global.set_load(AUTH2, MockLoad::Fail("idpiframe_initialization_failed".into()));
        global.set_load(CLIENT, MockLoad::TimeOut);
        global.set_load("picker", MockLoad::Forget);
        let loader = loader(&host);

        assert_eq!(
            loader.load_library(AUTH2).await.unwrap_err().to_string(),
            "gapi auth2 load: idpiframe_initialization_failed"
        );
        assert_eq!(
            loader.load_library(CLIENT).await.unwrap_err().to_string(),
            "gapi client load: timeout"
        );
        assert_eq!(
            loader.load_library("picker").await.unwrap_err(),
            LoadError::LibraryMissing {
                library: "picker".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_library_load_that_never_calls_back_times_out() {
        let host = Arc::new(MockHost::preloaded());
        host.prepared().set_load(CLIENT, MockLoad::Hang);
        let result = loader(&host).load_library(CLIENT).await;
        assert!(result.unwrap_err().is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_library_load_pending_state() {
        let host = Arc::new(MockHost::preloaded());
        host.prepared().set_load_delay(Duration::from_millis(100));
        let loader = Arc::new(loader(&host));

        let pending = tokio::spawn({
            let loader = Arc::clone(&loader);
            async move { loader.load_library(CLIENT).await }
        });
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        assert!(loader.is_loading_library(CLIENT));
        assert!(!loader.is_loading_library(AUTH2));

        pending.await.unwrap().unwrap();
        assert!(!loader.is_loading_library(CLIENT));
    }

    #[tokio::test]
    async fn test_failed_library_load_can_be_retried() {
        let host = Arc::new(MockHost::preloaded());
        host.prepared().set_load(CLIENT, MockLoad::Fail("offline".into()));
        let loader = loader(&host);

        assert!(loader.load_library(CLIENT).await.is_err());
        host.prepared().set_load(CLIENT, MockLoad::Attach);
        assert!(loader.load_library(CLIENT).await.is_ok());
        assert_eq!(host.prepared().load_calls(CLIENT), 2);
    }
}
