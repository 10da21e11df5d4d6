//! The page that hosts the vendor script.
//!
//! A host can report whether the global object is already present, append a
//! script element, wait for that element's terminal event, and detach it.

use std::future::Future;
use std::sync::Arc;

use url::Url;

use crate::vendor::GlobalApi;

/// Terminal event of an injected script element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEvent {
    /// `onload` fired.
    Loaded,
    /// `onerror` fired with the given detail.
    Failed(String),
}

/// Document that scripts are injected into.
pub trait ScriptHost: Send + Sync + 'static {
    /// Global object the script installs.
    type Global: GlobalApi;

    /// Handle to an appended script element.
    type Script: Send + Sync + 'static;

    /// Returns the global object if the script has populated it.
    fn global(&self) -> Option<Arc<Self::Global>>;

    /// Creates a script element for `src` and appends it to the document.
    fn append_script(&self, src: &Url) -> Self::Script;

    /// Resolves when the element fires `onload` or `onerror`.
    fn script_event(&self, script: &Self::Script) -> impl Future<Output = ScriptEvent> + Send;

    /// Detaches the element from the document.
    fn remove_script(&self, script: Self::Script);
}
