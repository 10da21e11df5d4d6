//! In-memory host and vendor for testing code built on the loader.
//!
//! [`MockHost`] simulates a page: appending a script either installs a
//! prepared [`MockGlobal`], fails, or waits until the test fires the load
//! signal. The global, its libraries and the auth session record every call
//! so tests can assert on what the loader and facade did.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use gapi_bridge::mock::{MockHost, ScriptBehavior};
//! use gapi_bridge::{ClientConfig, Gapi};
//!
//! # tokio_test::block_on(async {
//! let host = Arc::new(MockHost::new(ScriptBehavior::Install));
//! let gapi = Gapi::new(Arc::clone(&host), ClientConfig::new("client-id")).unwrap();
//!
//! assert!(!gapi.is_signed_in().await.unwrap());
//! assert_eq!(host.appended(), 1);
//! # });
//! ```

use std::collections::{HashMap, HashSet};
use std::future::{self, Future};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use url::Url;

use crate::config::ClientConfig;
use crate::host::{ScriptEvent, ScriptHost};
use crate::request::{ApiResponse, RequestArgs};
use crate::vendor::{
    AUTH2, AuthSession, BasicProfile, GlobalApi, GoogleUser, Library, LibraryLoad, VendorError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What happens once a script element is appended to a [`MockHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptBehavior {
    /// Installs the global and fires `onload`.
    Install,
    /// Fires `onload` without installing the global.
    LoadWithoutGlobal,
    /// Fires `onerror` with the given detail.
    Error(String),
    /// Waits for [`MockHost::fire_load`] or [`MockHost::fire_error`].
    Manual,
}

/// Script element appended to a [`MockHost`].
#[derive(Debug)]
pub struct MockScript {
    id: u64,
}

/// Simulated page.
#[derive(Debug)]
pub struct MockHost {
    behavior: ScriptBehavior,
    prepared: Arc<MockGlobal>,
    installed: Mutex<Option<Arc<MockGlobal>>>,
    scripts: Mutex<HashMap<u64, Url>>,
    last_src: Mutex<Option<Url>>,
    next_id: AtomicU64,
    appended: AtomicUsize,
    removed: AtomicUsize,
    signal: watch::Sender<Option<ScriptEvent>>,
}

impl MockHost {
    /// Creates a page without the global.
    #[must_use]
    pub fn new(behavior: ScriptBehavior) -> Self {
        Self {
            behavior,
            prepared: Arc::new(MockGlobal::new()),
            installed: Mutex::new(None),
            scripts: Mutex::new(HashMap::new()),
            last_src: Mutex::new(None),
            next_id: AtomicU64::new(1),
            appended: AtomicUsize::new(0),
            removed: AtomicUsize::new(0),
            signal: watch::channel(None).0,
        }
    }

    /// Creates a page whose global is already present.
    #[must_use]
    pub fn preloaded() -> Self {
        let host = Self::new(ScriptBehavior::Install);
        host.install();
        host
    }

    /// The global this page installs (or has installed).
    #[must_use]
    pub fn prepared(&self) -> Arc<MockGlobal> {
        Arc::clone(&self.prepared)
    }

    /// Installs the global and fires `onload` on pending scripts.
    pub fn fire_load(&self) {
        self.install();
        self.signal.send_replace(Some(ScriptEvent::Loaded));
    }

    /// Fires `onerror` on pending scripts.
    pub fn fire_error(&self, detail: impl Into<String>) {
        self.signal
            .send_replace(Some(ScriptEvent::Failed(detail.into())));
    }

    /// Number of script elements ever appended.
    #[must_use]
    pub fn appended(&self) -> usize {
        self.appended.load(Ordering::SeqCst)
    }

    /// Number of script elements removed.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }

    /// Number of script elements currently in the document.
    #[must_use]
    pub fn attached(&self) -> usize {
        lock(&self.scripts).len()
    }

    /// Source of the most recently appended script.
    #[must_use]
    pub fn last_src(&self) -> Option<Url> {
        lock(&self.last_src).clone()
    }

    fn install(&self) {
        *lock(&self.installed) = Some(Arc::clone(&self.prepared));
    }
}

impl ScriptHost for MockHost {
    type Global = MockGlobal;
    type Script = MockScript;

    fn global(&self) -> Option<Arc<MockGlobal>> {
        lock(&self.installed).clone()
    }

    fn append_script(&self, src: &Url) -> MockScript {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.appended.fetch_add(1, Ordering::SeqCst);
        lock(&self.scripts).insert(id, src.clone());
        *lock(&self.last_src) = Some(src.clone());
        MockScript { id }
    }

    fn script_event(&self, _script: &MockScript) -> impl Future<Output = ScriptEvent> + Send {
        let mut signal = self.signal.subscribe();
        async move {
            match &self.behavior {
                ScriptBehavior::Install => {
                    self.install();
                    ScriptEvent::Loaded
                }
                ScriptBehavior::LoadWithoutGlobal => ScriptEvent::Loaded,
                ScriptBehavior::Error(detail) => ScriptEvent::Failed(detail.clone()),
                ScriptBehavior::Manual => {
                    let event = signal
                        .wait_for(Option::is_some)
                        .await
                        .ok()
                        .and_then(|event| event.clone());
                    match event {
                        Some(event) => event,
                        None => future::pending().await,
                    }
                }
            }
        }
    }

    fn remove_script(&self, script: MockScript) {
        if lock(&self.scripts).remove(&script.id).is_some() {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// How [`MockGlobal`] answers a named-load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockLoad {
    /// Attaches the library and calls back.
    Attach,
    /// Calls back without attaching the library.
    Forget,
    /// Calls `onerror` with the given detail.
    Fail(String),
    /// Calls `ontimeout`.
    TimeOut,
    /// Never calls back.
    Hang,
}

/// Simulated vendor global.
#[derive(Debug, Default)]
pub struct MockGlobal {
    libraries: Mutex<HashMap<String, Arc<MockLibrary>>>,
    attached: Mutex<HashSet<String>>,
    loads: Mutex<HashMap<String, MockLoad>>,
    load_calls: Mutex<HashMap<String, usize>>,
    load_delay: Mutex<Duration>,
}

impl MockGlobal {
    /// Creates a global with no libraries attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the named library, attached or not, creating it on first use.
    #[must_use]
    pub fn library_handle(&self, name: &str) -> Arc<MockLibrary> {
        Arc::clone(
            lock(&self.libraries)
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MockLibrary::new(name))),
        )
    }

    /// The `auth2` library's session.
    #[must_use]
    pub fn session(&self) -> MockSession {
        self.library_handle(AUTH2).session()
    }

    /// Attaches the named library as if it had been loaded.
    pub fn attach(&self, name: &str) {
        lock(&self.attached).insert(name.to_string());
    }

    /// Sets how loads of the named library behave (default: [`MockLoad::Attach`]).
    pub fn set_load(&self, name: &str, load: MockLoad) {
        lock(&self.loads).insert(name.to_string(), load);
    }

    /// Delays every named-load callback.
    pub fn set_load_delay(&self, delay: Duration) {
        *lock(&self.load_delay) = delay;
    }

    /// Number of named-load requests received for `name`.
    #[must_use]
    pub fn load_calls(&self, name: &str) -> usize {
        lock(&self.load_calls).get(name).copied().unwrap_or(0)
    }
}

impl GlobalApi for MockGlobal {
    type Library = MockLibrary;

    fn library(&self, name: &str) -> Option<Arc<MockLibrary>> {
        let attached = lock(&self.attached).contains(name);
        attached.then(|| self.library_handle(name))
    }

    fn load(&self, name: &str, _timeout: Duration) -> impl Future<Output = LibraryLoad> + Send {
        *lock(&self.load_calls).entry(name.to_string()).or_insert(0) += 1;
        let load = lock(&self.loads)
            .get(name)
            .cloned()
            .unwrap_or(MockLoad::Attach);
        let delay = *lock(&self.load_delay);
        let name = name.to_string();

        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match load {
                MockLoad::Attach => {
                    self.attach(&name);
                    LibraryLoad::Loaded
                }
                MockLoad::Forget => LibraryLoad::Loaded,
                MockLoad::Fail(detail) => LibraryLoad::Failed(detail),
                MockLoad::TimeOut => LibraryLoad::TimedOut,
                MockLoad::Hang => future::pending().await,
            }
        }
    }
}

/// Simulated vendor library.
#[derive(Debug)]
pub struct MockLibrary {
    name: String,
    session: MockSession,
    init_calls: AtomicUsize,
    last_config: Mutex<Option<ClientConfig>>,
    init_error: Mutex<Option<VendorError>>,
    without_session: AtomicBool,
    response: Mutex<Result<ApiResponse, VendorError>>,
    requests: Mutex<Vec<RequestArgs>>,
}

impl MockLibrary {
    /// Creates a library. Only `auth2` resolves `init` with a session.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            session: MockSession::new(),
            init_calls: AtomicUsize::new(0),
            last_config: Mutex::new(None),
            init_error: Mutex::new(None),
            without_session: AtomicBool::new(false),
            response: Mutex::new(Ok(ApiResponse {
                status: 200,
                status_text: "OK".to_string(),
                headers: HashMap::new(),
                body: "{}".to_string(),
                result: Some(json!({})),
            })),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Library name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session handle resolved by `init` when this is `auth2`.
    #[must_use]
    pub fn session(&self) -> MockSession {
        self.session.clone()
    }

    /// Makes `init` reject with `error`.
    pub fn fail_init(&self, error: VendorError) {
        *lock(&self.init_error) = Some(error);
    }

    /// Makes `init` resolve without a session handle, even for `auth2`.
    pub fn resolve_without_session(&self) {
        self.without_session.store(true, Ordering::SeqCst);
    }

    /// Sets the response returned by `request`.
    pub fn set_response(&self, response: ApiResponse) {
        *lock(&self.response) = Ok(response);
    }

    /// Makes `request` reject with `error`.
    pub fn fail_request(&self, error: VendorError) {
        *lock(&self.response) = Err(error);
    }

    /// Number of `init` calls.
    #[must_use]
    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Configuration passed to the latest `init`.
    #[must_use]
    pub fn last_config(&self) -> Option<ClientConfig> {
        lock(&self.last_config).clone()
    }

    /// Arguments of every `request`, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<RequestArgs> {
        lock(&self.requests).clone()
    }
}

impl Library for MockLibrary {
    type Session = MockSession;

    fn init(
        &self,
        config: &ClientConfig,
    ) -> impl Future<Output = Result<Option<MockSession>, VendorError>> + Send {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_config) = Some(config.clone());
        let result = match lock(&self.init_error).clone() {
            Some(error) => Err(error),
            None => Ok((self.name == AUTH2 && !self.without_session.load(Ordering::SeqCst))
                .then(|| self.session.clone())),
        };
        future::ready(result)
    }

    fn request(
        &self,
        args: RequestArgs,
    ) -> impl Future<Output = Result<ApiResponse, VendorError>> + Send {
        lock(&self.requests).push(args);
        future::ready(lock(&self.response).clone())
    }
}

#[derive(Debug)]
struct SessionState {
    signed_in: AtomicBool,
    current: Mutex<MockUser>,
    sign_in_result: Mutex<Result<MockUser, VendorError>>,
    sign_in_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
}

/// Simulated auth session. Clones share state.
#[derive(Debug, Clone)]
pub struct MockSession {
    state: Arc<SessionState>,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    /// Creates a signed-out session whose sign-in flow succeeds.
    #[must_use]
    pub fn new() -> Self {
        let user = MockUser::signed_in(MockProfile::new(
            "1",
            "Test",
            "User",
            "test.user@example.com",
        ));
        Self {
            state: Arc::new(SessionState {
                signed_in: AtomicBool::new(false),
                current: Mutex::new(MockUser::anonymous()),
                sign_in_result: Mutex::new(Ok(user)),
                sign_in_calls: AtomicUsize::new(0),
                disconnect_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Marks `user` as signed in without running the interactive flow.
    pub fn sign_in_as(&self, user: MockUser) {
        *lock(&self.state.current) = user;
        self.state.signed_in.store(true, Ordering::SeqCst);
    }

    /// Sets the user the interactive flow resolves with.
    pub fn set_sign_in_user(&self, user: MockUser) {
        *lock(&self.state.sign_in_result) = Ok(user);
    }

    /// Makes the interactive flow reject with `error`.
    pub fn fail_sign_in(&self, error: VendorError) {
        *lock(&self.state.sign_in_result) = Err(error);
    }

    /// Number of interactive flows started.
    #[must_use]
    pub fn sign_in_calls(&self) -> usize {
        self.state.sign_in_calls.load(Ordering::SeqCst)
    }

    /// Number of `disconnect` calls.
    #[must_use]
    pub fn disconnect_calls(&self) -> usize {
        self.state.disconnect_calls.load(Ordering::SeqCst)
    }
}

impl AuthSession for MockSession {
    type User = MockUser;

    fn is_signed_in(&self) -> bool {
        self.state.signed_in.load(Ordering::SeqCst)
    }

    fn current_user(&self) -> MockUser {
        lock(&self.state.current).clone()
    }

    fn sign_in(&self) -> impl Future<Output = Result<MockUser, VendorError>> + Send {
        self.state.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        let result = lock(&self.state.sign_in_result).clone();
        if let Ok(user) = &result {
            self.sign_in_as(user.clone());
        }
        future::ready(result)
    }

    fn disconnect(&self) {
        self.state.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.state.signed_in.store(false, Ordering::SeqCst);
        *lock(&self.state.current) = MockUser::anonymous();
    }
}

/// Simulated user object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockUser {
    /// Profile, or `None` for a user without profile accessors.
    pub profile: Option<MockProfile>,
}

impl MockUser {
    /// A user with the given profile.
    #[must_use]
    pub const fn signed_in(profile: MockProfile) -> Self {
        Self {
            profile: Some(profile),
        }
    }

    /// A user without profile accessors.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { profile: None }
    }
}

impl GoogleUser for MockUser {
    type Profile = MockProfile;

    fn basic_profile(&self) -> Option<MockProfile> {
        self.profile.clone()
    }
}

/// Simulated basic profile. A `None` field fails to read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockProfile {
    /// Account id.
    pub id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Given name.
    pub given_name: Option<String>,
    /// Family name.
    pub family_name: Option<String>,
    /// Avatar URL.
    pub image_url: Option<String>,
    /// Email.
    pub email: Option<String>,
}

impl MockProfile {
    /// Creates a fully readable profile.
    #[must_use]
    pub fn new(id: &str, given_name: &str, family_name: &str, email: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            name: Some(format!("{given_name} {family_name}")),
            given_name: Some(given_name.to_string()),
            family_name: Some(family_name.to_string()),
            image_url: Some(format!("https://lh3.googleusercontent.com/a/{id}")),
            email: Some(email.to_string()),
        }
    }
}

impl BasicProfile for MockProfile {
    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn given_name(&self) -> Option<String> {
        self.given_name.clone()
    }

    fn family_name(&self) -> Option<String> {
        self.family_name.clone()
    }

    fn image_url(&self) -> Option<String> {
        self.image_url.clone()
    }

    fn email(&self) -> Option<String> {
        self.email.clone()
    }
}
