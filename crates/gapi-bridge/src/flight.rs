//! Keyed single-flight execution of asynchronous loads.
//!
//! The first caller for a key spawns the load; callers arriving while it is
//! pending subscribe to the same outcome instead of starting another one.
//! Once the load finishes its key is cleared, so the next caller starts a
//! fresh attempt.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::error::LoadError;

type Outcome<T> = Option<Result<T, LoadError>>;
type InFlight<T> = Arc<Mutex<HashMap<String, watch::Receiver<Outcome<T>>>>>;

/// Deduplicates concurrent loads per key.
///
/// Loads run on a spawned tokio task, so they complete even if every caller
/// stops waiting. Requires a tokio runtime.
#[derive(Debug)]
pub struct SingleFlight<T> {
    inflight: InFlight<T>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

fn lock<T>(inflight: &InFlight<T>) -> MutexGuard<'_, HashMap<String, watch::Receiver<Outcome<T>>>> {
    inflight.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an empty single-flight group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the load produced by `start` unless one is already pending for
    /// `key`, then waits for the shared outcome.
    ///
    /// `start` is only invoked by the caller that becomes the leader.
    ///
    /// # Errors
    ///
    /// Returns the load's error, shared by every waiter, or
    /// [`LoadError::Interrupted`] if the load task ended without an outcome.
    pub async fn run<F, Fut>(&self, key: &str, start: F) -> Result<T, LoadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LoadError>> + Send + 'static,
    {
        let mut rx = {
            let mut inflight = lock(&self.inflight);
            // A closed channel means the previous leader died; start over.
            let pending = inflight
                .get(key)
                .filter(|rx| rx.has_changed().is_ok())
                .cloned();

            if let Some(rx) = pending {
                debug!(key, "Joining in-flight load");
                rx
            } else {
                let (tx, rx) = watch::channel(None);
                inflight.insert(key.to_string(), rx.clone());

                let load = start();
                let map = Arc::clone(&self.inflight);
                let owned_key = key.to_string();
                tokio::spawn(async move {
                    let outcome = load.await;
                    lock(&map).remove(&owned_key);
                    tx.send_replace(Some(outcome));
                });
                rx
            }
        };

        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| outcome.clone());

        outcome.unwrap_or_else(|| {
            Err(LoadError::Interrupted {
                resource: key.to_string(),
            })
        })
    }

    /// Returns true if a load is pending for `key`.
    #[must_use]
    pub fn is_pending(&self, key: &str) -> bool {
        lock(&self.inflight).contains_key(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_load() {
        let flight = Arc::new(SingleFlight::<u32>::new());
        let starts = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let release_rx = Arc::new(tokio::sync::Mutex::new(Some(release_rx)));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let flight = Arc::clone(&flight);
            let starts = Arc::clone(&starts);
            let release_rx = Arc::clone(&release_rx);
            handles.push(tokio::spawn(async move {
                flight
                    .run("gapi", || {
                        starts.fetch_add(1, Ordering::SeqCst);
                        async move {
                            let rx = release_rx.lock().await.take().unwrap();
                            rx.await.unwrap();
                            Ok(7)
                        }
                    })
                    .await
            }));
        }

        tokio::task::yield_now().await;
        assert!(flight.is_pending("gapi"));
        release_tx.send(()).unwrap();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(7));
        }
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert!(!flight.is_pending("gapi"));
    }

    #[tokio::test]
    async fn test_failure_fans_out_then_clears() {
        let flight = SingleFlight::<u32>::new();

        let (a, b) = tokio::join!(
            flight.run("client", || async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(LoadError::Timeout)
            }),
            flight.run("client", || async { Ok(1) }),
        );
        assert_eq!(a, Err(LoadError::Timeout));
        assert_eq!(b, Err(LoadError::Timeout));

        let retry = flight.run("client", || async { Ok(2) }).await;
        assert_eq!(retry, Ok(2));
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let flight = SingleFlight::<&'static str>::new();
        let (a, b) = tokio::join!(
            flight.run("auth2", || async { Ok("auth2") }),
            flight.run("client", || async { Ok("client") }),
        );
        assert_eq!(a, Ok("auth2"));
        assert_eq!(b, Ok("client"));
    }

    #[tokio::test]
    async fn test_panicking_load_reports_interrupted() {
        let flight = SingleFlight::<u32>::new();
        let crash = true;
        let result = flight
            .run("gapi", || async move {
                if crash {
                    panic!("vendor script crashed");
                }
                Ok(0)
            })
            .await;
        assert_eq!(
            result,
            Err(LoadError::Interrupted {
                resource: "gapi".into()
            })
        );

        let retry = flight.run("gapi", || async { Ok(3) }).await;
        assert_eq!(retry, Ok(3));
    }
}
