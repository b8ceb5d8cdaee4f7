//! Call admission and graceful shutdown.
//!
//! Every call is admitted through [`Lifecycle::admit`], which hands back a
//! [`CallGuard`]. The guard lives as long as the call does (for streaming
//! calls it moves into the spawned task), so the in-flight count always
//! reflects calls that still hold a lane open.
//!
//! Shutdown happens in phases: refuse new calls, wait for in-flight calls to
//! drain, then cancel whatever is left through the shared
//! [`CancellationToken`].

use crate::server::telemetry::{
    decrement_calls_inflight, increment_calls, increment_calls_inflight, record_call_duration,
};
use core::time::Duration;
use quartet_core::{Error, call::Convention};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Instant,
};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// Tracks in-flight calls and coordinates shutdown.
#[derive(Debug)]
pub struct Lifecycle {
    accepting: AtomicBool,
    inflight: AtomicUsize,
    shutdown_token: CancellationToken,
    drain_timeout: Duration,
}

impl Lifecycle {
    pub fn new(drain_timeout: Duration) -> Self {
        Self {
            accepting: AtomicBool::new(true),
            inflight: AtomicUsize::new(0),
            shutdown_token: CancellationToken::new(),
            drain_timeout,
        }
    }

    /// Admits a new call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once shutdown has begun.
    pub fn admit(
        self: &Arc<Self>,
        method: &'static str,
        convention: Convention,
    ) -> Result<CallGuard, Error> {
        // Count first so a concurrent shutdown either sees this call or we see
        // the shutdown.
        self.inflight.fetch_add(1, Ordering::AcqRel);
        if !self.accepting.load(Ordering::Acquire) {
            self.inflight.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::ServiceShutdown);
        }

        increment_calls(method);
        increment_calls_inflight();

        #[cfg(feature = "tracing")]
        tracing::debug!("Admitted {convention} call to {method}");

        Ok(CallGuard {
            lifecycle: Arc::clone(self),
            method,
            convention,
            started: Instant::now(),
        })
    }

    /// Number of calls currently holding a [`CallGuard`].
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Token cancelled in the last phase of [`Lifecycle::shutdown`]. Handler
    /// loops race every blocking send, receive and pacing sleep against it.
    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Gracefully shuts down call handling.
    ///
    /// - Stops admitting new calls.
    /// - Waits up to the drain timeout for in-flight calls to finish.
    /// - Cancels the shared [`CancellationToken`] so remaining loops end.
    pub async fn shutdown(&self) {
        // === Phase 0: Stop accepting new calls ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new calls");
        self.accepting.store(false, Ordering::Release);

        // === Phase 1: Wait for in-flight calls to drain ===
        #[cfg(feature = "tracing")]
        tracing::info!("Draining in-flight calls ({} active)", self.inflight());
        let drain_result = timeout(self.drain_timeout, async {
            while self.inflight() > 0 {
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        match drain_result {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("All in-flight calls drained");
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Graceful drain timed out ({} calls still active)",
                    self.inflight()
                );
            }
        }

        // === Phase 2: Cancel whatever is left ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Cancelling remaining calls via shutdown token");
        self.shutdown_token.cancel();
    }
}

/// Keeps a call counted as in flight until dropped.
#[derive(Debug)]
pub struct CallGuard {
    lifecycle: Arc<Lifecycle>,
    method: &'static str,
    convention: Convention,
    started: Instant,
}

impl CallGuard {
    pub const fn method(&self) -> &'static str {
        self.method
    }

    pub const fn convention(&self) -> Convention {
        self.convention
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.lifecycle.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_calls_inflight();
        record_call_duration(self.method, self.started.elapsed().as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guards_track_inflight_calls() {
        let lifecycle = Arc::new(Lifecycle::new(Duration::from_millis(10)));
        let first = lifecycle.admit("Sum", Convention::Unary).unwrap();
        let second = lifecycle
            .admit("FindMaximum", Convention::Bidirectional)
            .unwrap();
        assert_eq!(lifecycle.inflight(), 2);
        assert_eq!(second.convention(), Convention::Bidirectional);

        drop(first);
        assert_eq!(lifecycle.inflight(), 1);
        drop(second);
        assert_eq!(lifecycle.inflight(), 0);
    }

    #[tokio::test]
    async fn shutdown_refuses_new_calls_and_cancels_token() {
        let lifecycle = Arc::new(Lifecycle::new(Duration::from_millis(10)));
        let token = lifecycle.token();

        lifecycle.shutdown().await;

        assert!(!lifecycle.is_accepting());
        assert!(token.is_cancelled());
        let err = lifecycle.admit("Greet", Convention::Unary).unwrap_err();
        assert!(matches!(err, Error::ServiceShutdown));
        assert_eq!(lifecycle.inflight(), 0);
    }

    #[tokio::test]
    async fn shutdown_waits_for_inflight_calls() {
        let lifecycle = Arc::new(Lifecycle::new(Duration::from_secs(5)));
        let guard = lifecycle
            .admit("ComputeAverage", Convention::ClientStreaming)
            .unwrap();
        let token = lifecycle.token();

        let release = tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            drop(guard);
        });

        lifecycle.shutdown().await;
        release.await.unwrap();
        assert_eq!(lifecycle.inflight(), 0);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn shutdown_gives_up_after_drain_timeout() {
        let lifecycle = Arc::new(Lifecycle::new(Duration::from_millis(60)));
        let _stuck = lifecycle
            .admit("GreetManyTimes", Convention::ServerStreaming)
            .unwrap();

        lifecycle.shutdown().await;
        assert_eq!(lifecycle.inflight(), 1);
        assert!(lifecycle.token().is_cancelled());
    }
}
