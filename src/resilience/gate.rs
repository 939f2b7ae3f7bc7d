//! Gate wrapper: sequences allow / success / failure around a protected call.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::warn;

use crate::resilience::circuit_breaker::{Breaker, BreakerError};
use crate::resilience::registry::BreakerRegistry;

#[derive(Clone, Debug)]
pub struct Gate {
    registry: Arc<BreakerRegistry>,
}

impl Gate {
    pub fn new(registry: Arc<BreakerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        &self.registry
    }

    pub fn breaker(&self, name: &str) -> Arc<Breaker> {
        self.registry.get(name)
    }

    /// Run a fallible operation behind the breaker named `name`.
    ///
    /// A declined call becomes `E` through `From<BreakerError>` and `fut` is
    /// never polled. Errors from `fut` are recorded and returned unchanged.
    pub async fn run<T, E, Fut>(&self, name: &str, fut: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: From<BreakerError>,
    {
        self.call(name, fut, Result::is_err).await?
    }

    /// Run `fut` behind the breaker, classifying its output with `is_failure`.
    ///
    /// A panic inside `fut` is recorded as a failure and then resumed. If the
    /// returned future is dropped after admission (an outer timeout, a client
    /// disconnect), the call is recorded as a failure as well.
    pub async fn call<T, Fut, C>(
        &self,
        name: &str,
        fut: Fut,
        is_failure: C,
    ) -> Result<T, BreakerError>
    where
        Fut: Future<Output = T>,
        C: FnOnce(&T) -> bool,
    {
        let breaker = self.breaker(name);
        breaker.allow().await?;

        let mut guard = OutcomeGuard::armed(Arc::clone(&breaker));
        let outcome = AssertUnwindSafe(fut).catch_unwind().await;
        guard.disarm();

        match outcome {
            Ok(output) => {
                if is_failure(&output) {
                    breaker.on_failure().await;
                } else {
                    breaker.on_success().await;
                }
                Ok(output)
            }
            Err(panic) => {
                tracing::error!(breaker = %name, "Protected operation panicked");
                breaker.on_failure().await;
                std::panic::resume_unwind(panic)
            }
        }
    }
}

/// Records a failure if dropped while still armed.
///
/// `Drop` cannot await, so the store write is spawned onto the current runtime.
struct OutcomeGuard {
    breaker: Option<Arc<Breaker>>,
}

impl OutcomeGuard {
    fn armed(breaker: Arc<Breaker>) -> Self {
        Self {
            breaker: Some(breaker),
        }
    }

    fn disarm(&mut self) {
        self.breaker = None;
    }
}

impl Drop for OutcomeGuard {
    fn drop(&mut self) {
        let Some(breaker) = self.breaker.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(breaker = %breaker.name(), "Protected operation cancelled, recording failure");
                handle.spawn(async move {
                    breaker.on_failure().await;
                });
            }
            Err(_) => {
                warn!(
                    breaker = %breaker.name(),
                    "Protected operation cancelled outside a runtime, failure not recorded"
                );
            }
        }
    }
}
