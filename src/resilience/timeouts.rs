//! Timeout enforcement for store calls.
//!
//! # Responsibilities
//! - Bound every shared-store round trip by a deadline
//! - Convert elapsed deadlines into `StoreError::Timeout`
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry,
//!   which cancels the in-flight command
//! - Timeout errors are distinct from transport errors

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::store::{StoreError, StoreResult};

/// Run `fut` with a deadline, mapping both the inner error and expiry to `StoreError`.
pub async fn with_deadline<T, E, F>(deadline: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = Result<T, E>>,
    StoreError: From<E>,
{
    match timeout(deadline, fut).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout(deadline)),
    }
}

/// Whole milliseconds, saturating, never zero.
///
/// Redis rejects `PX 0`, so sub-millisecond durations round up to 1.
pub fn millis(duration: Duration) -> u64 {
    saturating_millis(duration).max(1)
}

/// Whole milliseconds, saturating at `u64::MAX`.
pub fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
