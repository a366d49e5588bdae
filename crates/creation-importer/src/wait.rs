// Copyright 2026 Creation Importer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bounded "wait for predicate" primitive.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Poll `check` every `interval` until it returns `true` or `timeout` has
/// elapsed. Returns whether the predicate was satisfied.
///
/// The first check happens after one interval, so a change triggered just
/// before the call has a chance to land. Runs on tokio's clock, so tests can
/// drive it with a paused runtime.
pub async fn wait_until<F, Fut>(interval: Duration, timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        tokio::time::sleep(interval).await;
        if check().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_bound() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();
        let c = Arc::clone(&calls);
        let ok = wait_until(Duration::from_millis(80), Duration::from_millis(800), move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                false
            }
        })
        .await;

        assert!(!ok);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert!(start.elapsed() >= Duration::from_millis(800));
        assert!(start.elapsed() < Duration::from_millis(880));
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_as_soon_as_satisfied() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();
        let c = Arc::clone(&calls);
        let ok = wait_until(Duration::from_millis(80), Duration::from_millis(800), move || {
            let c = Arc::clone(&c);
            async move { c.fetch_add(1, Ordering::SeqCst) + 1 >= 3 }
        })
        .await;

        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(240));
        assert!(start.elapsed() < Duration::from_millis(320));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_checks_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let ok = wait_until(Duration::from_millis(10), Duration::ZERO, move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                false
            }
        })
        .await;
        assert!(!ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
