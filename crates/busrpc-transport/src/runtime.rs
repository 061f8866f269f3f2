//! Runtime abstraction layer.
//!
//! Transports and the client share these aliases so the sync primitives
//! they use stay runtime-agnostic; only task spawning is tied to Tokio.

use std::future::Future;

/// A runtime-agnostic async mutex.
///
/// Uses `async-lock` for runtime-agnostic behavior across all async runtimes.
pub use async_lock::Mutex as AsyncMutex;

/// Spawn a detached background task.
pub fn spawn<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    drop(tokio::spawn(future));
}
