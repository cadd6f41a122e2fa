// SPDX-License-Identifier: MPL-2.0

//! Shared async runtime for all network operations.
//!
//! REST calls, auth requests, avatar downloads and the realtime sockets all
//! run here; the GTK main loop only ever polls for their results.

use once_cell::sync::Lazy;
use std::future::Future;
use tokio::runtime::Runtime;

/// Two workers are plenty for I/O-bound traffic.
static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("parley-async")
        .build()
        .expect("failed to create async runtime")
});

/// Spawn a future on the shared runtime without blocking.
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    RUNTIME.spawn(future)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawned_tasks_run_on_named_workers() {
        let (tx, rx) = std::sync::mpsc::channel();
        spawn(async move {
            let name = std::thread::current().name().map(str::to_string);
            let _ = tx.send(name);
        });

        let name = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        assert_eq!(name.as_deref(), Some("parley-async"));
    }
}
