//! Process exit supervision.
//!
//! A supervisor watches one process lifetime through its exit signal and
//! invokes a handler at most once, when the process terminates. It never
//! owns or stops the process itself, and it cannot tell an intentional stop
//! from a crash: callers must detach before stopping a process on purpose,
//! or the handler fires for that exit too.

use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::capture::ExitSignal;

pub struct ProcessSupervisor {
    cancel: CancellationToken,
    watcher: JoinHandle<()>,
}

impl ProcessSupervisor {
    /// Begin observing `exit_signal`.
    ///
    /// `on_exit` runs on the supervisor's own task with the reported exit
    /// code. A supervisor covers exactly one process lifetime: once it has
    /// reported an exit it is spent, and continued supervision requires
    /// attaching a new instance to the replacement process.
    pub fn attach<F, Fut>(mut exit_signal: ExitSignal, on_exit: F) -> Self
    where
        F: FnOnce(i32) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let watcher = tokio::spawn(async move {
            let code = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                changed = exit_signal.wait_for(|code| code.is_some()) => {
                    match changed {
                        Ok(code) => (*code).unwrap_or(-1),
                        // Sender dropped without reporting an exit.
                        Err(_) => return,
                    }
                }
            };
            debug!("Supervised process exited with code {code}");
            on_exit(code).await;
        });
        Self { cancel, watcher }
    }

    /// Stop observing.
    ///
    /// Synchronizes with an in-flight exit notification: once this returns,
    /// the handler is guaranteed not to run for this attachment.
    pub async fn detach(self) {
        self.cancel.cancel();
        let _ = self.watcher.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::{mpsc, watch};

    #[tokio::test]
    async fn test_handler_fires_once_with_exit_code() {
        let (exit_tx, exit_rx) = watch::channel(None);
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

        let _supervisor = ProcessSupervisor::attach(exit_rx, move |code| async move {
            let _ = seen_tx.send(code);
        });

        exit_tx.send(Some(137)).expect("receiver alive");
        let code = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv())
            .await
            .expect("handler should fire")
            .expect("channel open");
        assert_eq!(code, 137);

        // The handler owns its sender, so once it has run the channel closes
        // and no second invocation can arrive.
        assert!(seen_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_detach_suppresses_handler() {
        let (exit_tx, exit_rx) = watch::channel(None);
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

        let supervisor = ProcessSupervisor::attach(exit_rx, move |code| async move {
            let _ = seen_tx.send(code);
        });

        supervisor.detach().await;
        let _ = exit_tx.send(Some(1));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(seen_rx.try_recv().is_err(), "handler fired after detach");
    }

    #[tokio::test]
    async fn test_already_exited_process_is_reported() {
        let (exit_tx, exit_rx) = watch::channel(Some(9));
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

        let _supervisor = ProcessSupervisor::attach(exit_rx, move |code| async move {
            let _ = seen_tx.send(code);
        });

        drop(exit_tx);
        let code = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv())
            .await
            .expect("handler should fire")
            .expect("channel open");
        assert_eq!(code, 9);
    }

    #[tokio::test]
    async fn test_dropped_sender_without_exit_is_silent() {
        let (exit_tx, exit_rx) = watch::channel::<Option<i32>>(None);
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

        let _supervisor = ProcessSupervisor::attach(exit_rx, move |code| async move {
            let _ = seen_tx.send(code);
        });

        drop(exit_tx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(seen_rx.try_recv().is_err());
    }
}
