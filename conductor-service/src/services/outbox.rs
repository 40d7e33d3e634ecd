use std::future::Future;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use super::metrics::record_side_effect;

/// Runs best-effort side effects (email, workbench sync) after the primary
/// write has landed. Failures are logged and counted, never returned.
#[derive(Clone, Default)]
pub struct Outbox {
    tasks: TaskTracker,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch<F>(&self, effect: &'static str, fut: F)
    where
        F: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        let span = tracing::info_span!("side_effect", effect);
        self.tasks.spawn(
            async move {
                match fut.await {
                    Ok(()) => {
                        tracing::debug!("Side effect completed");
                        record_side_effect(effect, "success");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Side effect failed");
                        record_side_effect(effect, "failure");
                    }
                }
            }
            .instrument(span),
        );
    }

    /// Wait for every dispatched side effect to finish. Used on shutdown
    /// and by tests.
    pub async fn flush(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_flush_waits_for_effects() {
        let outbox = Outbox::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = done.clone();
            outbox.dispatch("test", async move {
                tokio::task::yield_now().await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        outbox.dispatch("test", async { Err(anyhow::anyhow!("smtp down")) });

        outbox.flush().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }
}
