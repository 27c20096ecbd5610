//! Tick Index Shard: wraps one `SpatialIndex` at a fixed logical time with
//! a single-consumer inbox and a stop signal, preserving the index's
//! single-writer invariant — the index is touched only by this shard's run
//! loop, never directly by the engine.

use conj_env::EngineContext;
use tokio::sync::{mpsc, oneshot};

use crate::error::EngineError;
use crate::spatial_index::SpatialIndex;

/// A unit of work submitted to a shard: given mutable access to its index
/// and its logical time, does whatever it needs to and (typically) reports
/// results back through a channel it closed over when it was built.
pub type ShardTask = Box<dyn FnOnce(&mut SpatialIndex, f64) + Send>;

/// A running shard: owns nothing directly (the index lives inside the
/// spawned task), but holds the handles needed to submit work and retire
/// it.
pub struct Shard {
    pub t: f64,
    inbox: mpsc::Sender<ShardTask>,
    stop: Option<oneshot::Sender<()>>,
}

impl Shard {
    /// Spawns the shard's run loop via the given context (production tokio
    /// task, or the simulation harness's executor) and returns a handle to
    /// it. The inbox has capacity 1: a slow shard's backlog naturally
    /// throttles anything submitting to it.
    pub fn spawn<Ctx: EngineContext>(ctx: &Ctx, t: f64, mut index: SpatialIndex) -> Self {
        let (inbox_tx, mut inbox_rx) = mpsc::channel::<ShardTask>(1);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        ctx.spawn("tick-shard-run-loop", async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        tracing::debug!(t, "shard run loop stopping");
                        break;
                    }
                    task = inbox_rx.recv() => {
                        match task {
                            Some(task) => task(&mut index, t),
                            None => break,
                        }
                    }
                }
            }
        });

        Shard { t, inbox: inbox_tx, stop: Some(stop_tx) }
    }

    /// Submits a task to this shard's inbox, blocking (applying
    /// backpressure) until the run loop is ready to accept it.
    pub async fn submit(&self, task: ShardTask) -> Result<(), EngineError> {
        self.inbox
            .send(task)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Signals the run loop to terminate. Consumes the handle: a stopped
    /// shard cannot be resubmitted to.
    pub fn stop(mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conj_env::TokioContext;
    use std::sync::Arc;
    use tokio::sync::oneshot as std_oneshot;

    #[tokio::test]
    async fn submitted_task_runs_against_the_shards_index() {
        let ctx = Arc::new(TokioContext::new());
        let shard = Shard::spawn(ctx.as_ref(), 100.0, SpatialIndex::new(10.0));

        let (done_tx, done_rx) = std_oneshot::channel::<usize>();
        shard
            .submit(Box::new(move |index, t| {
                assert_eq!(t, 100.0);
                let _ = done_tx.send(index.key_count());
            }))
            .await
            .unwrap();

        let count = done_rx.await.unwrap();
        assert_eq!(count, 0);
        shard.stop();
    }

    #[tokio::test]
    async fn stop_terminates_the_run_loop() {
        let ctx = Arc::new(TokioContext::new());
        let shard = Shard::spawn(ctx.as_ref(), 0.0, SpatialIndex::new(10.0));
        shard.stop();
        // Run loop has exited; submitting now should fail.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
