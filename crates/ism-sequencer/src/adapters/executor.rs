//! Dispatch executors.
//!
//! [`InlineExecutor`] runs the consumer on the caller's thread and is the
//! bootstrap-mode strategy. [`TokioExecutor`] hands each job to the blocking
//! pool and reports the completion through the job's sink.

use crate::domain::{CompletionRecord, ProcessingOutcome};
use crate::ports::outbound::{DispatchExecutor, DispatchJob};
use tokio::runtime::Handle;
use tracing::error;

/// Runs consumers synchronously.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl DispatchExecutor for InlineExecutor {
    fn is_inline(&self) -> bool {
        true
    }

    fn execute(&self, job: DispatchJob) -> Option<CompletionRecord> {
        let outcome = job.consumer.consume(&job.dispatched);
        Some(CompletionRecord::new(job.dispatched.ism, outcome))
    }
}

/// Runs consumers on the tokio blocking pool.
#[derive(Clone, Debug)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Executor bound to the runtime of the calling task.
    ///
    /// Panics outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl DispatchExecutor for TokioExecutor {
    fn is_inline(&self) -> bool {
        false
    }

    fn execute(&self, job: DispatchJob) -> Option<CompletionRecord> {
        let DispatchJob {
            dispatched,
            consumer,
            sink,
        } = job;
        let ism = dispatched.ism.clone();

        self.handle.spawn(async move {
            let key = ism.key();
            let outcome = match tokio::task::spawn_blocking(move || consumer.consume(&dispatched)).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    // A panicking consumer still has to release the slot.
                    error!("[ism] Consumer for {} aborted: {}", key, err);
                    ProcessingOutcome::failed()
                }
            };
            sink.report(CompletionRecord::new(ism, outcome));
        });
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DispatchedIsm;
    use crate::ports::outbound::{CompletionSink, IsmConsumer};
    use parking_lot::Mutex;
    use shared_types::{Ism, Routing, SiteId};
    use std::sync::Arc;

    struct Fixed(ProcessingOutcome);

    impl IsmConsumer for Fixed {
        fn consume(&self, _dispatched: &DispatchedIsm) -> ProcessingOutcome {
            self.0
        }
    }

    struct Panicking;

    impl IsmConsumer for Panicking {
        fn consume(&self, _dispatched: &DispatchedIsm) -> ProcessingOutcome {
            panic!("consumer bug");
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<CompletionRecord>>);

    impl CompletionSink for Collect {
        fn report(&self, record: CompletionRecord) {
            self.0.lock().push(record);
        }
    }

    fn job(consumer: Arc<dyn IsmConsumer>, sink: Arc<Collect>) -> DispatchJob {
        DispatchJob {
            dispatched: DispatchedIsm::new(Ism::public(SiteId(1), 1, 0, Routing::Membership), 0),
            consumer,
            sink,
        }
    }

    async fn wait_for(sink: &Collect) -> CompletionRecord {
        for _ in 0..200 {
            if let Some(record) = sink.0.lock().first().cloned() {
                return record;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("no completion reported");
    }

    #[test]
    fn test_inline_returns_completion() {
        let sink = Arc::new(Collect::default());
        let record = InlineExecutor
            .execute(job(Arc::new(Fixed(ProcessingOutcome::applied())), sink.clone()))
            .unwrap();
        assert!(record.success);
        assert!(sink.0.lock().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tokio_reports_through_sink() {
        let sink = Arc::new(Collect::default());
        let executor = TokioExecutor::current();
        let returned = executor.execute(job(Arc::new(Fixed(ProcessingOutcome::failed())), sink.clone()));

        assert!(returned.is_none());
        assert!(!wait_for(&sink).await.success);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_consumer_reports_failure() {
        let sink = Arc::new(Collect::default());
        TokioExecutor::current().execute(job(Arc::new(Panicking), sink.clone()));

        let record = wait_for(&sink).await;
        assert!(!record.success);
        assert_eq!(record.ism.seq_num, 1);
    }
}
