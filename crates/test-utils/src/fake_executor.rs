use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use devdag::dag::ScheduledTask;
use devdag::engine::RuntimeEvent;
use devdag::errors::Result;
use devdag::exec::ExecutorBackend;
use devdag::plugin::BuildResult;
use devdag::tasks::TaskOutput;
use tokio::sync::mpsc;

/// A fake executor that:
/// - records which task keys were dispatched
/// - immediately reports a successful completion for each of them.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self { runtime_tx, executed }
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);

        Box::pin(async move {
            for t in tasks {
                executed.lock().unwrap().push(t.key.clone());

                tx.send(RuntimeEvent::TaskCompleted {
                    key: t.key,
                    run_id: t.run_id,
                    outcome: Ok(TaskOutput::Build(BuildResult::default())),
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
