//! Parallel and comprehensive execution
//!
//! A dispatcher pushes ready tasks onto a bounded queue shared by a fixed pool
//! of workers. The dispatcher wakes when a task finishes, or after the
//! dispatch interval as a fallback, and stops once every task was either
//! queued or skipped.

use crate::executor::EngineShared;
use crate::result::{SKIP_CONTEXT_CANCELED, SKIP_DEPENDENCIES_FAILED, SKIP_DEPENDENCIES_NOT_MET};
use std::collections::HashSet;
use std::sync::Arc;
use taskweave_core::Result;
use taskweave_utils::tracing::worker_span;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, Instrument};

pub(crate) async fn run(shared: Arc<EngineShared>) -> Result<()> {
    let total = shared.plan.len();
    let workers = shared.config.effective_workers().min(total).max(1);
    let (queue, receiver) = mpsc::channel::<String>(total);
    let receiver = Arc::new(Mutex::new(receiver));

    debug!(workers, total, "Starting worker pool");

    let mut pool = JoinSet::new();
    for worker_id in 0..workers {
        let shared = Arc::clone(&shared);
        let receiver = Arc::clone(&receiver);
        pool.spawn(worker(shared, receiver).instrument(worker_span(worker_id)));
    }

    dispatch(&shared, queue).await;

    while let Some(joined) = pool.join_next().await {
        if let Err(err) = joined {
            error!(error = %err, "Worker terminated abnormally");
        }
    }

    Ok(())
}

/// Pull task ids until the queue is closed and drained
async fn worker(shared: Arc<EngineShared>, receiver: Arc<Mutex<mpsc::Receiver<String>>>) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(task_id) = next else {
            break;
        };
        let Some(task) = shared.plan.task(&task_id) else {
            continue;
        };
        shared.process(task, SKIP_DEPENDENCIES_NOT_MET).await;
    }
}

/// Queue every task exactly once, as soon as it becomes ready
///
/// Tasks blocked by a failed dependency are skipped here and marked failed in
/// the plan, which blocks their own dependents on the next pass. Dropping
/// `queue` on return lets the workers drain and exit.
async fn dispatch(shared: &EngineShared, queue: mpsc::Sender<String>) {
    let total = shared.plan.len();
    let mut dispatched: HashSet<String> = HashSet::with_capacity(total);

    while dispatched.len() < total {
        if shared.scope.is_cancelled() {
            let pending: Vec<String> = shared
                .plan
                .tasks()
                .map(|task| task.id().to_string())
                .filter(|id| !dispatched.contains(id))
                .collect();
            debug!(pending = pending.len(), "Dispatch cancelled");
            for task_id in pending {
                shared.skip(&task_id, SKIP_CONTEXT_CANCELED);
            }
            return;
        }

        let mut progressed = false;

        for task_id in shared.plan.blocked_tasks() {
            if dispatched.insert(task_id.clone()) {
                shared.skip(&task_id, SKIP_DEPENDENCIES_FAILED);
                progressed = true;
            }
        }

        for task_id in shared.plan.ready_tasks() {
            if dispatched.contains(&task_id) {
                continue;
            }
            if queue.send(task_id.clone()).await.is_err() {
                error!(task_id = %task_id, "Worker pool closed before dispatch finished");
                return;
            }
            dispatched.insert(task_id);
            progressed = true;
        }

        if !progressed && dispatched.len() < total {
            tokio::select! {
                () = shared.progress.notified() => {}
                () = tokio::time::sleep(shared.config.dispatch_interval) => {}
                () = shared.scope.cancelled() => {}
            }
        }
    }
}
