use std::sync::Arc;
use std::time::Duration;

use sdlc_coordinator::CoordinatorWorker;
use sdlc_deploy::DeploymentWorker;
use sdlc_repair::RepairWorker;
use sdlc_verify::VerificationWorker;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::supervisor::Supervisor;

/// The poll loop that drains due jobs off the supervisor's four queues and
/// runs each on its worker (spec.md §9 re-enqueue-with-delay, in place of
/// one long-lived task per session). Every job is `tokio::spawn`ed so a
/// slow deploy never holds up a verify that's already due.
pub struct QueueRunner {
    pub supervisor: Arc<Supervisor>,
    pub deploy_worker: Arc<DeploymentWorker>,
    pub verify_worker: Arc<VerificationWorker>,
    pub repair_worker: Arc<RepairWorker>,
    pub coordinator: Arc<CoordinatorWorker>,
    pub tick_interval: Duration,
}

impl QueueRunner {
    /// Runs until `cancel` fires. Each tick drains everything due "as of
    /// now" rather than one job per tick, so a burst of simultaneously-due
    /// jobs doesn't pile up behind the tick interval.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.tick_interval) => self.drain_due(),
                _ = cancel.cancelled() => {
                    info!("queue runner shutting down");
                    return;
                }
            }
        }
    }

    fn drain_due(&self) {
        let now = self.supervisor.clock.now_ms();

        for job in self.supervisor.queues.deploy.pop_due(now) {
            let worker = self.deploy_worker.clone();
            tokio::spawn(async move { worker.run(job).await });
        }
        for job in self.supervisor.queues.verify.pop_due(now) {
            let worker = self.verify_worker.clone();
            tokio::spawn(async move { worker.run(job).await });
        }
        for job in self.supervisor.queues.repair.pop_due(now) {
            let worker = self.repair_worker.clone();
            tokio::spawn(async move { worker.run(job).await });
        }
        for job in self.supervisor.queues.sdlc.pop_due(now) {
            let worker = self.coordinator.clone();
            tokio::spawn(async move { worker.run(job).await });
        }
    }
}
