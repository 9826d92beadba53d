use std::path::PathBuf;
use std::sync::Arc;

use sdlc_adapters::{HttpAiAdapter, RealGitAdapter, ReqwestProbeAdapter, UnconfiguredCloudAdapter};
use sdlc_coordinator::{CoordinatorWorker, StoreStatusProbe};
use sdlc_core::Config;
use sdlc_deploy::DeploymentWorker;
use sdlc_repair::RepairWorker;
use sdlc_storage::{ArtifactStore, SessionStore};
use sdlc_supervisor::{housekeeping, socket, QueueRunner, Supervisor, SupervisorDispatcher};
use sdlc_verify::VerificationWorker;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const HOUSEKEEPING_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::from_env();
    let data_dir = state_dir();
    std::fs::create_dir_all(&data_dir)?;

    let store = Arc::new(SessionStore::with_persistence(data_dir.join("sessions"))?);
    store.load_from_disk()?;
    let artifacts = Arc::new(ArtifactStore::new(data_dir.join("artifacts"))?);
    let supervisor = Arc::new(Supervisor::new(store.clone(), artifacts.clone(), config.clone()));

    let ai_base_url = std::env::var("AI_BASE_URL").unwrap_or_else(|_| "http://localhost:11434/v1".to_string());
    let ai_api_key = std::env::var("AI_API_KEY").ok();
    let ai = Arc::new(HttpAiAdapter::new(ai_base_url, ai_api_key));
    let git = Arc::new(RealGitAdapter);
    let probe = Arc::new(ReqwestProbeAdapter::default());
    // No concrete cloud provider is bundled (spec.md §1 treats it as an
    // out-of-scope external collaborator); operators who need real
    // provisioning swap this for their own `CloudAdapter` impl.
    let cloud = Arc::new(UnconfiguredCloudAdapter);

    let mut deploy_worker = DeploymentWorker::new(store.clone(), artifacts.clone(), git.clone(), cloud);
    deploy_worker.poll_interval = config.deploy_poll_interval;
    deploy_worker.timeout = config.deploy_timeout;
    let deploy_worker = Arc::new(deploy_worker);

    let mut verify_worker = VerificationWorker::new(store.clone(), git.clone(), ai.clone(), probe);
    verify_worker.model_id = config.ai_model_id.clone();
    let verify_worker = Arc::new(verify_worker);

    let mut repair_worker = RepairWorker::new(store.clone(), git, ai);
    repair_worker.model_id = config.ai_model_id.clone();
    let repair_worker = Arc::new(repair_worker);

    let dispatcher = Arc::new(SupervisorDispatcher { supervisor: supervisor.clone() });
    let probe = Arc::new(StoreStatusProbe { store: store.clone() });
    let mut coordinator = CoordinatorWorker::new(store.clone(), dispatcher, probe);
    coordinator.wall_clock_budget = config.sdlc_wall_clock;
    coordinator.max_attempts = config.sdlc_max_attempts;
    let coordinator = Arc::new(coordinator);

    let runner = QueueRunner {
        supervisor: supervisor.clone(),
        deploy_worker,
        verify_worker,
        repair_worker,
        coordinator,
        tick_interval: std::time::Duration::from_millis(200),
    };

    let cancel = CancellationToken::new();
    let queue_task = tokio::spawn(runner.run(cancel.clone()));
    let housekeeping_task = tokio::spawn(housekeeping::run(artifacts, HOUSEKEEPING_INTERVAL, cancel.clone()));

    let socket_path = socket_path();
    tokio::select! {
        result = socket::serve(&socket_path, supervisor, cancel.clone()) => result?,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
        }
    }

    cancel.cancel();
    let _ = queue_task.await;
    let _ = housekeeping_task.await;
    Ok(())
}

fn state_dir() -> PathBuf {
    std::env::var("SDLC_STATE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs::data_dir().unwrap_or_else(std::env::temp_dir).join("sdlc-control-plane"))
}

fn socket_path() -> PathBuf {
    std::env::var("SDLC_SOCKET_PATH").map(PathBuf::from).unwrap_or_else(|_| state_dir().join("sdlcd.sock"))
}
