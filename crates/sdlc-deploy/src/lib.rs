#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Deployment Worker (spec.md §4.3): clone, classify, package, provision,
//! poll to a terminal status. Phases: `cloning -> detecting -> packaging
//! -> provisioning -> polling -> terminal`.

pub mod error;
pub mod package;
pub mod provision;

use std::sync::Arc;
use std::time::Duration;

use sdlc_adapters::{CloudAdapter, GitAdapter};
use sdlc_core::{Clock, Event, EventKind, IacKind, SessionId, SystemClock, Terminal};
use sdlc_storage::{ArtifactStore, SessionStore};
use tracing::{error, info, info_span, Instrument};

pub use error::DeployError;

#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub session_id: SessionId,
    pub repo_url: String,
    pub branch: String,
    pub sub_path: Option<String>,
}

pub struct DeploymentWorker {
    pub store: Arc<SessionStore>,
    pub artifacts: Arc<ArtifactStore>,
    pub git: Arc<dyn GitAdapter>,
    pub cloud: Arc<dyn CloudAdapter>,
    pub clock: Arc<dyn Clock>,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl DeploymentWorker {
    pub fn new(
        store: Arc<SessionStore>,
        artifacts: Arc<ArtifactStore>,
        git: Arc<dyn GitAdapter>,
        cloud: Arc<dyn CloudAdapter>,
    ) -> Self {
        Self {
            store,
            artifacts,
            git,
            cloud,
            clock: Arc::new(SystemClock),
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(60 * 60),
        }
    }

    /// Runs one deploy job end to end. Always ends the session in a
    /// terminal phase and returns the worker's outcome (spec.md §8
    /// property 2); errors never propagate past this method — they are
    /// caught by the single top-level handler described in spec.md §9 and
    /// turned into a terminal event.
    pub async fn run(&self, request: DeployRequest) -> Terminal {
        let span = info_span!("session", id = %request.session_id);
        async {
            self.append(&request.session_id, EventKind::SessionCreated {
                repo_url: request.repo_url.clone(),
                branch: request.branch.clone(),
                sub_path: request.sub_path.clone(),
            });
            match self.run_inner(&request).await {
                Ok(resources) => {
                    for (name, value) in resources {
                        self.append(&request.session_id, EventKind::DeployResourceRecorded {
                            name,
                            resource: value.into(),
                        });
                    }
                    info!("deployment succeeded");
                    self.append(&request.session_id, EventKind::Terminal {
                        outcome: Terminal::Success,
                        message: "deployment succeeded".to_string(),
                        error: None,
                    });
                    Terminal::Success
                }
                Err(err) => {
                    let (message, detail) = err.terminal();
                    error!(error = %detail, "deployment failed");
                    self.append(&request.session_id, EventKind::Terminal {
                        outcome: Terminal::Failed,
                        message,
                        error: Some(detail),
                    });
                    Terminal::Failed
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_inner(
        &self,
        request: &DeployRequest,
    ) -> Result<provision::DeployedResources, DeployError> {
        self.set_phase(&request.session_id, "cloning");
        let clone_dir = tempfile::tempdir()?;
        self.git.shallow_clone(&request.repo_url, &request.branch, clone_dir.path()).await?;

        let root = match &request.sub_path {
            Some(sub_path) => {
                let candidate = clone_dir.path().join(sub_path);
                if !candidate.is_dir() {
                    return Err(DeployError::SubPathNotFound { sub_path: sub_path.clone() });
                }
                candidate
            }
            None => clone_dir.path().to_path_buf(),
        };

        self.set_phase(&request.session_id, "detecting");
        let snapshot = package::build_snapshot(&root)?;
        let iac_kind = sdlc_classify::classify(&snapshot);
        self.append(&request.session_id, EventKind::DeployIacDetected { iac_kind });
        if iac_kind.requires_external_cli() || iac_kind == IacKind::Unknown {
            return Err(DeployError::UnsupportedIac { iac_kind: iac_kind.to_string() });
        }

        self.set_phase(&request.session_id, "packaging");
        let session_id_str = request.session_id.as_str().to_string();
        let resources = match iac_kind {
            IacKind::SimpleLambda => {
                let archive = package::zip_directory(&root)?;
                let key = format!("deployments/{session_id_str}/function.zip");
                self.artifacts.put(&key, &archive)?;
                self.append(&request.session_id, EventKind::DeployArtifactPackaged { artifact_key: key });

                self.set_phase(&request.session_id, "provisioning");
                provision::provision_simple_lambda(self.cloud.as_ref(), &session_id_str, archive).await?
            }
            IacKind::Sam => {
                let (_, template_text) = package::locate_template(&root)
                    .ok_or_else(|| DeployError::PackageIntegrity("no template file found".to_string()))?;
                let rewritten = package::package_sam(&root, &template_text, &self.artifacts, &session_id_str)?;
                self.append(&request.session_id, EventKind::DeployArtifactPackaged {
                    artifact_key: format!("deployments/{session_id_str}/functions/"),
                });

                self.set_phase(&request.session_id, "provisioning");
                self.set_phase(&request.session_id, "polling");
                let stack_name = format!("sam-deploy-{}", short_prefix(&session_id_str));
                provision::provision_stack(
                    self.cloud.as_ref(),
                    &stack_name,
                    &rewritten,
                    &session_id_str,
                    self.poll_interval,
                    self.timeout,
                )
                .await?
            }
            IacKind::Cloudformation => {
                let (_, template_text) = package::locate_template(&root)
                    .ok_or_else(|| DeployError::PackageIntegrity("no template file found".to_string()))?;

                self.set_phase(&request.session_id, "provisioning");
                self.set_phase(&request.session_id, "polling");
                let stack_name = format!("cloudformation-deploy-{}", short_prefix(&session_id_str));
                provision::provision_stack(
                    self.cloud.as_ref(),
                    &stack_name,
                    &template_text,
                    &session_id_str,
                    self.poll_interval,
                    self.timeout,
                )
                .await?
            }
            IacKind::Cdk | IacKind::Terraform | IacKind::Serverless | IacKind::Unknown => unreachable!("rejected above"),
        };

        Ok(resources)
    }

    fn set_phase(&self, session_id: &SessionId, phase: &str) {
        info!(phase, "deploy phase");
        self.append(session_id, EventKind::PhaseChanged { phase: phase.to_string() });
    }

    fn append(&self, session_id: &SessionId, kind: EventKind) {
        let timestamp_ms = self.clock.now_ms();
        if let Err(err) = self.store.append(Event::new(session_id.clone(), timestamp_ms, kind)) {
            error!(%err, "failed to append session event");
        }
    }
}

fn short_prefix(session_id: &str) -> String {
    session_id.rsplit('-').next().unwrap_or(session_id).chars().take(8).collect()
}
