use std::collections::BTreeMap;
use std::time::Duration;

use sdlc_adapters::{retry_transient, CloudAdapter, StackEvent, StackStatus};

use crate::error::DeployError;

pub const LAMBDA_RUNTIME: &str = "nodejs20.x";
pub const LAMBDA_MEMORY_MB: u32 = 256;
pub const LAMBDA_TIMEOUT_SECS: u32 = 30;
const ROLE_PROPAGATION_DELAY: Duration = Duration::from_secs(10);
const CLOUD_RETRY_ATTEMPTS: u32 = 3;
const CLOUD_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Outcome of a successful provisioning call: resource name -> identifier,
/// matching the deployed-resources map of spec.md §3.
pub type DeployedResources = BTreeMap<String, String>;

/// Creates (or updates) a single simple-lambda function (spec.md §4.3).
/// Sleeps for the role-propagation delay between role creation and
/// function creation, as a real IAM role needs time to become assumable.
pub async fn provision_simple_lambda(
    cloud: &dyn CloudAdapter,
    session_id: &str,
    code_zip: Vec<u8>,
) -> Result<DeployedResources, DeployError> {
    let role_name = format!("sdlc-exec-{session_id}");
    let role_arn = with_cloud_retry("ensure execution role", || cloud.ensure_execution_role(&role_name)).await?;
    tokio::time::sleep(ROLE_PROPAGATION_DELAY).await;

    let function_name = format!("deployed-lambda-{}", short_token(session_id));
    let info = with_cloud_retry("create or update function", || {
        cloud.create_or_update_function(
            &function_name,
            &role_arn,
            LAMBDA_RUNTIME,
            LAMBDA_MEMORY_MB,
            LAMBDA_TIMEOUT_SECS,
            code_zip.clone(),
        )
    })
    .await?;

    let mut resources = DeployedResources::new();
    resources.insert("functionName".to_string(), info.name);
    resources.insert("functionArn".to_string(), info.arn);
    resources.insert("runtime".to_string(), info.runtime);
    Ok(resources)
}

/// First 8 characters of the session id's uniqueness token, used to build
/// the `deployed-lambda-<8>` function name from scenario 1 (spec.md §8).
fn short_token(session_id: &str) -> String {
    session_id.rsplit('-').next().unwrap_or(session_id).chars().take(8).collect()
}

/// Submits a stack (SAM or CloudFormation) and polls it to a terminal
/// status, per spec.md §4.3: 10s poll interval, 60min timeout, terminal
/// success on `CREATE_COMPLETE`/`UPDATE_COMPLETE`, terminal failure on any
/// status containing `FAILED` or `ROLLBACK`.
pub async fn provision_stack(
    cloud: &dyn CloudAdapter,
    stack_name: &str,
    template_body: &str,
    session_id: &str,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<DeployedResources, DeployError> {
    let tags = BTreeMap::from([("session_id".to_string(), session_id.to_string())]);
    with_cloud_retry("submit stack", || cloud.submit_stack(stack_name, template_body, tags.clone())).await?;

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match with_cloud_retry("describe stack status", || cloud.describe_stack_status(stack_name)).await? {
            StackStatus::Complete(_) => {
                let outputs = with_cloud_retry("read stack outputs", || cloud.stack_outputs(stack_name)).await?;
                return Ok(outputs.into_iter().collect());
            }
            StackStatus::Failed(status) => {
                let events =
                    with_cloud_retry("list recent failing events", || cloud.recent_failing_events(stack_name)).await?;
                return Err(DeployError::Provisioning(format_failure(&status, &events)));
            }
            StackStatus::InProgress(_) => {}
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(DeployError::Timeout(timeout));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Wraps one cloud-API call with spec.md §7's transient-external backoff
/// ("cloud API throttle ... retry at most 3 times with exponential
/// backoff"). Permanent failures (bad credentials, stack not found) pass
/// through on the first attempt.
async fn with_cloud_retry<F, Fut, T>(what: &str, op: F) -> Result<T, DeployError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, sdlc_adapters::AdaptersError>>,
{
    Ok(retry_transient(what, CLOUD_RETRY_ATTEMPTS, CLOUD_RETRY_BASE_DELAY, op).await?)
}

fn format_failure(status: &str, events: &[StackEvent]) -> String {
    let mut message = format!("stack reached {status}");
    if !events.is_empty() {
        message.push_str("; recent failing resources: ");
        let details: Vec<String> = events
            .iter()
            .take(5)
            .map(|e| match &e.reason {
                Some(reason) => format!("{} ({}: {})", e.logical_id, e.status, reason),
                None => format!("{} ({})", e.logical_id, e.status),
            })
            .collect();
        message.push_str(&details.join(", "));
    }
    message
}
