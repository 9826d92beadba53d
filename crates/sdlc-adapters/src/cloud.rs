use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::AdaptersError;

/// A Lambda-style function after create-or-update (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,
    pub arn: String,
    pub runtime: String,
}

/// CloudFormation-like stack status, collapsed to the terminal vocabulary
/// the Deployment Worker polls for (spec.md §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackStatus {
    InProgress(String),
    Complete(String),
    Failed(String),
}

impl StackStatus {
    pub fn from_raw(raw: &str) -> Self {
        if raw.contains("FAILED") || raw.contains("ROLLBACK") {
            StackStatus::Failed(raw.to_string())
        } else if raw == "CREATE_COMPLETE" || raw == "UPDATE_COMPLETE" {
            StackStatus::Complete(raw.to_string())
        } else {
            StackStatus::InProgress(raw.to_string())
        }
    }
}

/// One recent stack event, used to build the five-most-recent-failures
/// error context on provisioning failure (spec.md §4.3, §7).
#[derive(Debug, Clone)]
pub struct StackEvent {
    pub logical_id: String,
    pub status: String,
    pub reason: Option<String>,
}

/// Boundary around the cloud provisioning API (spec.md §2, §4.3). Only the
/// Lambda-native path is implemented per the §9 open-question decision;
/// there is deliberately no method here for shelling out to a framework
/// CLI.
#[async_trait]
pub trait CloudAdapter: Send + Sync {
    /// Creates the function's execution role if it does not already
    /// exist, returning its ARN. Idempotent: calling twice with the same
    /// name returns the same role.
    async fn ensure_execution_role(&self, role_name: &str) -> Result<String, AdaptersError>;

    /// Creates the function if absent, else updates its code. `runtime`
    /// is the fixed current host runtime (spec.md §4.3), memory/timeout
    /// are the spec-fixed 256 MiB / 30 s.
    async fn create_or_update_function(
        &self,
        name: &str,
        role_arn: &str,
        runtime: &str,
        memory_mb: u32,
        timeout_secs: u32,
        code_zip: Vec<u8>,
    ) -> Result<FunctionInfo, AdaptersError>;

    /// Submits a (possibly SAM) template as a new or updated stack, with
    /// IAM-creating capabilities enabled and the session id attached as a
    /// tag (spec.md §4.3).
    async fn submit_stack(
        &self,
        stack_name: &str,
        template_body: &str,
        tags: BTreeMap<String, String>,
    ) -> Result<(), AdaptersError>;

    async fn describe_stack_status(&self, stack_name: &str) -> Result<StackStatus, AdaptersError>;

    /// The five most recent failing resource events, newest first
    /// (spec.md §4.3, §7).
    async fn recent_failing_events(&self, stack_name: &str) -> Result<Vec<StackEvent>, AdaptersError>;

    async fn stack_outputs(&self, stack_name: &str) -> Result<BTreeMap<String, String>, AdaptersError>;
}

/// Default `CloudAdapter` wired by the supervisor binary when no real
/// provider credentials are configured. The SDLC control plane treats the
/// actual cloud SDK as an out-of-scope external collaborator (spec.md §1),
/// so this crate carries no AWS/GCP/Azure client — an operator who wants
/// real provisioning supplies their own `CloudAdapter` impl and wires it in
/// `main.rs` in place of this one. Every method fails permanently (never
/// transiently: retrying against absent credentials can't help) with a
/// message naming what's missing.
pub struct UnconfiguredCloudAdapter;

#[async_trait]
impl CloudAdapter for UnconfiguredCloudAdapter {
    async fn ensure_execution_role(&self, _role_name: &str) -> Result<String, AdaptersError> {
        Err(unconfigured("ensure execution role"))
    }

    async fn create_or_update_function(
        &self,
        _name: &str,
        _role_arn: &str,
        _runtime: &str,
        _memory_mb: u32,
        _timeout_secs: u32,
        _code_zip: Vec<u8>,
    ) -> Result<FunctionInfo, AdaptersError> {
        Err(unconfigured("create or update function"))
    }

    async fn submit_stack(
        &self,
        _stack_name: &str,
        _template_body: &str,
        _tags: BTreeMap<String, String>,
    ) -> Result<(), AdaptersError> {
        Err(unconfigured("submit stack"))
    }

    async fn describe_stack_status(&self, _stack_name: &str) -> Result<StackStatus, AdaptersError> {
        Err(unconfigured("describe stack status"))
    }

    async fn recent_failing_events(&self, _stack_name: &str) -> Result<Vec<StackEvent>, AdaptersError> {
        Err(unconfigured("list recent failing events"))
    }

    async fn stack_outputs(&self, _stack_name: &str) -> Result<BTreeMap<String, String>, AdaptersError> {
        Err(unconfigured("read stack outputs"))
    }
}

fn unconfigured(what: &str) -> AdaptersError {
    AdaptersError::permanent(what, "no CloudAdapter is configured; set cloud credentials or inject a real adapter")
}

/// In-memory cloud adapter for tests: functions and stacks are tracked in
/// maps, and a stack's status can be scripted to flip to a terminal state
/// after a configured number of polls, so poll-loop tests don't need to
/// sleep in real time.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeCloudAdapter {
    functions: parking_lot::Mutex<std::collections::HashMap<String, FunctionInfo>>,
    stacks: parking_lot::Mutex<std::collections::HashMap<String, FakeStack>>,
}

#[cfg(any(test, feature = "test-support"))]
struct FakeStack {
    polls_remaining: u32,
    terminal_status: String,
    outputs: BTreeMap<String, String>,
    failing_events: Vec<StackEvent>,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeCloudAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl FakeCloudAdapter {
    pub fn new() -> Self {
        Self { functions: parking_lot::Mutex::new(Default::default()), stacks: parking_lot::Mutex::new(Default::default()) }
    }

    /// Scripts `stack_name` to report `IN_PROGRESS` for `polls_remaining`
    /// polls, then flip to `terminal_status`.
    pub fn script_stack(
        &self,
        stack_name: &str,
        polls_remaining: u32,
        terminal_status: &str,
        outputs: BTreeMap<String, String>,
        failing_events: Vec<StackEvent>,
    ) {
        self.stacks.lock().insert(
            stack_name.to_string(),
            FakeStack { polls_remaining, terminal_status: terminal_status.to_string(), outputs, failing_events },
        );
    }

    pub fn function(&self, name: &str) -> Option<FunctionInfo> {
        self.functions.lock().get(name).cloned()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl CloudAdapter for FakeCloudAdapter {
    async fn ensure_execution_role(&self, role_name: &str) -> Result<String, AdaptersError> {
        Ok(format!("arn:aws:iam::000000000000:role/{role_name}"))
    }

    async fn create_or_update_function(
        &self,
        name: &str,
        _role_arn: &str,
        runtime: &str,
        _memory_mb: u32,
        _timeout_secs: u32,
        _code_zip: Vec<u8>,
    ) -> Result<FunctionInfo, AdaptersError> {
        let info = FunctionInfo {
            name: name.to_string(),
            arn: format!("arn:aws:lambda:us-east-1:000000000000:function:{name}"),
            runtime: runtime.to_string(),
        };
        self.functions.lock().insert(name.to_string(), info.clone());
        Ok(info)
    }

    async fn submit_stack(
        &self,
        stack_name: &str,
        _template_body: &str,
        _tags: BTreeMap<String, String>,
    ) -> Result<(), AdaptersError> {
        self.stacks.lock().entry(stack_name.to_string()).or_insert_with(|| FakeStack {
            polls_remaining: 0,
            terminal_status: "CREATE_COMPLETE".to_string(),
            outputs: BTreeMap::new(),
            failing_events: Vec::new(),
        });
        Ok(())
    }

    async fn describe_stack_status(&self, stack_name: &str) -> Result<StackStatus, AdaptersError> {
        let mut stacks = self.stacks.lock();
        let stack = stacks
            .get_mut(stack_name)
            .ok_or_else(|| AdaptersError::permanent("describe stack", format!("unknown stack {stack_name}")))?;
        if stack.polls_remaining > 0 {
            stack.polls_remaining -= 1;
            return Ok(StackStatus::from_raw("CREATE_IN_PROGRESS"));
        }
        Ok(StackStatus::from_raw(&stack.terminal_status))
    }

    async fn recent_failing_events(&self, stack_name: &str) -> Result<Vec<StackEvent>, AdaptersError> {
        Ok(self.stacks.lock().get(stack_name).map(|s| s.failing_events.clone()).unwrap_or_default())
    }

    async fn stack_outputs(&self, stack_name: &str) -> Result<BTreeMap<String, String>, AdaptersError> {
        Ok(self.stacks.lock().get(stack_name).map(|s| s.outputs.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_adapter_fails_permanently_not_transiently() {
        let adapter = UnconfiguredCloudAdapter;
        let err = adapter.ensure_execution_role("role").await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("no CloudAdapter is configured"));
    }
}
