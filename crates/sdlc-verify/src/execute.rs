use std::time::Duration;

use sdlc_adapters::HttpProbeAdapter;
use sdlc_core::payload::{TestStepResult, TestStepStatus, VerifyScenarioResult};
use tracing::warn;

use crate::generate::{GeneratedScenario, GeneratedStep};
use crate::substitute::{resolve_dotted_path, substitute, substitute_json, VariableBag};

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BODY_CHARS: usize = 500;

/// Runs one scenario's steps in order, stopping at the first `fail`
/// (spec.md §4.4). Scenarios are independent: each gets a fresh variable
/// bag, so a failure or a bound variable never crosses scenario
/// boundaries.
pub async fn execute_scenario(probe: &dyn HttpProbeAdapter, base_url: &str, scenario: &GeneratedScenario) -> VerifyScenarioResult {
    let mut bag = VariableBag::new();
    let mut results = Vec::with_capacity(scenario.steps.len());
    let mut failed = false;

    for step in &scenario.steps {
        if failed {
            results.push(TestStepResult { status: TestStepStatus::Skip, duration_ms: 0, error: None });
            continue;
        }
        let (result, response) = execute_step(probe, base_url, step, &bag).await;
        if result.status == TestStepStatus::Fail {
            failed = true;
        } else if let Some(body) = response {
            bind_store_variables(&mut bag, &body, &step.store_variables);
        }
        results.push(result);
    }

    VerifyScenarioResult { name: scenario.name.clone(), steps: results }
}

async fn execute_step(
    probe: &dyn HttpProbeAdapter,
    base_url: &str,
    step: &GeneratedStep,
    bag: &VariableBag,
) -> (TestStepResult, Option<serde_json::Value>) {
    let endpoint = substitute(&step.endpoint, bag);
    let url = resolve_url(base_url, &endpoint);
    let headers = step.headers.iter().map(|(k, v)| (k.clone(), substitute(v, bag))).collect();
    let body = step.body.as_ref().map(|b| substitute_json(b, bag));

    let start = std::time::Instant::now();
    let outcome = probe.execute(&step.method, &url, &headers, body.as_ref(), PROBE_TIMEOUT).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(response) if response.status == step.expected_status => {
            let parsed = serde_json::from_str::<serde_json::Value>(&response.body).ok();
            (TestStepResult { status: TestStepStatus::Pass, duration_ms, error: None }, parsed)
        }
        Ok(response) => {
            let truncated: String = response.body.chars().take(MAX_BODY_CHARS).collect();
            let error = format!("expected status {}, got {}: {truncated}", step.expected_status, response.status);
            (TestStepResult { status: TestStepStatus::Fail, duration_ms, error: Some(error) }, None)
        }
        Err(err) => (TestStepResult { status: TestStepStatus::Fail, duration_ms, error: Some(err.to_string()) }, None),
    }
}

fn resolve_url(base_url: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http") {
        endpoint.to_string()
    } else {
        format!("{}{}", base_url.trim_end_matches('/'), endpoint)
    }
}

fn bind_store_variables(bag: &mut VariableBag, response: &serde_json::Value, store: &std::collections::BTreeMap<String, String>) {
    for (name, path) in store {
        match resolve_dotted_path(response, path) {
            Some(value) => {
                bag.insert(name.clone(), value);
            }
            None => {
                warn!(path, "storeVariables path did not resolve in response");
                bag.insert(name.clone(), String::new());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use sdlc_adapters::FakeHttpProbeAdapter;

    use super::*;

    fn step(method: &str, endpoint: &str, expected_status: u16) -> GeneratedStep {
        GeneratedStep {
            action: "call".to_string(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            body: None,
            headers: BTreeMap::new(),
            expected_status,
            expected_response: None,
            store_variables: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn scenario_stops_on_first_failure() {
        let probe = FakeHttpProbeAdapter::new()
            .script("POST", "https://api.example.com/items", 500, "boom")
            .script("GET", "https://api.example.com/items/1", 200, "{}");
        let scenario = GeneratedScenario {
            name: "create then read".to_string(),
            description: None,
            steps: vec![step("POST", "/items", 201), step("GET", "/items/1", 200)],
        };
        let result = execute_scenario(&probe, "https://api.example.com", &scenario).await;
        assert_eq!(result.steps[0].status, TestStepStatus::Fail);
        assert_eq!(result.steps[1].status, TestStepStatus::Skip);
        assert_eq!(probe.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn stored_variable_is_substituted_into_later_step() {
        let probe = FakeHttpProbeAdapter::new()
            .script("POST", "https://api.example.com/items", 201, r#"{"id": "42"}"#)
            .script("GET", "https://api.example.com/items/42", 200, "{}");
        let mut create = step("POST", "/items", 201);
        create.store_variables.insert("id".to_string(), "response.id".to_string());
        let scenario = GeneratedScenario {
            name: "create then read".to_string(),
            description: None,
            steps: vec![create, step("GET", "/items/${id}", 200)],
        };
        let result = execute_scenario(&probe, "https://api.example.com", &scenario).await;
        assert_eq!(result.steps[0].status, TestStepStatus::Pass);
        assert_eq!(result.steps[1].status, TestStepStatus::Pass);
    }

    #[tokio::test]
    async fn absolute_endpoint_url_is_used_verbatim() {
        let probe = FakeHttpProbeAdapter::new().script("GET", "https://other.example.com/health", 200, "{}");
        let scenario = GeneratedScenario {
            name: "external health check".to_string(),
            description: None,
            steps: vec![step("GET", "https://other.example.com/health", 200)],
        };
        let result = execute_scenario(&probe, "https://api.example.com", &scenario).await;
        assert_eq!(result.steps[0].status, TestStepStatus::Pass);
    }
}
