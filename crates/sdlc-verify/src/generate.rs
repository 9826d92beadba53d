use std::collections::BTreeMap;

use serde::Deserialize;

use crate::discover::DiscoverReply;

/// Shape requested from the language model during the generating phase
/// (spec.md §4.4): `{tests: [{name, description, steps: [...]}]}`.
#[derive(Debug, Deserialize)]
pub struct GenerateReply {
    pub tests: Vec<GeneratedScenario>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedScenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<GeneratedStep>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedStep {
    pub action: String,
    pub endpoint: String,
    pub method: String,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub expected_status: u16,
    #[serde(default)]
    pub expected_response: Option<serde_json::Value>,
    #[serde(default)]
    pub store_variables: BTreeMap<String, String>,
}

pub fn validate_generate_reply(value: serde_json::Value) -> Result<GenerateReply, String> {
    let reply: GenerateReply = serde_json::from_value(value).map_err(|e| e.to_string())?;
    if reply.tests.is_empty() {
        return Err("tests array is empty".to_string());
    }
    Ok(reply)
}

pub fn render_generate_prompt(discovered: &DiscoverReply, scan_block: &str) -> String {
    let endpoints = serde_json::to_string(&discovered.endpoints.iter().map(|e| (&e.method, &e.path)).collect::<Vec<_>>())
        .unwrap_or_default();
    format!(
        "Discovered endpoints: {endpoints}\n\n{scan_block}\n\n\
Write an ordered suite of HTTP test scenarios covering these endpoints. \
Order steps so that creation precedes read-by-id and authentication \
precedes protected access.\n\n\
Return a single JSON object with exactly this shape and nothing else:\n\
{{\"tests\": [{{\"name\": string, \"description\": string, \"steps\": \
[{{\"action\": string, \"endpoint\": string, \"method\": string, \"body\": \
object|null, \"headers\": object, \"expectedStatus\": number, \
\"expectedResponse\": object|null, \"storeVariables\": object}}]}}]}}"
    )
}
