use serde::Deserialize;

use sdlc_core::payload::DiscoveredEndpoint;

use crate::error::VerifyError;

/// Shape requested from the language model during the discovering phase
/// (spec.md §4.4): `{endpoints: [...], baseUrl?, authentication?}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverReply {
    pub endpoints: Vec<EndpointSpec>,
    pub base_url: Option<String>,
    pub authentication: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSpec {
    pub method: String,
    pub path: String,
    pub description: Option<String>,
    pub request_schema: Option<serde_json::Value>,
    pub response_schema: Option<serde_json::Value>,
    pub authentication: Option<serde_json::Value>,
}

pub fn validate_discover_reply(value: serde_json::Value) -> Result<DiscoverReply, String> {
    serde_json::from_value(value).map_err(|e| e.to_string())
}

pub fn render_discover_prompt(scan_block: &str, stack_info: &serde_json::Value) -> String {
    format!(
        "You are inspecting a deployed HTTP API and a cloned copy of its \
source. Stack info (cloud resources, possibly including a base URL):\n\
{stack_info}\n\n{scan_block}\n\n\
Return a single JSON object with exactly this shape and nothing else:\n\
{{\"endpoints\": [{{\"method\": string, \"path\": string, \"description\": \
string, \"requestSchema\": object|null, \"responseSchema\": object|null, \
\"authentication\": object|null}}], \"baseUrl\": string|null, \
\"authentication\": object|null}}"
    )
}

impl From<EndpointSpec> for DiscoveredEndpoint {
    fn from(spec: EndpointSpec) -> Self {
        DiscoveredEndpoint {
            method: spec.method,
            path: spec.path,
            description: spec.description,
            request_schema: spec.request_schema,
            response_schema: spec.response_schema,
            authentication: spec.authentication,
        }
    }
}

/// Extracts the base URL from the job's stack-info (spec.md §4.4: "the
/// absolute URL ... else concatenate to the base URL extracted from the
/// job's stack-info"). The AI-discovered `baseUrl` is informational only;
/// stack-info is the sole source of truth for where probes are sent.
pub fn extract_base_url(stack_info: &serde_json::Value) -> Result<String, VerifyError> {
    for key in ["apiUrl", "baseUrl", "endpoint"] {
        if let Some(url) = stack_info.get(key).and_then(|v| v.as_str()) {
            return Ok(url.to_string());
        }
    }
    Err(VerifyError::MissingBaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_well_formed_reply() {
        let value = serde_json::json!({
            "endpoints": [{"method": "GET", "path": "/items", "description": "list items"}],
            "baseUrl": null,
            "authentication": null,
        });
        let reply = validate_discover_reply(value).unwrap();
        assert_eq!(reply.endpoints.len(), 1);
        assert_eq!(reply.endpoints[0].method, "GET");
    }

    #[yare::parameterized(
        api_url = { "apiUrl" },
        base_url = { "baseUrl" },
        endpoint = { "endpoint" },
    )]
    fn extract_base_url_reads_each_recognized_key(key: &str) {
        let stack_info = serde_json::json!({key: "https://api.example.com"});
        let url = extract_base_url(&stack_info).unwrap();
        assert_eq!(url, "https://api.example.com");
    }

    #[test]
    fn extract_base_url_prefers_the_first_recognized_key() {
        let stack_info = serde_json::json!({"apiUrl": "https://api.example.com", "baseUrl": "https://other.example.com"});
        let url = extract_base_url(&stack_info).unwrap();
        assert_eq!(url, "https://api.example.com");
    }

    #[test]
    fn extract_base_url_fails_when_absent_from_stack_info() {
        let stack_info = serde_json::json!({});
        assert!(matches!(extract_base_url(&stack_info), Err(VerifyError::MissingBaseUrl)));
    }
}
