use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AdaptersError;

/// Result of one HTTP probe request (spec.md §4.4). Transport errors are
/// never folded into this type — they surface as `Err` so the step can
/// tell "request failed to even complete" apart from "completed with the
/// wrong status", which spec.md §4.4 records with different error text.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
}

/// Boundary around issuing HTTP requests against a deployed target
/// (spec.md §4.4). Not retried at this layer — spec.md §7 treats a
/// transport error as an immediate step failure, not a retry candidate;
/// only upstream AI/cloud calls get the exponential-backoff treatment.
#[async_trait]
pub trait HttpProbeAdapter: Send + Sync {
    async fn execute(
        &self,
        method: &str,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: Option<&serde_json::Value>,
        timeout: Duration,
    ) -> Result<ProbeResponse, AdaptersError>;
}

pub struct ReqwestProbeAdapter {
    client: reqwest::Client,
}

impl Default for ReqwestProbeAdapter {
    fn default() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait]
impl HttpProbeAdapter for ReqwestProbeAdapter {
    async fn execute(
        &self,
        method: &str,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: Option<&serde_json::Value>,
        timeout: Duration,
    ) -> Result<ProbeResponse, AdaptersError> {
        let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|e| AdaptersError::permanent("probe", format!("invalid method {method}: {e}")))?;
        let mut request = self.client.request(method, url).timeout(timeout);
        for (key, value) in headers {
            request = request.header(key, value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| AdaptersError::permanent("probe", e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(ProbeResponse { status, body })
    }
}

/// Scripted probe adapter keyed by `"METHOD url"`; each key holds a FIFO
/// queue of responses so a test can script a sequence against the same
/// endpoint (e.g. create then re-read).
#[cfg(any(test, feature = "test-support"))]
pub struct FakeHttpProbeAdapter {
    scripted: parking_lot::Mutex<std::collections::HashMap<String, std::collections::VecDeque<ScriptedReply>>>,
    pub calls: parking_lot::Mutex<Vec<(String, String)>>,
}

#[cfg(any(test, feature = "test-support"))]
pub enum ScriptedReply {
    Response(ProbeResponse),
    TransportError(String),
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeHttpProbeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl FakeHttpProbeAdapter {
    pub fn new() -> Self {
        Self { scripted: Default::default(), calls: Default::default() }
    }

    pub fn script(mut self, method: &str, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.scripted
            .get_mut()
            .entry(format!("{} {}", method.to_uppercase(), url))
            .or_default()
            .push_back(ScriptedReply::Response(ProbeResponse { status, body: body.into() }));
        self
    }

    pub fn script_error(mut self, method: &str, url: &str, message: impl Into<String>) -> Self {
        self.scripted
            .get_mut()
            .entry(format!("{} {}", method.to_uppercase(), url))
            .or_default()
            .push_back(ScriptedReply::TransportError(message.into()));
        self
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl HttpProbeAdapter for FakeHttpProbeAdapter {
    async fn execute(
        &self,
        method: &str,
        url: &str,
        _headers: &BTreeMap<String, String>,
        _body: Option<&serde_json::Value>,
        _timeout: Duration,
    ) -> Result<ProbeResponse, AdaptersError> {
        let key = format!("{} {}", method.to_uppercase(), url);
        self.calls.lock().push((method.to_string(), url.to_string()));
        let mut scripted = self.scripted.lock();
        let queue = scripted
            .get_mut(&key)
            .ok_or_else(|| AdaptersError::permanent("probe", format!("no scripted reply for {key}")))?;
        match queue.pop_front() {
            Some(ScriptedReply::Response(response)) => Ok(response),
            Some(ScriptedReply::TransportError(message)) => Err(AdaptersError::permanent("probe", message)),
            None => Err(AdaptersError::permanent("probe", format!("scripted replies exhausted for {key}"))),
        }
    }
}
