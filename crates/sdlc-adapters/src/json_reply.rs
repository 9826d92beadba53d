use std::time::Duration;

use crate::ai::AiAdapter;
use crate::error::AdaptersError;
use crate::retry::retry_transient;

const AI_RETRY_ATTEMPTS: u32 = 3;
const AI_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Scans `text` for the first top-level `{...}` substring and parses it as
/// JSON, tracking brace depth so nested braces and braces inside string
/// literals don't end the scan early (spec.md §9 "dynamic JSON from the
/// language model").
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return serde_json::from_str(&text[start..end]).ok();
                }
            }
            _ => {}
        }
    }
    None
}

/// Sends `prompt` to the model, extracts the first top-level JSON object
/// from the reply, and validates it with `validate`. On extraction or
/// validation failure, retries once with the same prompt and gives up
/// after that (spec.md §9: "fail fast on mismatch with a single retry. Do
/// not attempt recovery beyond one retry."). The completion call itself is
/// additionally wrapped in the transient-failure backoff of spec.md §7
/// ("AI rate-limit ... retry at most 3 times with exponential backoff") —
/// a 429 or 5xx from the model never counts against the one-retry shape
/// budget above.
pub async fn complete_json_with_retry<T>(
    ai: &dyn AiAdapter,
    model_id: &str,
    prompt: &str,
    validate: impl Fn(serde_json::Value) -> Result<T, String>,
) -> Result<T, AdaptersError> {
    for attempt in 0..2 {
        let reply = retry_transient(
            "ai completion",
            AI_RETRY_ATTEMPTS,
            AI_RETRY_BASE_DELAY,
            || ai.complete(model_id, prompt),
        )
        .await?;
        let outcome = extract_json_object(&reply).ok_or_else(|| "no JSON object found in reply".to_string()).and_then(&validate);
        match outcome {
            Ok(value) => return Ok(value),
            Err(message) if attempt == 0 => {
                tracing::warn!(error = %message, "AI reply rejected, retrying once");
            }
            Err(message) => return Err(AdaptersError::permanent("ai reply shape", message)),
        }
    }
    unreachable!("loop always returns on its second iteration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        ignores_nested_and_stringified_braces = {
            "sure, here you go: {\"a\": {\"b\": 1}, \"c\": \"}\"} trailing text",
            Some(serde_json::json!({"a": {"b": 1}, "c": "}"})),
        },
        no_object_present = { "no braces here", None },
        picks_first_of_multiple_objects = {
            "{\"first\": 1} then {\"second\": 2}",
            Some(serde_json::json!({"first": 1})),
        },
    )]
    fn extract_json_object_cases(text: &str, expected: Option<serde_json::Value>) {
        assert_eq!(extract_json_object(text), expected);
    }

    #[tokio::test]
    async fn retries_once_then_gives_up() {
        let ai = crate::ai::FakeAiAdapter::new(vec!["not json".to_string(), "still not json".to_string()]);
        let result = complete_json_with_retry(&ai, "model", "prompt", |v| Ok::<_, String>(v)).await;
        assert!(result.is_err());
        assert_eq!(ai.prompts.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_completion_failures_are_retried_before_the_shape_check() {
        use std::sync::atomic::{AtomicU32, Ordering};

        use async_trait::async_trait;

        struct FlakyAi {
            calls: AtomicU32,
        }

        #[async_trait]
        impl crate::ai::AiAdapter for FlakyAi {
            async fn complete(&self, _model_id: &str, _prompt: &str) -> Result<String, AdaptersError> {
                if self.calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AdaptersError::transient("ai completion", std::io::Error::other("rate limited")))
                } else {
                    Ok("ok: {\"x\": 1}".to_string())
                }
            }
        }

        let ai = FlakyAi { calls: AtomicU32::new(0) };
        let result = complete_json_with_retry(&ai, "model", "prompt", |v| Ok::<_, String>(v)).await.unwrap();
        assert_eq!(result["x"], 1);
        assert_eq!(ai.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn succeeds_on_retry() {
        let ai = crate::ai::FakeAiAdapter::new(vec!["garbage".to_string(), "ok: {\"x\": 1}".to_string()]);
        let result = complete_json_with_retry(&ai, "model", "prompt", |v| Ok::<_, String>(v)).await.unwrap();
        assert_eq!(result["x"], 1);
    }
}
