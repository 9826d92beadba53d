use std::time::Duration;

/// Process-wide configuration, read once at supervisor start-up and passed
/// down to workers explicitly (spec.md §6). Never re-read mid-run.
#[derive(Debug, Clone)]
pub struct Config {
    pub artifacts_bucket: Option<String>,
    pub cloud_account_id: Option<String>,
    pub cloud_region: Option<String>,
    pub ai_model_id: String,
    pub deploy_poll_interval: Duration,
    pub deploy_timeout: Duration,
    pub sdlc_wall_clock: Duration,
    pub sdlc_max_attempts: u32,
    pub verify_probe_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            artifacts_bucket: None,
            cloud_account_id: None,
            cloud_region: None,
            ai_model_id: "anthropic.claude-sonnet-4".to_string(),
            deploy_poll_interval: Duration::from_secs(10),
            deploy_timeout: Duration::from_secs(60 * 60),
            sdlc_wall_clock: Duration::from_secs(15 * 60),
            sdlc_max_attempts: 3,
            verify_probe_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Build configuration from environment variables, falling back to the
    /// documented defaults for anything unset (spec.md §6).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            artifacts_bucket: std::env::var("ARTIFACTS_BUCKET").ok(),
            cloud_account_id: std::env::var("CLOUD_ACCOUNT_ID").ok(),
            cloud_region: std::env::var("CLOUD_REGION").ok(),
            ai_model_id: std::env::var("AI_MODEL_ID").unwrap_or(defaults.ai_model_id),
            deploy_poll_interval: duration_secs_env("DEPLOY_POLL_INTERVAL", defaults.deploy_poll_interval),
            deploy_timeout: duration_secs_env("DEPLOY_TIMEOUT", defaults.deploy_timeout),
            sdlc_wall_clock: duration_secs_env("SDLC_WALL_CLOCK", defaults.sdlc_wall_clock),
            sdlc_max_attempts: std::env::var("SDLC_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sdlc_max_attempts),
            verify_probe_timeout: duration_secs_env("VERIFY_PROBE_TIMEOUT", defaults.verify_probe_timeout),
        }
    }
}

/// Parses a duration env var given in seconds (e.g. `"600"`), or with an
/// `s`/`m`/`h` suffix (e.g. `"10m"`). Falls back to `default` on any parse
/// failure rather than failing start-up over a malformed override.
fn duration_secs_env(key: &str, default: Duration) -> Duration {
    let Ok(raw) = std::env::var(key) else { return default };
    parse_duration(&raw).unwrap_or(default)
}

fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (num, unit) = match raw.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&raw[..raw.len() - 1], c),
        _ => (raw, 's'),
    };
    let value: u64 = num.parse().ok()?;
    let secs = match unit {
        's' => value,
        'm' => value * 60,
        'h' => value * 60 * 60,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}
