use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("wall-clock budget of {0:?} exceeded")]
    WallClockExceeded(std::time::Duration),

    #[error("attempt budget of {0} exceeded")]
    AttemptBudgetExceeded(u32),

    #[error("exceeded {0} consecutive transient status-probe failures")]
    TooManyTransientFailures(u32),

    #[error("status probe failed: {0}")]
    Probe(String),

    #[error(transparent)]
    Storage(#[from] sdlc_storage::StorageError),
}

impl CoordinatorError {
    pub fn terminal(&self) -> (String, String) {
        ("sdlc run failed".to_string(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[yare::parameterized(
        wall_clock = {
            CoordinatorError::WallClockExceeded(Duration::from_secs(900)),
            "wall-clock budget of 900s exceeded",
        },
        attempt_budget = {
            CoordinatorError::AttemptBudgetExceeded(3),
            "attempt budget of 3 exceeded",
        },
        transient_failures = {
            CoordinatorError::TooManyTransientFailures(5),
            "exceeded 5 consecutive transient status-probe failures",
        },
        probe = {
            CoordinatorError::Probe("boom".to_string()),
            "status probe failed: boom",
        },
    )]
    fn terminal_always_reports_the_same_top_level_message(err: CoordinatorError, detail: &str) {
        let (message, reported_detail) = err.terminal();
        assert_eq!(message, "sdlc run failed");
        assert_eq!(reported_detail, detail);
    }
}
