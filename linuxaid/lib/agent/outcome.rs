use std::fmt::{self, Display};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The raw result of one agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentRunOutcome {
    exit_code: i32,
}

/// What the workflow should do after an agent run.
///
/// The agent runs with detailed exit codes: `0` nothing to do, `2` changes applied, `1` the
/// run failed or another run holds the lock, `4` and `6` failures while applying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentVerdict {
    /// The agent is healthy, maintenance may go on.
    Continue {
        /// Whether the run applied changes.
        changes: bool,
    },

    /// The run failed or was not attempted.
    RunFailed,

    /// The catalog has pending or partially failed changes.
    PendingChanges,

    /// An exit code outside the contract.
    Unclassified(i32),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl AgentRunOutcome {
    /// Wraps an exit code.
    pub fn new(exit_code: i32) -> Self {
        Self { exit_code }
    }

    /// The agent's exit code.
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Classifies the exit code.
    pub fn verdict(&self) -> AgentVerdict {
        classify_exit_code(self.exit_code)
    }
}

impl AgentVerdict {
    /// Whether the workflow may go on.
    pub fn should_continue(&self) -> bool {
        matches!(self, AgentVerdict::Continue { .. })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Maps an agent exit code onto a verdict. Total over `i32`.
pub fn classify_exit_code(exit_code: i32) -> AgentVerdict {
    match exit_code {
        0 => AgentVerdict::Continue { changes: false },
        2 => AgentVerdict::Continue { changes: true },
        1 => AgentVerdict::RunFailed,
        4 | 6 => AgentVerdict::PendingChanges,
        code => AgentVerdict::Unclassified(code),
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for AgentVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentVerdict::Continue { changes: false } => write!(f, "clean run, no changes"),
            AgentVerdict::Continue { changes: true } => write!(f, "clean run, changes applied"),
            AgentVerdict::RunFailed => {
                write!(f, "run failed or another run is already in progress")
            }
            AgentVerdict::PendingChanges => write!(f, "pending or failed changes"),
            AgentVerdict::Unclassified(code) => write!(f, "unexpected exit code {code}"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_contract_codes() {
        assert_eq!(classify_exit_code(0), AgentVerdict::Continue { changes: false });
        assert_eq!(classify_exit_code(2), AgentVerdict::Continue { changes: true });
        assert_eq!(classify_exit_code(1), AgentVerdict::RunFailed);
        assert_eq!(classify_exit_code(4), AgentVerdict::PendingChanges);
        assert_eq!(classify_exit_code(6), AgentVerdict::PendingChanges);
    }

    #[test]
    fn test_classify_is_total() {
        let samples = (-300..300).chain([i32::MIN, i32::MAX]);
        for code in samples {
            let verdict = classify_exit_code(code);
            assert_eq!(verdict.should_continue(), code == 0 || code == 2, "code {code}");
            if !matches!(code, 0 | 1 | 2 | 4 | 6) {
                assert_eq!(verdict, AgentVerdict::Unclassified(code));
            }
        }
    }

    #[test]
    fn test_outcome_verdict() {
        assert!(AgentRunOutcome::new(2).verdict().should_continue());
        assert_eq!(AgentRunOutcome::new(4).exit_code(), 4);
        assert_eq!(
            AgentRunOutcome::new(137).verdict().to_string(),
            "unexpected exit code 137"
        );
    }
}
