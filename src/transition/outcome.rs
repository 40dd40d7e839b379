//! How a transition ended.

use super::error::TransitionError;
use super::hooks::HookPhase;
use crate::params::Params;

/// Final result of a navigation request.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The target was committed as the current location
    Succeeded { state: String, params: Params },
    /// The transition failed; the previous location is still current
    Failed(TransitionError),
    /// A newer transition took over before this one could commit
    Superseded,
    /// An identical transition was already running
    Ignored,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// True for failures. Superseded transitions are not failures.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&TransitionError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Name of the committed state, on success.
    pub fn state(&self) -> Option<&str> {
        match self {
            Self::Succeeded { state, .. } => Some(state),
            _ => None,
        }
    }
}

/// Where a transition is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransitionStatus {
    #[default]
    Created,
    Running(HookPhase),
    Resolving,
    Succeeded,
    Failed,
    Superseded,
}

impl TransitionStatus {
    /// True once the transition can no longer change.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Superseded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn accessors_follow_variant() {
        let ok = Outcome::Succeeded {
            state: "home".into(),
            params: params! { "id" => 1 },
        };
        assert!(ok.is_success());
        assert_eq!(ok.state(), Some("home"));
        assert!(ok.error().is_none());

        let failed = Outcome::Failed(TransitionError::Cancelled {
            target: "home".into(),
            phase: "onStart".into(),
        });
        assert!(failed.is_failure());
        assert!(failed.error().is_some());
        assert!(!Outcome::Superseded.is_success());
    }

    #[test]
    fn finished_statuses() {
        assert!(!TransitionStatus::Created.is_finished());
        assert!(!TransitionStatus::Running(HookPhase::On).is_finished());
        assert!(TransitionStatus::Superseded.is_finished());
    }
}
