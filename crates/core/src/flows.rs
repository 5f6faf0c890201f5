use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of one configure-modal interaction.
///
/// The split between `Validating` and `Persisting` mirrors the runtime
/// split: validation happens before the view-submission ack, persistence
/// runs afterwards as a detached task whose failure is only visible to
/// operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigurePhase {
    Idle,
    FormOpen,
    Validating,
    Persisting,
    Persisted,
    PersistFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigureSignal {
    OpenForm,
    Submit,
    Reject,
    Accept,
    PersistSucceeded,
    PersistFailed,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid configure transition from {from:?} on {signal:?}")]
pub struct PhaseTransitionError {
    pub from: ConfigurePhase,
    pub signal: ConfigureSignal,
}

impl ConfigurePhase {
    pub fn advance(self, signal: ConfigureSignal) -> Result<Self, PhaseTransitionError> {
        use ConfigurePhase as P;
        use ConfigureSignal as S;

        let next = match (self, signal) {
            // Reopening the form (e.g. dismiss and click configure again)
            // is a fresh render of the same interaction.
            (P::Idle | P::FormOpen, S::OpenForm) => P::FormOpen,
            (P::FormOpen, S::Submit) => P::Validating,
            // Field-level rejection returns the submitter to the open form
            // with error annotations; the interaction stays live.
            (P::Validating, S::Reject) => P::FormOpen,
            (P::Validating, S::Accept) => P::Persisting,
            (P::Persisting, S::PersistSucceeded) => P::Persisted,
            (P::Persisting, S::PersistFailed) => P::PersistFailed,
            (from, signal) => return Err(PhaseTransitionError { from, signal }),
        };

        Ok(next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Persisted | Self::PersistFailed)
    }
}
