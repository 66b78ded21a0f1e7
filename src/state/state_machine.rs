use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::GameStatus;
use crate::state::snapshot::SessionSnapshot;

/// Phases a live session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum SessionPhase {
    /// The game exists but has not been opened by the operator's tooling.
    Draft,
    /// Open and waiting for the operator to start it.
    Active,
    /// Started, participants join as players, no question pushed yet.
    Starting,
    /// At least one question has been pushed.
    Started,
    /// Stopped or results shown.
    Finished,
}

impl From<GameStatus> for SessionPhase {
    fn from(status: GameStatus) -> Self {
        match status {
            GameStatus::Draft => SessionPhase::Draft,
            GameStatus::Active => SessionPhase::Active,
            GameStatus::Starting => SessionPhase::Starting,
            GameStatus::Started => SessionPhase::Started,
            GameStatus::Finished => SessionPhase::Finished,
        }
    }
}

impl From<SessionPhase> for GameStatus {
    fn from(phase: SessionPhase) -> Self {
        match phase {
            SessionPhase::Draft => GameStatus::Draft,
            SessionPhase::Active => GameStatus::Active,
            SessionPhase::Starting => GameStatus::Starting,
            SessionPhase::Started => GameStatus::Started,
            SessionPhase::Finished => GameStatus::Finished,
        }
    }
}

/// Operator commands driving the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    /// Open the session to participants.
    Start,
    /// Serve the next question.
    PushQuestion,
    /// Withdraw the live question.
    RetractQuestion,
    /// Show the answer statistics of the current question.
    RevealAnswer,
    /// Hide the answer statistics.
    HideAnswer,
    /// Show winners and prize split.
    RevealResult,
    /// Hide winners.
    HideResult,
    /// End the session.
    Stop,
    /// Return a finished game to `Active`.
    Reset,
}

/// Error returned when an event cannot be applied from a phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Phase the session was in.
    pub from: SessionPhase,
    /// Rejected event.
    pub event: SessionEvent,
}

impl InvalidTransition {
    /// Operator-facing explanation of the rejection.
    pub fn message(&self) -> &'static str {
        match (self.event, self.from) {
            (_, SessionPhase::Draft) => "the game is not open yet",
            (SessionEvent::Start, SessionPhase::Starting) => "the game is starting",
            (SessionEvent::Start, SessionPhase::Started) => "the game is being held",
            (SessionEvent::Reset, _) => "the game is not over yet",
            (SessionEvent::RevealResult | SessionEvent::HideResult, SessionPhase::Starting) => {
                "no question has been played yet"
            }
            (_, SessionPhase::Active) => "the game has not started yet",
            (_, SessionPhase::Starting) => "no question has been pushed yet",
            (_, SessionPhase::Finished) => "the game is over",
            (_, SessionPhase::Started) => "the game is being held",
        }
    }
}

/// Errors that can occur when planning a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// The snapshot phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when the plan was created.
        expected: SessionPhase,
        /// Phase found in the snapshot.
        actual: SessionPhase,
    },
    /// The snapshot now belongs to another game, or is gone.
    SessionMismatch,
}

/// Errors that can occur when aborting a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned transition.
pub type PlanId = Uuid;

/// A validated transition that has not been applied yet.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase observed when planning.
    pub from: SessionPhase,
    /// Phase after the transition.
    pub to: SessionPhase,
    /// Event that triggered this transition.
    pub event: SessionEvent,
}

impl Plan {
    /// Move `snapshot` to the planned phase.
    ///
    /// Another process may have moved the shared snapshot since planning. The plan
    /// still applies when its event leads from the phase found now to the same target.
    pub fn apply_to(&self, snapshot: &mut SessionSnapshot) -> Result<SessionPhase, ApplyError> {
        let actual = snapshot.phase;
        if actual != self.from && next_phase(actual, self.event) != Ok(self.to) {
            return Err(ApplyError::PhaseMismatch {
                expected: self.from,
                actual,
            });
        }
        snapshot.phase = self.to;
        Ok(self.to)
    }
}

/// Compute the phase reached by applying `event` in `from`.
pub fn next_phase(from: SessionPhase, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
    use SessionEvent as E;
    use SessionPhase as P;

    let next = match (from, event) {
        (P::Active, E::Start) => P::Starting,
        (P::Starting | P::Started, E::PushQuestion) => P::Started,
        (P::Started, E::RetractQuestion | E::RevealAnswer | E::HideAnswer) => P::Started,
        (P::Starting | P::Started, E::Stop) => P::Finished,
        (P::Started | P::Finished, E::RevealResult | E::HideResult) => P::Finished,
        (P::Finished, E::Reset) => P::Active,
        (from, event) => return Err(InvalidTransition { from, event }),
    };
    Ok(next)
}

/// Per-process planner guaranteeing one operator transition in flight at a time.
///
/// The phase itself lives in the shared snapshot; this machine only tracks the
/// pending plan so that planning, durable work and application stay paired.
#[derive(Debug, Default)]
pub struct SessionStateMachine {
    pending: Option<Plan>,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `event` against the observed phase and remember the plan.
    pub fn plan(&mut self, from: SessionPhase, event: SessionEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let to = next_phase(from, event).map_err(PlanError::InvalidTransition)?;
        let plan = Plan {
            id: Uuid::new_v4(),
            from,
            to,
            event,
        };
        self.pending = Some(plan.clone());
        Ok(plan)
    }

    /// Release the pending plan so it can be applied to the snapshot.
    pub fn take(&mut self, plan_id: PlanId) -> Result<Plan, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;
        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }
        Ok(plan)
    }

    /// Drop a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;
        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }
        self.pending = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_session_lifecycle() {
        let mut phase = SessionPhase::Active;
        for (event, expected) in [
            (SessionEvent::Start, SessionPhase::Starting),
            (SessionEvent::PushQuestion, SessionPhase::Started),
            (SessionEvent::RetractQuestion, SessionPhase::Started),
            (SessionEvent::PushQuestion, SessionPhase::Started),
            (SessionEvent::RevealAnswer, SessionPhase::Started),
            (SessionEvent::HideAnswer, SessionPhase::Started),
            (SessionEvent::RevealResult, SessionPhase::Finished),
            (SessionEvent::HideResult, SessionPhase::Finished),
            (SessionEvent::Reset, SessionPhase::Active),
        ] {
            phase = next_phase(phase, event).unwrap();
            assert_eq!(phase, expected, "after {event:?}");
        }
    }

    #[test]
    fn start_rejections_name_the_phase() {
        let cases = [
            (SessionPhase::Draft, "the game is not open yet"),
            (SessionPhase::Starting, "the game is starting"),
            (SessionPhase::Started, "the game is being held"),
            (SessionPhase::Finished, "the game is over"),
        ];
        for (from, message) in cases {
            let err = next_phase(from, SessionEvent::Start).unwrap_err();
            assert_eq!(err.message(), message);
        }
    }

    #[test]
    fn stop_is_allowed_before_any_question() {
        assert_eq!(
            next_phase(SessionPhase::Starting, SessionEvent::Stop),
            Ok(SessionPhase::Finished)
        );
        assert!(next_phase(SessionPhase::Active, SessionEvent::Stop).is_err());
    }

    #[test]
    fn reset_only_after_finish() {
        for from in [
            SessionPhase::Draft,
            SessionPhase::Active,
            SessionPhase::Starting,
            SessionPhase::Started,
        ] {
            assert!(next_phase(from, SessionEvent::Reset).is_err());
        }
    }

    #[test]
    fn second_plan_waits_for_the_first() {
        let mut sm = SessionStateMachine::new();
        let plan = sm.plan(SessionPhase::Started, SessionEvent::Stop).unwrap();
        assert_eq!(plan.to, SessionPhase::Finished);
        assert_eq!(
            sm.plan(SessionPhase::Started, SessionEvent::RevealAnswer)
                .unwrap_err(),
            PlanError::AlreadyPending
        );

        sm.abort(plan.id).unwrap();
        assert!(sm.plan(SessionPhase::Started, SessionEvent::RevealAnswer).is_ok());
    }

    #[test]
    fn plan_follows_a_phase_moved_by_the_same_event() {
        let mut sm = SessionStateMachine::new();
        let plan = sm
            .plan(SessionPhase::Starting, SessionEvent::PushQuestion)
            .unwrap();
        let mut snapshot = SessionSnapshot::opened(1, 3, 0);
        snapshot.phase = SessionPhase::Started;
        assert_eq!(plan.apply_to(&mut snapshot), Ok(SessionPhase::Started));

        let retract = SessionStateMachine::new()
            .plan(SessionPhase::Started, SessionEvent::RetractQuestion)
            .unwrap();
        snapshot.phase = SessionPhase::Finished;
        assert_eq!(
            retract.apply_to(&mut snapshot),
            Err(ApplyError::PhaseMismatch {
                expected: SessionPhase::Started,
                actual: SessionPhase::Finished,
            })
        );
        assert_eq!(snapshot.phase, SessionPhase::Finished);
    }

    #[test]
    fn take_rejects_foreign_plan_ids() {
        let mut sm = SessionStateMachine::new();
        let plan = sm.plan(SessionPhase::Finished, SessionEvent::Reset).unwrap();
        let other = Uuid::new_v4();
        assert_eq!(
            sm.take(other).unwrap_err(),
            ApplyError::IdMismatch {
                expected: plan.id,
                got: other
            }
        );
        assert_eq!(sm.take(plan.id).unwrap().to, SessionPhase::Active);
        assert_eq!(sm.take(plan.id).unwrap_err(), ApplyError::NoPending);
    }
}
