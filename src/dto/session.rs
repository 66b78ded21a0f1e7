use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{GameId, QuestionId},
    dto::format_epoch_ms,
    state::{snapshot::SessionSnapshot, state_machine::SessionPhase},
};

/// Public view of the live session, served to late joiners and returned by operator commands.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub game_id: GameId,
    pub phase: SessionPhase,
    pub current_question_index: u32,
    pub current_question_id: Option<QuestionId>,
    pub total_questions: u32,
    pub can_advance_question: bool,
    /// Whether the current question still accepts answers.
    pub question_live: bool,
    /// Milliseconds left on the countdown of the live question.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<i64>,
    pub opened_at: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub closed_at: Option<String>,
    pub attendee_count: u32,
}

impl SessionView {
    /// Project `snapshot` as seen at `now_ms`.
    pub fn at(snapshot: &SessionSnapshot, now_ms: i64, grace_ms: i64) -> Self {
        let question_live = snapshot.is_question_live(now_ms, grace_ms);
        Self {
            game_id: snapshot.game_id,
            phase: snapshot.phase,
            current_question_index: snapshot.current_question_index,
            current_question_id: snapshot.current_question_id,
            total_questions: snapshot.total_questions,
            can_advance_question: snapshot.can_advance_question,
            question_live,
            remaining_ms: question_live
                .then(|| snapshot.remaining_ms(now_ms))
                .flatten(),
            opened_at: snapshot.opened_at_ms.map(format_epoch_ms),
            started_at: snapshot.started_at_ms.map(format_epoch_ms),
            finished_at: snapshot.finished_at_ms.map(format_epoch_ms),
            closed_at: snapshot.closed_at_ms.map(format_epoch_ms),
            attendee_count: snapshot.attendee_count,
        }
    }

    /// View of a game that is open but not started.
    pub fn idle(game_id: GameId, total_questions: u32) -> Self {
        Self {
            game_id,
            phase: SessionPhase::Active,
            current_question_index: 0,
            current_question_id: None,
            total_questions,
            can_advance_question: true,
            question_live: false,
            remaining_ms: None,
            opened_at: None,
            started_at: None,
            finished_at: None,
            closed_at: None,
            attendee_count: 0,
        }
    }
}

/// Body of `POST /game/answer-check`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCheckRequest {
    #[validate(range(min = 1, message = "gameId must be positive"))]
    pub game_id: GameId,
}

/// Frozen outcome of a participant's answer to the current question.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCheckResponse {
    pub game_id: GameId,
    pub question_id: QuestionId,
    pub question_index: u32,
    /// Whether the confirmed answer is correct.
    pub is_qualified: bool,
    /// Confirmed option, 0 when nothing was answered.
    pub user_answer: u8,
    pub is_winner: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::snapshot::Countdown;
    use uuid::Uuid;

    #[test]
    fn remaining_time_only_shows_while_live() {
        let mut snapshot = SessionSnapshot::opened(4, 2, 0);
        snapshot.phase = SessionPhase::Started;
        snapshot.current_question_index = 1;
        snapshot.current_question_id = Some(9);
        snapshot.can_advance_question = false;
        snapshot.countdown = Some(Countdown {
            question_id: 9,
            deadline_ms: 10_000,
            ticks: 10,
            owner: Uuid::nil(),
        });

        let live = SessionView::at(&snapshot, 4_000, 0);
        assert!(live.question_live);
        assert_eq!(live.remaining_ms, Some(6_000));

        let stale = SessionView::at(&snapshot, 12_000, 1_000);
        assert!(!stale.question_live);
        assert_eq!(stale.remaining_ms, None);
    }

    #[test]
    fn timestamps_are_rfc3339() {
        let snapshot = SessionSnapshot::opened(4, 2, 0);
        let view = SessionView::at(&snapshot, 0, 0);
        assert_eq!(view.opened_at.as_deref(), Some("1970-01-01T00:00:00Z"));
    }
}
