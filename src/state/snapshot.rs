//! Versioned session snapshot kept in the shared fast store.
//!
//! Version 2 is the strongly typed layout below. Version 1 is the loosely
//! typed blob older deployments wrote (`gameId`, `canQuestionUp`, `state`,
//! `dateOpened`...). It is migrated transparently when read.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::dao::models::{GameId, QuestionId};
use crate::state::state_machine::SessionPhase;

/// Layout written by this version.
pub const SCHEMA_VERSION: u32 = 2;

/// Failures decoding or encoding a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported snapshot schema version {0}")]
    UnsupportedVersion(u64),
    #[error("legacy snapshot field {field} has an unusable value {value:?}")]
    InvalidLegacyField { field: &'static str, value: String },
}

/// Milliseconds since the Unix epoch.
pub fn epoch_ms(at: SystemTime) -> i64 {
    at.duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

pub fn now_ms() -> i64 {
    epoch_ms(SystemTime::now())
}

/// Timer state of the live question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Countdown {
    /// Question the countdown belongs to.
    pub question_id: QuestionId,
    /// Absolute expiry, epoch milliseconds.
    pub deadline_ms: i64,
    /// Number of ticks announced to participants.
    pub ticks: u32,
    /// Process firing ticks and expiry.
    pub owner: Uuid,
}

/// The single live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub schema_version: u32,
    /// Bumped by every successful write, used for compare-and-swap.
    pub revision: u64,
    pub game_id: GameId,
    pub phase: SessionPhase,
    /// 1-based index of the current question, 0 before the first push.
    pub current_question_index: u32,
    pub current_question_id: Option<QuestionId>,
    pub total_questions: u32,
    /// False while a question is live.
    pub can_advance_question: bool,
    #[serde(default)]
    pub countdown: Option<Countdown>,
    #[serde(default)]
    pub opened_at_ms: Option<i64>,
    #[serde(default)]
    pub started_at_ms: Option<i64>,
    #[serde(default)]
    pub finished_at_ms: Option<i64>,
    #[serde(default)]
    pub closed_at_ms: Option<i64>,
    #[serde(default)]
    pub attendee_count: u32,
}

impl SessionSnapshot {
    /// Snapshot of a game that was just started.
    pub fn opened(game_id: GameId, total_questions: u32, opened_at_ms: i64) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            revision: 0,
            game_id,
            phase: SessionPhase::Starting,
            current_question_index: 0,
            current_question_id: None,
            total_questions,
            can_advance_question: true,
            countdown: None,
            opened_at_ms: Some(opened_at_ms),
            started_at_ms: None,
            finished_at_ms: None,
            closed_at_ms: None,
            attendee_count: 0,
        }
    }

    /// Whether the current question still accepts answers and blocks the next push.
    ///
    /// A countdown whose deadline passed more than `grace_ms` ago is treated as
    /// expired even if its owner never cleared it.
    pub fn is_question_live(&self, now_ms: i64, grace_ms: i64) -> bool {
        if self.can_advance_question {
            return false;
        }
        self.countdown
            .as_ref()
            .is_none_or(|countdown| now_ms < countdown.deadline_ms.saturating_add(grace_ms))
    }

    /// Milliseconds left on the live countdown.
    pub fn remaining_ms(&self, now_ms: i64) -> Option<i64> {
        self.countdown
            .as_ref()
            .map(|countdown| (countdown.deadline_ms - now_ms).max(0))
    }

    /// Whether the current question is the last one of the game.
    pub fn is_last_question(&self) -> bool {
        self.total_questions > 0 && self.current_question_index == self.total_questions
    }

    /// Decode a stored payload, migrating older layouts.
    ///
    /// `stored_revision` is the revision the store holds the payload at; it wins
    /// over whatever the payload claims.
    pub fn decode(payload: &str, stored_revision: u64) -> Result<Self, SnapshotError> {
        let value: serde_json::Value = serde_json::from_str(payload)?;
        let version = value.get("schemaVersion").and_then(serde_json::Value::as_u64);

        let mut snapshot = match version {
            None | Some(1) => serde_json::from_value::<LegacySnapshot>(value)?.migrate()?,
            Some(v) if v == u64::from(SCHEMA_VERSION) => serde_json::from_value(value)?,
            Some(other) => return Err(SnapshotError::UnsupportedVersion(other)),
        };
        snapshot.revision = stored_revision;
        Ok(snapshot)
    }

    pub fn encode(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyTime {
    Millis(i64),
    Text(String),
}

impl LegacyTime {
    fn into_ms(self, field: &'static str) -> Result<i64, SnapshotError> {
        match self {
            LegacyTime::Millis(ms) => Ok(ms),
            LegacyTime::Text(text) => OffsetDateTime::parse(&text, &Rfc3339)
                .map(|at| i64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(0))
                .map_err(|_| SnapshotError::InvalidLegacyField { field, value: text }),
        }
    }
}

/// Version 1 layout: numbers may arrive as strings and dates as ISO strings or epoch millis.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySnapshot {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    game_id: GameId,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    current_question_index: Option<u32>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    current_question_id: Option<QuestionId>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    total_questions: Option<u32>,
    #[serde(default)]
    date_opened: Option<LegacyTime>,
    #[serde(default)]
    date_started: Option<LegacyTime>,
    #[serde(default)]
    date_finished: Option<LegacyTime>,
    #[serde(default)]
    date_closed: Option<LegacyTime>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    number_of_attendees: Option<u32>,
    #[serde(default)]
    can_question_up: Option<bool>,
    #[serde(default)]
    state: Option<String>,
}

impl LegacySnapshot {
    fn migrate(self) -> Result<SessionSnapshot, SnapshotError> {
        let phase = match self.state.as_deref() {
            None => SessionPhase::Starting,
            Some("Draft") => SessionPhase::Draft,
            Some("Active") => SessionPhase::Active,
            Some("Starting") => SessionPhase::Starting,
            Some("Started") => SessionPhase::Started,
            Some("Finished") => SessionPhase::Finished,
            Some(other) => {
                return Err(SnapshotError::InvalidLegacyField {
                    field: "state",
                    value: other.to_owned(),
                });
            }
        };
        let stamp = |value: Option<LegacyTime>, field: &'static str| value.map(|t| t.into_ms(field)).transpose();

        Ok(SessionSnapshot {
            schema_version: SCHEMA_VERSION,
            revision: 0,
            game_id: self.game_id,
            phase,
            current_question_index: self.current_question_index.unwrap_or(0),
            current_question_id: self.current_question_id,
            total_questions: self.total_questions.unwrap_or(0),
            can_advance_question: self.can_question_up.unwrap_or(true),
            countdown: None,
            opened_at_ms: stamp(self.date_opened, "dateOpened")?,
            started_at_ms: stamp(self.date_started, "dateStarted")?,
            finished_at_ms: stamp(self.date_finished, "dateFinished")?,
            closed_at_ms: stamp(self.date_closed, "dateClosed")?,
            attendee_count: self.number_of_attendees.unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(deadline_ms: i64) -> SessionSnapshot {
        let mut snapshot = SessionSnapshot::opened(7, 3, 1_000);
        snapshot.phase = SessionPhase::Started;
        snapshot.current_question_index = 1;
        snapshot.current_question_id = Some(42);
        snapshot.can_advance_question = false;
        snapshot.countdown = Some(Countdown {
            question_id: 42,
            deadline_ms,
            ticks: 10,
            owner: Uuid::nil(),
        });
        snapshot
    }

    #[test]
    fn current_layout_survives_storage() {
        let snapshot = live(20_000);
        let decoded = SessionSnapshot::decode(&snapshot.encode().unwrap(), 9).unwrap();
        assert_eq!(decoded.revision, 9);
        assert_eq!(decoded.countdown, snapshot.countdown);
        assert_eq!(decoded.phase, SessionPhase::Started);
    }

    #[test]
    fn legacy_blob_is_migrated() {
        let payload = r#"{
            "gameId": "12",
            "currentQuestionIndex": 2,
            "currentQuestionId": 31,
            "totalQuestions": "5",
            "dateOpened": "2024-03-01T18:00:00Z",
            "dateStarted": 1709316060000,
            "dateFinished": null,
            "dateClosed": null,
            "numberOfAttendees": 17,
            "canQuestionUp": false,
            "state": "Started"
        }"#;
        let snapshot = SessionSnapshot::decode(payload, 0).unwrap();

        assert_eq!(snapshot.schema_version, SCHEMA_VERSION);
        assert_eq!(snapshot.game_id, 12);
        assert_eq!(snapshot.total_questions, 5);
        assert_eq!(snapshot.current_question_id, Some(31));
        assert_eq!(snapshot.phase, SessionPhase::Started);
        assert!(!snapshot.can_advance_question);
        assert_eq!(snapshot.attendee_count, 17);
        assert_eq!(snapshot.opened_at_ms, Some(1_709_316_000_000));
        assert_eq!(snapshot.started_at_ms, Some(1_709_316_060_000));
        assert_eq!(snapshot.closed_at_ms, None);
        assert!(snapshot.countdown.is_none());
    }

    #[test]
    fn legacy_blob_with_unknown_state_is_rejected() {
        let err = SessionSnapshot::decode(r#"{"gameId": 1, "state": "Paused"}"#, 0).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::InvalidLegacyField { field: "state", .. }
        ));
    }

    #[test]
    fn future_versions_are_refused() {
        let err = SessionSnapshot::decode(r#"{"schemaVersion": 3}"#, 0).unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedVersion(3)));
    }

    #[test]
    fn question_liveness_follows_deadline_and_flag() {
        let snapshot = live(10_000);
        assert!(snapshot.is_question_live(9_999, 0));
        assert!(!snapshot.is_question_live(10_000, 0));
        assert!(snapshot.is_question_live(10_400, 500));
        assert_eq!(snapshot.remaining_ms(4_000), Some(6_000));
        assert_eq!(snapshot.remaining_ms(12_000), Some(0));

        let mut released = snapshot.clone();
        released.can_advance_question = true;
        assert!(!released.is_question_live(0, 0));

        let mut retracted_elsewhere = snapshot;
        retracted_elsewhere.countdown = None;
        assert!(retracted_elsewhere.is_question_live(i64::MAX, 0));
    }

    #[test]
    fn last_question_needs_a_known_total() {
        let mut snapshot = live(0);
        assert!(!snapshot.is_last_question());
        snapshot.current_question_index = 3;
        assert!(snapshot.is_last_question());
        snapshot.total_questions = 0;
        snapshot.current_question_index = 0;
        assert!(!snapshot.is_last_question());
    }
}
