use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dao::models::{GameId, QuestionId, UserId},
    error::ErrorKind,
    state::state_machine::SessionPhase,
};

#[derive(Debug, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
/// Messages accepted from participant WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Register in the running game.
    Join,
    /// Submit or replace the answer to the current question.
    Answer {
        /// 1-based option number.
        #[serde(rename = "userAnswer")]
        user_answer: i64,
    },
    /// The current question was displayed.
    QuestionUpAck,
    QuestionDownAck,
    AnswerUpAck,
    AnswerDownAck,
    #[serde(other)]
    Unknown,
}

/// Event pushed to participants, serialized as `{"event": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    StartGame(StartGamePayload),
    QuestionUp(QuestionUpPayload),
    Timer(TimerPayload),
    QuestionDown(QuestionRefPayload),
    AnswerUp(AnswerStatsPayload),
    AnswerDown(QuestionRefPayload),
    ResultUp(ResultPayload),
    ResultDown(GameRefPayload),
    Leave(GameRefPayload),
    Reset(GameRefPayload),
    GameStats(GameStatsPayload),
    /// Direct reply to a successful `join`.
    Joined(JoinedPayload),
    /// Direct reply to a rejected inbound message.
    Error(ErrorPayload),
}

impl OutboundEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::StartGame(_) => "start_game",
            OutboundEvent::QuestionUp(_) => "question_up",
            OutboundEvent::Timer(_) => "timer",
            OutboundEvent::QuestionDown(_) => "question_down",
            OutboundEvent::AnswerUp(_) => "answer_up",
            OutboundEvent::AnswerDown(_) => "answer_down",
            OutboundEvent::ResultUp(_) => "result_up",
            OutboundEvent::ResultDown(_) => "result_down",
            OutboundEvent::Leave(_) => "leave",
            OutboundEvent::Reset(_) => "reset",
            OutboundEvent::GameStats(_) => "game_stats",
            OutboundEvent::Joined(_) => "joined",
            OutboundEvent::Error(_) => "error",
        }
    }

    /// Whether other server processes must see this event too.
    ///
    /// Connection counts are per process and direct replies never leave their socket.
    pub fn is_shared(&self) -> bool {
        !matches!(
            self,
            OutboundEvent::GameStats(_) | OutboundEvent::Joined(_) | OutboundEvent::Error(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartGamePayload {
    pub game_id: GameId,
    pub total_questions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionUpPayload {
    pub game_id: GameId,
    pub question_index: u32,
    pub question_id: QuestionId,
    pub question_text: String,
    pub options: Vec<String>,
    /// Countdown length in ticks.
    pub time_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimerPayload {
    /// Ticks left, reaches 0 at expiry.
    pub counter: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRefPayload {
    pub game_id: GameId,
    pub question_id: QuestionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameRefPayload {
    pub game_id: GameId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Confirmed-answer statistics of one question.
pub struct AnswerStatsPayload {
    pub game_id: GameId,
    pub question_id: QuestionId,
    pub question_index: u32,
    pub question_text: String,
    pub options: Vec<OptionStats>,
    /// 1-based number of the correct option.
    pub correct_answer: u8,
    pub total_count: u32,
    pub correct_count: u32,
    pub wrong_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptionStats {
    /// 1-based option number.
    pub option: u8,
    pub text: String,
    pub count: u32,
    /// Whole percent of confirmed answers, rounded down.
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    pub game_id: GameId,
    pub prize_per_user: i64,
    pub total_winners: u32,
    pub winners: Vec<WinnerShare>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WinnerShare {
    pub user_id: UserId,
    pub prize: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameStatsPayload {
    /// Participants connected to this server process.
    pub connected_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinedPayload {
    pub game_id: GameId,
    pub user_id: UserId,
    pub role: String,
    pub phase: SessionPhase,
    pub question_index: u32,
    pub total_questions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_messages_use_type_tag() {
        let answer: InboundMessage =
            serde_json::from_str(r#"{"type": "answer", "userAnswer": 2}"#).unwrap();
        assert_eq!(answer, InboundMessage::Answer { user_answer: 2 });

        let ack: InboundMessage = serde_json::from_str(r#"{"type": "question_up_ack"}"#).unwrap();
        assert_eq!(ack, InboundMessage::QuestionUpAck);

        let other: InboundMessage = serde_json::from_str(r#"{"type": "dance"}"#).unwrap();
        assert_eq!(other, InboundMessage::Unknown);
    }

    #[test]
    fn outbound_events_wrap_payload_in_data() {
        let event = OutboundEvent::QuestionDown(QuestionRefPayload {
            game_id: 3,
            question_id: 14,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "question_down", "data": {"gameId": 3, "questionId": 14}})
        );
        assert_eq!(json["event"], event.name());
    }

    #[test]
    fn process_local_events_are_not_shared() {
        let stats = OutboundEvent::GameStats(GameStatsPayload { connected_count: 4 });
        assert!(!stats.is_shared());
        assert!(OutboundEvent::Timer(TimerPayload { counter: 3 }).is_shared());
    }
}
