use std::{collections::BTreeMap, time::SystemTime};

use serde::{Deserialize, Serialize};

/// Identifier of a game definition.
pub type GameId = i64;
/// Identifier of an authenticated participant, supplied by the identity gateway.
pub type UserId = i64;
/// Identifier of a catalog question.
pub type QuestionId = i64;

/// Durable lifecycle status of a game, mirroring the session phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum GameStatus {
    /// Game is still being prepared and cannot be started.
    Draft,
    /// Game is open and waiting for the operator to start it.
    Active,
    /// Game has been started; participants may join.
    Starting,
    /// At least one question has been pushed.
    Started,
    /// Game is over.
    Finished,
}

impl GameStatus {
    /// Stable string form used by storage backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Draft => "Draft",
            GameStatus::Active => "Active",
            GameStatus::Starting => "Starting",
            GameStatus::Started => "Started",
            GameStatus::Finished => "Finished",
        }
    }
}

/// Operator-facing game definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: GameId,
    /// Secret shared with the operator, required by every admin command.
    pub secret: String,
    /// Display title.
    pub title: String,
    /// Name of the prize, if any.
    #[serde(default)]
    pub prize_name: Option<String>,
    /// Prize pool shared between the winners.
    #[serde(default)]
    pub prize_pool: i64,
    /// Current durable status.
    pub status: GameStatus,
    /// Question currently (or last) served.
    #[serde(default)]
    pub current_question_id: Option<QuestionId>,
    /// Number of winners computed at result time.
    #[serde(default)]
    pub total_winners: i64,
    /// When the operator started the game.
    #[serde(default)]
    pub opened_at: Option<SystemTime>,
    /// When the first question was pushed.
    #[serde(default)]
    pub started_at: Option<SystemTime>,
    /// When the results were revealed.
    #[serde(default)]
    pub finished_at: Option<SystemTime>,
    /// When the game was stopped.
    #[serde(default)]
    pub closed_at: Option<SystemTime>,
}

/// Partial update applied to a game row, fields left to `None` stay untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GamePatch {
    pub status: Option<GameStatus>,
    pub current_question_id: Option<QuestionId>,
    pub total_winners: Option<i64>,
    pub opened_at: Option<SystemTime>,
    pub started_at: Option<SystemTime>,
    pub finished_at: Option<SystemTime>,
    pub closed_at: Option<SystemTime>,
}

impl GamePatch {
    /// Apply the patch onto an in-memory entity.
    pub fn apply_to(&self, game: &mut GameEntity) {
        if let Some(status) = self.status {
            game.status = status;
        }
        if let Some(id) = self.current_question_id {
            game.current_question_id = Some(id);
        }
        if let Some(total) = self.total_winners {
            game.total_winners = total;
        }
        if let Some(at) = self.opened_at {
            game.opened_at = Some(at);
        }
        if let Some(at) = self.started_at {
            game.started_at = Some(at);
        }
        if let Some(at) = self.finished_at {
            game.finished_at = Some(at);
        }
        if let Some(at) = self.closed_at {
            game.closed_at = Some(at);
        }
    }
}

/// Lifecycle of a catalog question.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum QuestionStatus {
    #[default]
    Draft,
    New,
    Used,
    Deleted,
}

/// Catalog question with between two and four options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Primary key of the question.
    pub id: QuestionId,
    /// Question title shown to participants.
    pub text: String,
    /// Answer options, option `n` is addressed with the 1-based value `n`.
    pub options: Vec<String>,
    /// 1-based index of the correct option.
    pub correct_answer: u8,
    /// Difficulty level.
    #[serde(default)]
    pub level: Option<i32>,
    #[serde(default)]
    pub status: QuestionStatus,
}

impl QuestionEntity {
    /// Number of options participants can pick from.
    pub fn option_count(&self) -> u8 {
        self.options.len().min(u8::MAX as usize) as u8
    }

    /// Whether `answer` names one of the options.
    pub fn accepts(&self, answer: u8) -> bool {
        answer >= 1 && answer <= self.option_count()
    }

    pub fn is_correct(&self, answer: u8) -> bool {
        answer == self.correct_answer
    }
}

/// Confirmed-answer statistics persisted onto a link for auditing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct QuestionStatsEntity {
    /// Confirmed answers per option, index 0 holds option 1.
    pub option_counts: Vec<u32>,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub total_count: u32,
}

/// Per-game association between a catalog question and its serving order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameQuestionEntity {
    /// Surrogate key, breaks ties between equal priorities.
    pub link_id: i64,
    pub game_id: GameId,
    pub question_id: QuestionId,
    /// Serving order, lowest first.
    pub priority: i32,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub published_at: Option<SystemTime>,
    #[serde(default)]
    pub stats: Option<QuestionStatsEntity>,
}

/// Role of a participant inside a game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ParticipantRole {
    /// Competes for the prize and counts in statistics.
    Player,
    /// Receives events only.
    Observer,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Player => "Player",
            ParticipantRole::Observer => "Observer",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ParticipantStatus {
    Active,
    Inactive,
}

/// Participation of a user in a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    pub game_id: GameId,
    pub user_id: UserId,
    pub role: ParticipantRole,
    pub status: ParticipantStatus,
    pub is_winner: bool,
    pub joined_at: SystemTime,
}

/// Natural key of an answer record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnswerKey {
    pub game_id: GameId,
    pub user_id: UserId,
    pub question_id: QuestionId,
}

/// Progress of a participant's answer to one question.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AnswerStatus {
    /// Question was delivered and acknowledged, no answer yet.
    Sent,
    /// An answer was submitted and may still be replaced.
    Answered,
    /// The answer is final.
    Confirmed,
}

impl AnswerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerStatus::Sent => "Sent",
            AnswerStatus::Answered => "Answered",
            AnswerStatus::Confirmed => "Confirmed",
        }
    }
}

/// Durable record of one participant's answer to one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerRecordEntity {
    pub key: AnswerKey,
    pub answer: Option<u8>,
    pub is_correct: Option<bool>,
    pub status: AnswerStatus,
    pub acknowledged_at: Option<SystemTime>,
    pub answered_at: Option<SystemTime>,
    pub confirmed_at: Option<SystemTime>,
}

impl AnswerRecordEntity {
    /// Fresh record created by a question acknowledgement.
    pub fn acknowledged(key: AnswerKey, at: SystemTime) -> Self {
        Self {
            key,
            answer: None,
            is_correct: None,
            status: AnswerStatus::Sent,
            acknowledged_at: Some(at),
            answered_at: None,
            confirmed_at: None,
        }
    }

    /// Fresh record created by a first submission.
    pub fn answered(key: AnswerKey, answer: u8, is_correct: bool, at: SystemTime) -> Self {
        Self {
            key,
            answer: Some(answer),
            is_correct: Some(is_correct),
            status: AnswerStatus::Answered,
            acknowledged_at: None,
            answered_at: Some(at),
            confirmed_at: None,
        }
    }
}

/// Outcome of an answer submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerWrite {
    /// The submission was stored (created or overwritten).
    Recorded(AnswerRecordEntity),
    /// The record is already confirmed and was left untouched.
    Frozen(AnswerRecordEntity),
}

/// Outcome of a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedAnswer {
    pub record: AnswerRecordEntity,
    /// Winner flag of the participant after the confirmation.
    pub is_winner: bool,
    /// False when the record had already been confirmed earlier.
    pub newly_confirmed: bool,
}

/// Confirmed Player answers of one question grouped by chosen option.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerTally(pub BTreeMap<u8, u32>);

impl AnswerTally {
    pub fn count(&self, option: u8) -> u32 {
        self.0.get(&option).copied().unwrap_or(0)
    }
}

/// Static data loaded into the in-memory backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub games: Vec<GameEntity>,
    #[serde(default)]
    pub questions: Vec<QuestionEntity>,
    #[serde(default)]
    pub links: Vec<GameQuestionEntity>,
}
