use std::time::SystemTime;

use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{
    AnswerKey, AnswerRecordEntity, AnswerStatus, GameEntity, GameId, GameStatus, ParticipantEntity,
    ParticipantRole, ParticipantStatus, QuestionEntity, QuestionId, QuestionStatsEntity,
    QuestionStatus, UserId,
};

fn from_bson_time(at: Option<DateTime>) -> Option<SystemTime> {
    at.map(DateTime::to_system_time)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    pub id: GameId,
    pub secret: String,
    pub title: String,
    #[serde(default)]
    pub prize_name: Option<String>,
    #[serde(default)]
    pub prize_pool: i64,
    pub status: GameStatus,
    #[serde(default)]
    pub current_question_id: Option<QuestionId>,
    #[serde(default)]
    pub total_winners: i64,
    #[serde(default)]
    pub opened_at: Option<DateTime>,
    #[serde(default)]
    pub started_at: Option<DateTime>,
    #[serde(default)]
    pub finished_at: Option<DateTime>,
    #[serde(default)]
    pub closed_at: Option<DateTime>,
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        Self {
            id: value.id,
            secret: value.secret,
            title: value.title,
            prize_name: value.prize_name,
            prize_pool: value.prize_pool,
            status: value.status,
            current_question_id: value.current_question_id,
            total_winners: value.total_winners,
            opened_at: from_bson_time(value.opened_at),
            started_at: from_bson_time(value.started_at),
            finished_at: from_bson_time(value.finished_at),
            closed_at: from_bson_time(value.closed_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    #[serde(rename = "_id")]
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: i32,
    #[serde(default)]
    pub level: Option<i32>,
    #[serde(default)]
    pub status: QuestionStatus,
}

impl From<MongoQuestionDocument> for QuestionEntity {
    fn from(value: MongoQuestionDocument) -> Self {
        Self {
            id: value.id,
            text: value.text,
            options: value.options,
            correct_answer: u8::try_from(value.correct_answer).unwrap_or(0),
            level: value.level,
            status: value.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStatsDocument {
    pub option_counts: Vec<i64>,
    pub correct_count: i64,
    pub wrong_count: i64,
    pub total_count: i64,
}

impl MongoStatsDocument {
    pub fn to_document(stats: &QuestionStatsEntity) -> Document {
        let counts: Vec<i64> = stats.option_counts.iter().map(|c| i64::from(*c)).collect();
        doc! {
            "option_counts": counts,
            "correct_count": i64::from(stats.correct_count),
            "wrong_count": i64::from(stats.wrong_count),
            "total_count": i64::from(stats.total_count),
        }
    }
}

impl From<MongoStatsDocument> for QuestionStatsEntity {
    fn from(value: MongoStatsDocument) -> Self {
        let clamp = |n: i64| u32::try_from(n.max(0)).unwrap_or(u32::MAX);
        Self {
            option_counts: value.option_counts.into_iter().map(clamp).collect(),
            correct_count: clamp(value.correct_count),
            wrong_count: clamp(value.wrong_count),
            total_count: clamp(value.total_count),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoLinkDocument {
    #[serde(rename = "_id")]
    pub link_id: i64,
    pub game_id: GameId,
    pub question_id: QuestionId,
    pub priority: i32,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub published_at: Option<DateTime>,
    #[serde(default)]
    pub stats: Option<MongoStatsDocument>,
}

impl From<MongoLinkDocument> for crate::dao::models::GameQuestionEntity {
    fn from(value: MongoLinkDocument) -> Self {
        Self {
            link_id: value.link_id,
            game_id: value.game_id,
            question_id: value.question_id,
            priority: value.priority,
            is_published: value.is_published,
            published_at: from_bson_time(value.published_at),
            stats: value.stats.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoParticipantDocument {
    pub game_id: GameId,
    pub user_id: UserId,
    pub role: ParticipantRole,
    pub status: ParticipantStatus,
    #[serde(default)]
    pub is_winner: bool,
    pub joined_at: DateTime,
}

impl From<MongoParticipantDocument> for ParticipantEntity {
    fn from(value: MongoParticipantDocument) -> Self {
        Self {
            game_id: value.game_id,
            user_id: value.user_id,
            role: value.role,
            status: value.status,
            is_winner: value.is_winner,
            joined_at: value.joined_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAnswerDocument {
    pub game_id: GameId,
    pub user_id: UserId,
    pub question_id: QuestionId,
    #[serde(default)]
    pub answer: Option<i32>,
    #[serde(default)]
    pub is_correct: Option<bool>,
    pub status: AnswerStatus,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime>,
    #[serde(default)]
    pub answered_at: Option<DateTime>,
    #[serde(default)]
    pub confirmed_at: Option<DateTime>,
}

impl From<MongoAnswerDocument> for AnswerRecordEntity {
    fn from(value: MongoAnswerDocument) -> Self {
        Self {
            key: AnswerKey {
                game_id: value.game_id,
                user_id: value.user_id,
                question_id: value.question_id,
            },
            answer: value.answer.and_then(|a| u8::try_from(a).ok()),
            is_correct: value.is_correct,
            status: value.status,
            acknowledged_at: from_bson_time(value.acknowledged_at),
            answered_at: from_bson_time(value.answered_at),
            confirmed_at: from_bson_time(value.confirmed_at),
        }
    }
}

/// Singleton document holding the encoded session snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSnapshotDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub revision: i64,
    pub payload: String,
}

/// Broadcast event written for the other processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEventDocument {
    pub origin: String,
    pub payload: String,
    pub created_at: DateTime,
}

pub fn answer_filter(key: &AnswerKey) -> Document {
    doc! {
        "game_id": key.game_id,
        "user_id": key.user_id,
        "question_id": key.question_id,
    }
}

pub fn bson_time(at: SystemTime) -> DateTime {
    DateTime::from_system_time(at)
}
