use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;

use crate::dao::models::GameId;

pub type MongoResult<T> = Result<T, MongoDaoError>;

const DUPLICATE_KEY: i32 = 11000;

/// Failures raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing environment variable {var}")]
    MissingEnvVar { var: &'static str },
    #[error("invalid MongoDB URI {uri}")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to construct MongoDB client")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB did not answer the initial ping after {attempts} attempts")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB health ping failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index {index} on {collection}")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("{operation} failed for game {game_id}")]
    Game {
        operation: &'static str,
        game_id: GameId,
        #[source]
        source: MongoError,
    },
    #[error("failed to load question {id}")]
    LoadQuestion {
        id: i64,
        #[source]
        source: MongoError,
    },
    #[error("{operation} failed for the session snapshot")]
    Snapshot {
        operation: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("{operation} failed on the event relay")]
    Relay {
        operation: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("{what} of game {game_id} vanished during the operation")]
    Vanished { game_id: GameId, what: &'static str },
    #[error("game {game_id} links question {question_id} which is missing from the catalog")]
    DanglingLink { game_id: GameId, question_id: i64 },
}

impl MongoDaoError {
    pub(super) fn game(operation: &'static str, game_id: GameId) -> impl FnOnce(MongoError) -> Self {
        move |source| MongoDaoError::Game {
            operation,
            game_id,
            source,
        }
    }

    pub(super) fn snapshot(operation: &'static str) -> impl FnOnce(MongoError) -> Self {
        move |source| MongoDaoError::Snapshot { operation, source }
    }

    pub(super) fn relay(operation: &'static str) -> impl FnOnce(MongoError) -> Self {
        move |source| MongoDaoError::Relay { operation, source }
    }
}

/// Whether a write was rejected by a unique index.
pub(super) fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}
