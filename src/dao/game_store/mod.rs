pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;

use crate::dao::models::{
    AnswerKey, AnswerRecordEntity, AnswerTally, AnswerWrite, ConfirmedAnswer, GameEntity, GameId,
    GamePatch, GameQuestionEntity, GameStatus, ParticipantEntity, ParticipantRole,
    QuestionEntity, QuestionId, QuestionStatsEntity, UserId,
};
use crate::dao::storage::StorageResult;

/// Repository over the durable per-game records.
///
/// Every method is a single atomic unit on the backend: it either applies all
/// of its writes or none of them. Foreign keys are passed explicitly, nothing
/// cascades implicitly.
pub trait GameStore: Send + Sync {
    fn find_game(&self, id: GameId) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;

    /// Apply `patch` when the game status is one of `expected`, returning whether it matched.
    fn update_game(
        &self,
        id: GameId,
        expected: Vec<GameStatus>,
        patch: GamePatch,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    fn count_game_questions(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<u32>>;

    /// Lowest-priority unpublished link (ties broken by link id) joined with its catalog entry.
    fn next_unpublished_question(
        &self,
        game_id: GameId,
    ) -> BoxFuture<'static, StorageResult<Option<(GameQuestionEntity, QuestionEntity)>>>;

    fn find_question(
        &self,
        id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>>;

    /// Put a question live durably: retire its link from candidacy, record it as the game's
    /// current question and move a `Starting` game to `Started` (stamping `started_at`).
    /// Returns false when the link was already published.
    fn activate_question(
        &self,
        game_id: GameId,
        question_id: QuestionId,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    fn save_question_stats(
        &self,
        game_id: GameId,
        question_id: QuestionId,
        stats: QuestionStatsEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Find-or-create a participant, returning the row and whether it was created.
    fn upsert_participant(
        &self,
        game_id: GameId,
        user_id: UserId,
        role: ParticipantRole,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<(ParticipantEntity, bool)>>;

    fn find_participant(
        &self,
        game_id: GameId,
        user_id: UserId,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;

    /// Find-or-create a `Sent` record. Existing records only gain an acknowledgement time.
    fn acknowledge_question(
        &self,
        key: AnswerKey,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<AnswerRecordEntity>>;

    /// Upsert an answer unless the record is already confirmed.
    fn upsert_answer(
        &self,
        key: AnswerKey,
        answer: u8,
        is_correct: bool,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<AnswerWrite>>;

    fn find_answer(
        &self,
        key: AnswerKey,
    ) -> BoxFuture<'static, StorageResult<Option<AnswerRecordEntity>>>;

    /// Freeze an answered record. When `crown_if_correct` is set and the answer is correct the
    /// participant is flagged as winner within the same atomic unit. Already confirmed records
    /// are returned untouched.
    fn confirm_answer(
        &self,
        key: AnswerKey,
        at: SystemTime,
        crown_if_correct: bool,
    ) -> BoxFuture<'static, StorageResult<Option<ConfirmedAnswer>>>;

    /// Confirmed answers of Player participants grouped by option.
    fn tally_confirmed_answers(
        &self,
        game_id: GameId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<AnswerTally>>;

    /// Winners of a game ordered by user id.
    fn list_winners(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<Vec<UserId>>>;

    /// Return a finished game to `Active`, dropping its participants and answers and clearing
    /// link publication and statistics. Returns false when the game is not finished.
    fn reset_game(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<bool>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
