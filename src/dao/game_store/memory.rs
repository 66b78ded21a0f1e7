//! Process-local [`GameStore`] used for development, demos and tests.
//!
//! All tables sit behind one mutex so every trait method behaves like a
//! single transaction. The lock is never held across an `.await`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::SystemTime,
};

use futures::future::{self, BoxFuture};

use crate::dao::{
    game_store::GameStore,
    models::{
        AnswerKey, AnswerRecordEntity, AnswerStatus, AnswerTally, AnswerWrite, ConfirmedAnswer,
        GameEntity, GameId, GamePatch, GameQuestionEntity, GameStatus, ParticipantEntity,
        ParticipantRole, ParticipantStatus, QuestionEntity, QuestionId, QuestionStatsEntity,
        SeedData, UserId,
    },
    storage::StorageResult,
};

#[derive(Default)]
struct Tables {
    games: HashMap<GameId, GameEntity>,
    questions: HashMap<QuestionId, QuestionEntity>,
    links: HashMap<(GameId, QuestionId), GameQuestionEntity>,
    participants: HashMap<(GameId, UserId), ParticipantEntity>,
    answers: HashMap<AnswerKey, AnswerRecordEntity>,
}

/// In-memory implementation of [`GameStore`].
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with games, questions and links.
    pub fn with_seed(seed: SeedData) -> Self {
        let store = Self::new();
        {
            let mut tables = store.lock();
            for game in seed.games {
                tables.games.insert(game.id, game);
            }
            for question in seed.questions {
                tables.questions.insert(question.id, question);
            }
            for link in seed.links {
                tables.links.insert((link.game_id, link.question_id), link);
            }
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run<T, F>(&self, op: F) -> BoxFuture<'static, StorageResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut Tables) -> T,
    {
        let mut tables = self.lock();
        let value = op(&mut *tables);
        drop(tables);
        Box::pin(future::ready(Ok(value)))
    }
}

impl GameStore for MemoryGameStore {
    fn find_game(&self, id: GameId) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        self.run(|tables| tables.games.get(&id).cloned())
    }

    fn update_game(
        &self,
        id: GameId,
        expected: Vec<GameStatus>,
        patch: GamePatch,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.run(move |tables| match tables.games.get_mut(&id) {
            Some(game) if expected.contains(&game.status) => {
                patch.apply_to(game);
                true
            }
            _ => false,
        })
    }

    fn count_game_questions(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<u32>> {
        self.run(move |tables| {
            let count = tables
                .links
                .values()
                .filter(|link| link.game_id == game_id)
                .count();
            u32::try_from(count).unwrap_or(u32::MAX)
        })
    }

    fn next_unpublished_question(
        &self,
        game_id: GameId,
    ) -> BoxFuture<'static, StorageResult<Option<(GameQuestionEntity, QuestionEntity)>>> {
        self.run(|tables| {
            tables
                .links
                .values()
                .filter(|link| link.game_id == game_id && !link.is_published)
                .min_by_key(|link| (link.priority, link.link_id))
                .and_then(|link| {
                    tables
                        .questions
                        .get(&link.question_id)
                        .map(|question| (link.clone(), question.clone()))
                })
        })
    }

    fn find_question(
        &self,
        id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        self.run(|tables| tables.questions.get(&id).cloned())
    }

    fn activate_question(
        &self,
        game_id: GameId,
        question_id: QuestionId,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.run(move |tables| {
            let Some(link) = tables.links.get_mut(&(game_id, question_id)) else {
                return false;
            };
            if link.is_published {
                return false;
            }
            let Some(game) = tables.games.get_mut(&game_id) else {
                return false;
            };

            link.is_published = true;
            link.published_at = Some(at);
            game.current_question_id = Some(question_id);
            if game.status == GameStatus::Starting {
                game.status = GameStatus::Started;
                game.started_at = Some(at);
            }
            true
        })
    }

    fn save_question_stats(
        &self,
        game_id: GameId,
        question_id: QuestionId,
        stats: QuestionStatsEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |tables| {
            if let Some(link) = tables.links.get_mut(&(game_id, question_id)) {
                link.stats = Some(stats);
            }
        })
    }

    fn upsert_participant(
        &self,
        game_id: GameId,
        user_id: UserId,
        role: ParticipantRole,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<(ParticipantEntity, bool)>> {
        self.run(move |tables| {
            let mut created = false;
            let participant = tables
                .participants
                .entry((game_id, user_id))
                .or_insert_with(|| {
                    created = true;
                    ParticipantEntity {
                        game_id,
                        user_id,
                        role,
                        status: ParticipantStatus::Active,
                        is_winner: false,
                        joined_at: at,
                    }
                });
            (participant.clone(), created)
        })
    }

    fn find_participant(
        &self,
        game_id: GameId,
        user_id: UserId,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        self.run(|tables| tables.participants.get(&(game_id, user_id)).cloned())
    }

    fn acknowledge_question(
        &self,
        key: AnswerKey,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<AnswerRecordEntity>> {
        self.run(move |tables| {
            let record = tables
                .answers
                .entry(key)
                .or_insert_with(|| AnswerRecordEntity::acknowledged(key, at));
            record.acknowledged_at.get_or_insert(at);
            record.clone()
        })
    }

    fn upsert_answer(
        &self,
        key: AnswerKey,
        answer: u8,
        is_correct: bool,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<AnswerWrite>> {
        self.run(move |tables| match tables.answers.get_mut(&key) {
            Some(record) if record.status == AnswerStatus::Confirmed => {
                AnswerWrite::Frozen(record.clone())
            }
            Some(record) => {
                record.answer = Some(answer);
                record.is_correct = Some(is_correct);
                record.status = AnswerStatus::Answered;
                record.answered_at = Some(at);
                AnswerWrite::Recorded(record.clone())
            }
            None => {
                let record = AnswerRecordEntity::answered(key, answer, is_correct, at);
                tables.answers.insert(key, record.clone());
                AnswerWrite::Recorded(record)
            }
        })
    }

    fn find_answer(
        &self,
        key: AnswerKey,
    ) -> BoxFuture<'static, StorageResult<Option<AnswerRecordEntity>>> {
        self.run(move |tables| tables.answers.get(&key).cloned())
    }

    fn confirm_answer(
        &self,
        key: AnswerKey,
        at: SystemTime,
        crown_if_correct: bool,
    ) -> BoxFuture<'static, StorageResult<Option<ConfirmedAnswer>>> {
        self.run(move |tables| {
            let Tables {
                answers,
                participants,
                ..
            } = tables;
            let record = answers.get_mut(&key)?;
            let participant = participants.get_mut(&(key.game_id, key.user_id));

            match record.status {
                AnswerStatus::Sent => None,
                AnswerStatus::Confirmed => Some(ConfirmedAnswer {
                    record: record.clone(),
                    is_winner: participant.is_some_and(|p| p.is_winner),
                    newly_confirmed: false,
                }),
                AnswerStatus::Answered => {
                    record.status = AnswerStatus::Confirmed;
                    record.confirmed_at = Some(at);
                    let is_winner = match participant {
                        Some(participant) => {
                            if crown_if_correct && record.is_correct == Some(true) {
                                participant.is_winner = true;
                            }
                            participant.is_winner
                        }
                        None => false,
                    };
                    Some(ConfirmedAnswer {
                        record: record.clone(),
                        is_winner,
                        newly_confirmed: true,
                    })
                }
            }
        })
    }

    fn tally_confirmed_answers(
        &self,
        game_id: GameId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<AnswerTally>> {
        self.run(move |tables| {
            let mut tally = AnswerTally::default();
            for record in tables.answers.values() {
                let key = record.key;
                if key.game_id != game_id
                    || key.question_id != question_id
                    || record.status != AnswerStatus::Confirmed
                {
                    continue;
                }
                let is_player = tables
                    .participants
                    .get(&(key.game_id, key.user_id))
                    .is_some_and(|p| p.role == ParticipantRole::Player);
                if let (true, Some(answer)) = (is_player, record.answer) {
                    *tally.0.entry(answer).or_default() += 1;
                }
            }
            tally
        })
    }

    fn list_winners(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<Vec<UserId>>> {
        self.run(move |tables| {
            let mut winners: Vec<UserId> = tables
                .participants
                .values()
                .filter(|p| p.game_id == game_id && p.is_winner)
                .map(|p| p.user_id)
                .collect();
            winners.sort_unstable();
            winners
        })
    }

    fn reset_game(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<bool>> {
        self.run(move |tables| {
            let Some(game) = tables.games.get_mut(&game_id) else {
                return false;
            };
            if game.status != GameStatus::Finished {
                return false;
            }

            game.status = GameStatus::Active;
            game.current_question_id = None;
            game.total_winners = 0;
            game.opened_at = None;
            game.started_at = None;
            game.finished_at = None;
            game.closed_at = None;

            tables.participants.retain(|(id, _), _| *id != game_id);
            tables.answers.retain(|key, _| key.game_id != game_id);
            for link in tables.links.values_mut().filter(|l| l.game_id == game_id) {
                link.is_published = false;
                link.published_at = None;
                link.stats = None;
            }
            true
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(Ok(())))
    }
}
