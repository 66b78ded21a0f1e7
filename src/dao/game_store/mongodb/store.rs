use std::{collections::HashSet, sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, ClientSession, Collection, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};

use super::{
    config::MongoConfig,
    connection::open_database,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        MongoAnswerDocument, MongoGameDocument, MongoLinkDocument, MongoParticipantDocument,
        MongoQuestionDocument, MongoStatsDocument, answer_filter, bson_time,
    },
};
use crate::dao::{
    game_store::GameStore,
    models::{
        AnswerKey, AnswerRecordEntity, AnswerStatus, AnswerTally, AnswerWrite, ConfirmedAnswer,
        GameEntity, GameId, GamePatch, GameQuestionEntity, GameStatus, ParticipantEntity,
        ParticipantRole, QuestionEntity, QuestionId, QuestionStatsEntity,
        UserId,
    },
    storage::StorageResult,
};

const GAME_COLLECTION_NAME: &str = "games";
const QUESTION_COLLECTION_NAME: &str = "questions";
const LINK_COLLECTION_NAME: &str = "game_questions";
const PARTICIPANT_COLLECTION_NAME: &str = "participants";
const ANSWER_COLLECTION_NAME: &str = "answers";

/// MongoDB implementation of [`GameStore`].
///
/// Operations touching more than one document (activation, confirmation,
/// reset) run inside a multi-document transaction, which requires a replica set.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    client: Client,
    database: Database,
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = open_database(&config).await?;

        let store = Self {
            inner: Arc::new(MongoInner { client, database }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// Database handle shared with the session store and the event relay.
    pub fn database(&self) -> Database {
        self.inner.database.clone()
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        self.create_index(
            LINK_COLLECTION_NAME,
            "game_question_unique_idx",
            doc! {"game_id": 1, "question_id": 1},
            true,
        )
        .await?;
        self.create_index(
            LINK_COLLECTION_NAME,
            "game_question_order_idx",
            doc! {"game_id": 1, "is_published": 1, "priority": 1, "_id": 1},
            false,
        )
        .await?;
        self.create_index(
            PARTICIPANT_COLLECTION_NAME,
            "participant_unique_idx",
            doc! {"game_id": 1, "user_id": 1},
            true,
        )
        .await?;
        self.create_index(
            ANSWER_COLLECTION_NAME,
            "answer_unique_idx",
            doc! {"game_id": 1, "user_id": 1, "question_id": 1},
            true,
        )
        .await
    }

    async fn create_index(
        &self,
        collection: &'static str,
        index: &'static str,
        keys: Document,
        unique: bool,
    ) -> MongoResult<()> {
        let model = IndexModel::builder()
            .keys(keys)
            .options(
                IndexOptions::builder()
                    .name(Some(index.to_owned()))
                    .unique(Some(unique))
                    .build(),
            )
            .build();

        self.inner
            .database
            .collection::<Document>(collection)
            .create_index(model)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection,
                index,
                source,
            })?;
        Ok(())
    }

    fn games(&self) -> Collection<MongoGameDocument> {
        self.inner.database.collection(GAME_COLLECTION_NAME)
    }

    fn questions(&self) -> Collection<MongoQuestionDocument> {
        self.inner.database.collection(QUESTION_COLLECTION_NAME)
    }

    fn links(&self) -> Collection<MongoLinkDocument> {
        self.inner.database.collection(LINK_COLLECTION_NAME)
    }

    fn participants(&self) -> Collection<MongoParticipantDocument> {
        self.inner.database.collection(PARTICIPANT_COLLECTION_NAME)
    }

    fn answers(&self) -> Collection<MongoAnswerDocument> {
        self.inner.database.collection(ANSWER_COLLECTION_NAME)
    }

    async fn begin(&self, game_id: GameId) -> MongoResult<ClientSession> {
        let mut session = self
            .inner
            .client
            .start_session()
            .await
            .map_err(MongoDaoError::game("start session", game_id))?;
        session
            .start_transaction()
            .await
            .map_err(MongoDaoError::game("start transaction", game_id))?;
        Ok(session)
    }

    /// Commit on success, abort on failure.
    async fn finish<T>(
        mut session: ClientSession,
        game_id: GameId,
        outcome: MongoResult<T>,
    ) -> MongoResult<T> {
        match outcome {
            Ok(value) => {
                session
                    .commit_transaction()
                    .await
                    .map_err(MongoDaoError::game("commit transaction", game_id))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort) = session.abort_transaction().await {
                    tracing::warn!(game_id, error = %abort, "failed to abort transaction");
                }
                Err(err)
            }
        }
    }

    async fn find_game(&self, id: GameId) -> MongoResult<Option<GameEntity>> {
        let document = self
            .games()
            .find_one(doc! {"_id": id})
            .await
            .map_err(MongoDaoError::game("load game", id))?;
        Ok(document.map(Into::into))
    }

    async fn update_game(
        &self,
        id: GameId,
        expected: Vec<GameStatus>,
        patch: GamePatch,
    ) -> MongoResult<bool> {
        let statuses: Vec<&str> = expected.iter().map(GameStatus::as_str).collect();
        let filter = doc! {"_id": id, "status": {"$in": statuses}};
        let set = patch_document(&patch);

        let matched = if set.is_empty() {
            self.games()
                .count_documents(filter)
                .await
                .map_err(MongoDaoError::game("check game", id))?
        } else {
            self.games()
                .update_one(filter, doc! {"$set": set})
                .await
                .map_err(MongoDaoError::game("update game", id))?
                .matched_count
        };
        Ok(matched > 0)
    }

    async fn count_game_questions(&self, game_id: GameId) -> MongoResult<u32> {
        let count = self
            .links()
            .count_documents(doc! {"game_id": game_id})
            .await
            .map_err(MongoDaoError::game("count questions", game_id))?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn next_unpublished_question(
        &self,
        game_id: GameId,
    ) -> MongoResult<Option<(GameQuestionEntity, QuestionEntity)>> {
        let link = self
            .links()
            .find_one(doc! {"game_id": game_id, "is_published": false})
            .sort(doc! {"priority": 1, "_id": 1})
            .await
            .map_err(MongoDaoError::game("select next question", game_id))?;
        let Some(link) = link else {
            return Ok(None);
        };

        let question_id = link.question_id;
        let question = self
            .find_question(question_id)
            .await?
            .ok_or(MongoDaoError::DanglingLink {
                game_id,
                question_id,
            })?;
        Ok(Some((link.into(), question)))
    }

    async fn find_question(&self, id: QuestionId) -> MongoResult<Option<QuestionEntity>> {
        let document = self
            .questions()
            .find_one(doc! {"_id": id})
            .await
            .map_err(|source| MongoDaoError::LoadQuestion { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn activate_question(
        &self,
        game_id: GameId,
        question_id: QuestionId,
        at: SystemTime,
    ) -> MongoResult<bool> {
        let mut session = self.begin(game_id).await?;
        let outcome = self
            .activate_in(&mut session, game_id, question_id, at)
            .await;
        Self::finish(session, game_id, outcome).await
    }

    async fn activate_in(
        &self,
        session: &mut ClientSession,
        game_id: GameId,
        question_id: QuestionId,
        at: SystemTime,
    ) -> MongoResult<bool> {
        let at = bson_time(at);
        let published = self
            .links()
            .update_one(
                doc! {"game_id": game_id, "question_id": question_id, "is_published": false},
                doc! {"$set": {"is_published": true, "published_at": at}},
            )
            .session(&mut *session)
            .await
            .map_err(MongoDaoError::game("publish question", game_id))?;
        if published.matched_count == 0 {
            return Ok(false);
        }

        let current = self
            .games()
            .update_one(
                doc! {"_id": game_id},
                doc! {"$set": {"current_question_id": question_id}},
            )
            .session(&mut *session)
            .await
            .map_err(MongoDaoError::game("set current question", game_id))?;
        if current.matched_count == 0 {
            return Err(MongoDaoError::Vanished {
                game_id,
                what: "game row",
            });
        }

        self.games()
            .update_one(
                doc! {"_id": game_id, "status": GameStatus::Starting.as_str()},
                doc! {"$set": {"status": GameStatus::Started.as_str(), "started_at": at}},
            )
            .session(&mut *session)
            .await
            .map_err(MongoDaoError::game("mark game started", game_id))?;
        Ok(true)
    }

    async fn save_question_stats(
        &self,
        game_id: GameId,
        question_id: QuestionId,
        stats: QuestionStatsEntity,
    ) -> MongoResult<()> {
        self.links()
            .update_one(
                doc! {"game_id": game_id, "question_id": question_id},
                doc! {"$set": {"stats": MongoStatsDocument::to_document(&stats)}},
            )
            .await
            .map_err(MongoDaoError::game("save question stats", game_id))?;
        Ok(())
    }

    async fn upsert_participant(
        &self,
        game_id: GameId,
        user_id: UserId,
        role: ParticipantRole,
        at: SystemTime,
    ) -> MongoResult<(ParticipantEntity, bool)> {
        let filter = doc! {"game_id": game_id, "user_id": user_id};
        let update = doc! {
            "$setOnInsert": {
                "role": role.as_str(),
                "status": "Active",
                "is_winner": false,
                "joined_at": bson_time(at),
            }
        };

        let created = match self
            .participants()
            .update_one(filter.clone(), update)
            .upsert(true)
            .await
        {
            Ok(result) => result.upserted_id.is_some(),
            // a concurrent join inserted the row first
            Err(err) if is_duplicate_key(&err) => false,
            Err(source) => {
                return Err(MongoDaoError::Game {
                    operation: "join game",
                    game_id,
                    source,
                });
            }
        };

        let participant = self
            .participants()
            .find_one(filter)
            .await
            .map_err(MongoDaoError::game("load participant", game_id))?
            .ok_or(MongoDaoError::Vanished {
                game_id,
                what: "participant",
            })?;
        Ok((participant.into(), created))
    }

    async fn find_participant(
        &self,
        game_id: GameId,
        user_id: UserId,
    ) -> MongoResult<Option<ParticipantEntity>> {
        let document = self
            .participants()
            .find_one(doc! {"game_id": game_id, "user_id": user_id})
            .await
            .map_err(MongoDaoError::game("load participant", game_id))?;
        Ok(document.map(Into::into))
    }

    async fn load_answer(&self, key: &AnswerKey) -> MongoResult<Option<AnswerRecordEntity>> {
        let document = self
            .answers()
            .find_one(answer_filter(key))
            .await
            .map_err(MongoDaoError::game("load answer", key.game_id))?;
        Ok(document.map(Into::into))
    }

    async fn acknowledge_question(
        &self,
        key: AnswerKey,
        at: SystemTime,
    ) -> MongoResult<AnswerRecordEntity> {
        let at = bson_time(at);
        let insert = doc! {
            "$setOnInsert": {
                "answer": null,
                "is_correct": null,
                "status": AnswerStatus::Sent.as_str(),
                "acknowledged_at": at,
                "answered_at": null,
                "confirmed_at": null,
            }
        };
        match self
            .answers()
            .update_one(answer_filter(&key), insert)
            .upsert(true)
            .await
        {
            Ok(_) => {}
            Err(err) if is_duplicate_key(&err) => {}
            Err(source) => {
                return Err(MongoDaoError::Game {
                    operation: "acknowledge question",
                    game_id: key.game_id,
                    source,
                });
            }
        }

        // records created by an early answer only gain the acknowledgement time
        let mut unacknowledged = answer_filter(&key);
        unacknowledged.insert("acknowledged_at", mongodb::bson::Bson::Null);
        self.answers()
            .update_one(unacknowledged, doc! {"$set": {"acknowledged_at": at}})
            .await
            .map_err(MongoDaoError::game("acknowledge question", key.game_id))?;

        self.load_answer(&key).await?.ok_or(MongoDaoError::Vanished {
            game_id: key.game_id,
            what: "answer record",
        })
    }

    async fn upsert_answer(
        &self,
        key: AnswerKey,
        answer: u8,
        is_correct: bool,
        at: SystemTime,
    ) -> MongoResult<AnswerWrite> {
        let mut open = answer_filter(&key);
        open.insert("status", doc! {"$ne": AnswerStatus::Confirmed.as_str()});
        let update = doc! {
            "$set": {
                "answer": i32::from(answer),
                "is_correct": is_correct,
                "status": AnswerStatus::Answered.as_str(),
                "answered_at": bson_time(at),
            },
            "$setOnInsert": {
                "acknowledged_at": null,
                "confirmed_at": null,
            }
        };

        // A confirmed record makes the upsert collide with the unique index. Two
        // racing first submissions collide the same way, so the loser retries once.
        for _ in 0..2 {
            match self
                .answers()
                .update_one(open.clone(), update.clone())
                .upsert(true)
                .await
            {
                Ok(_) => break,
                Err(err) if is_duplicate_key(&err) => {
                    if let Some(record) = self.load_answer(&key).await? {
                        if record.status == AnswerStatus::Confirmed {
                            return Ok(AnswerWrite::Frozen(record));
                        }
                    }
                }
                Err(source) => {
                    return Err(MongoDaoError::Game {
                        operation: "record answer",
                        game_id: key.game_id,
                        source,
                    });
                }
            }
        }

        let record = self.load_answer(&key).await?.ok_or(MongoDaoError::Vanished {
            game_id: key.game_id,
            what: "answer record",
        })?;
        Ok(match record.status {
            AnswerStatus::Confirmed => AnswerWrite::Frozen(record),
            _ => AnswerWrite::Recorded(record),
        })
    }

    async fn confirm_answer(
        &self,
        key: AnswerKey,
        at: SystemTime,
        crown_if_correct: bool,
    ) -> MongoResult<Option<ConfirmedAnswer>> {
        let mut session = self.begin(key.game_id).await?;
        let outcome = self
            .confirm_in(&mut session, key, at, crown_if_correct)
            .await;
        Self::finish(session, key.game_id, outcome).await
    }

    async fn confirm_in(
        &self,
        session: &mut ClientSession,
        key: AnswerKey,
        at: SystemTime,
        crown_if_correct: bool,
    ) -> MongoResult<Option<ConfirmedAnswer>> {
        let game_id = key.game_id;
        let participant_filter = doc! {"game_id": game_id, "user_id": key.user_id};

        let Some(document) = self
            .answers()
            .find_one(answer_filter(&key))
            .session(&mut *session)
            .await
            .map_err(MongoDaoError::game("load answer", game_id))?
        else {
            return Ok(None);
        };
        let mut record: AnswerRecordEntity = document.into();

        let newly_confirmed = match record.status {
            AnswerStatus::Sent => return Ok(None),
            AnswerStatus::Confirmed => false,
            AnswerStatus::Answered => {
                let confirmed_at = bson_time(at);
                self.answers()
                    .update_one(
                        answer_filter(&key),
                        doc! {"$set": {
                            "status": AnswerStatus::Confirmed.as_str(),
                            "confirmed_at": confirmed_at,
                        }},
                    )
                    .session(&mut *session)
                    .await
                    .map_err(MongoDaoError::game("confirm answer", game_id))?;
                record.status = AnswerStatus::Confirmed;
                record.confirmed_at = Some(at);

                if crown_if_correct && record.is_correct == Some(true) {
                    self.participants()
                        .update_one(
                            participant_filter.clone(),
                            doc! {"$set": {"is_winner": true}},
                        )
                        .session(&mut *session)
                        .await
                        .map_err(MongoDaoError::game("crown winner", game_id))?;
                }
                true
            }
        };

        let is_winner = self
            .participants()
            .find_one(participant_filter)
            .session(&mut *session)
            .await
            .map_err(MongoDaoError::game("load participant", game_id))?
            .is_some_and(|participant| participant.is_winner);

        Ok(Some(ConfirmedAnswer {
            record,
            is_winner,
            newly_confirmed,
        }))
    }

    async fn tally_confirmed_answers(
        &self,
        game_id: GameId,
        question_id: QuestionId,
    ) -> MongoResult<AnswerTally> {
        let confirmed: Vec<MongoAnswerDocument> = self
            .answers()
            .find(doc! {
                "game_id": game_id,
                "question_id": question_id,
                "status": AnswerStatus::Confirmed.as_str(),
            })
            .await
            .map_err(MongoDaoError::game("tally answers", game_id))?
            .try_collect()
            .await
            .map_err(MongoDaoError::game("tally answers", game_id))?;

        let user_ids: Vec<UserId> = confirmed.iter().map(|answer| answer.user_id).collect();
        let players: HashSet<UserId> = self
            .participants()
            .find(doc! {
                "game_id": game_id,
                "role": ParticipantRole::Player.as_str(),
                "user_id": {"$in": user_ids},
            })
            .await
            .map_err(MongoDaoError::game("tally answers", game_id))?
            .map_ok(|participant| participant.user_id)
            .try_collect()
            .await
            .map_err(MongoDaoError::game("tally answers", game_id))?;

        let mut tally = AnswerTally::default();
        for answer in confirmed {
            if !players.contains(&answer.user_id) {
                continue;
            }
            if let Some(option) = answer.answer.and_then(|a| u8::try_from(a).ok()) {
                *tally.0.entry(option).or_default() += 1;
            }
        }
        Ok(tally)
    }

    async fn list_winners(&self, game_id: GameId) -> MongoResult<Vec<UserId>> {
        self.participants()
            .find(doc! {"game_id": game_id, "is_winner": true})
            .sort(doc! {"user_id": 1})
            .await
            .map_err(MongoDaoError::game("list winners", game_id))?
            .map_ok(|participant| participant.user_id)
            .try_collect()
            .await
            .map_err(MongoDaoError::game("list winners", game_id))
    }

    async fn reset_game(&self, game_id: GameId) -> MongoResult<bool> {
        let mut session = self.begin(game_id).await?;
        let outcome = self.reset_in(&mut session, game_id).await;
        Self::finish(session, game_id, outcome).await
    }

    async fn reset_in(&self, session: &mut ClientSession, game_id: GameId) -> MongoResult<bool> {
        let reopened = self
            .games()
            .update_one(
                doc! {"_id": game_id, "status": GameStatus::Finished.as_str()},
                doc! {"$set": {
                    "status": GameStatus::Active.as_str(),
                    "current_question_id": null,
                    "total_winners": 0_i64,
                    "opened_at": null,
                    "started_at": null,
                    "finished_at": null,
                    "closed_at": null,
                }},
            )
            .session(&mut *session)
            .await
            .map_err(MongoDaoError::game("reopen game", game_id))?;
        if reopened.matched_count == 0 {
            return Ok(false);
        }

        self.participants()
            .delete_many(doc! {"game_id": game_id})
            .session(&mut *session)
            .await
            .map_err(MongoDaoError::game("clear participants", game_id))?;
        self.answers()
            .delete_many(doc! {"game_id": game_id})
            .session(&mut *session)
            .await
            .map_err(MongoDaoError::game("clear answers", game_id))?;
        self.links()
            .update_many(
                doc! {"game_id": game_id},
                doc! {"$set": {"is_published": false, "published_at": null, "stats": null}},
            )
            .session(&mut *session)
            .await
            .map_err(MongoDaoError::game("clear links", game_id))?;
        Ok(true)
    }

    async fn ping(&self) -> MongoResult<()> {
        self.inner
            .database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }
}

fn patch_document(patch: &GamePatch) -> Document {
    let mut set = Document::new();
    if let Some(status) = patch.status {
        set.insert("status", status.as_str());
    }
    if let Some(id) = patch.current_question_id {
        set.insert("current_question_id", id);
    }
    if let Some(total) = patch.total_winners {
        set.insert("total_winners", total);
    }
    let stamps = [
        ("opened_at", patch.opened_at),
        ("started_at", patch.started_at),
        ("finished_at", patch.finished_at),
        ("closed_at", patch.closed_at),
    ];
    for (field, at) in stamps {
        if let Some(at) = at {
            set.insert(field, bson_time(at));
        }
    }
    set
}

impl GameStore for MongoGameStore {
    fn find_game(&self, id: GameId) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn update_game(
        &self,
        id: GameId,
        expected: Vec<GameStatus>,
        patch: GamePatch,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_game(id, expected, patch)
                .await
                .map_err(Into::into)
        })
    }

    fn count_game_questions(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<u32>> {
        let store = self.clone();
        Box::pin(async move { store.count_game_questions(game_id).await.map_err(Into::into) })
    }

    fn next_unpublished_question(
        &self,
        game_id: GameId,
    ) -> BoxFuture<'static, StorageResult<Option<(GameQuestionEntity, QuestionEntity)>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .next_unpublished_question(game_id)
                .await
                .map_err(Into::into)
        })
    }

    fn find_question(
        &self,
        id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_question(id).await.map_err(Into::into) })
    }

    fn activate_question(
        &self,
        game_id: GameId,
        question_id: QuestionId,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .activate_question(game_id, question_id, at)
                .await
                .map_err(Into::into)
        })
    }

    fn save_question_stats(
        &self,
        game_id: GameId,
        question_id: QuestionId,
        stats: QuestionStatsEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .save_question_stats(game_id, question_id, stats)
                .await
                .map_err(Into::into)
        })
    }

    fn upsert_participant(
        &self,
        game_id: GameId,
        user_id: UserId,
        role: ParticipantRole,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<(ParticipantEntity, bool)>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert_participant(game_id, user_id, role, at)
                .await
                .map_err(Into::into)
        })
    }

    fn find_participant(
        &self,
        game_id: GameId,
        user_id: UserId,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_participant(game_id, user_id)
                .await
                .map_err(Into::into)
        })
    }

    fn acknowledge_question(
        &self,
        key: AnswerKey,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<AnswerRecordEntity>> {
        let store = self.clone();
        Box::pin(async move { store.acknowledge_question(key, at).await.map_err(Into::into) })
    }

    fn upsert_answer(
        &self,
        key: AnswerKey,
        answer: u8,
        is_correct: bool,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<AnswerWrite>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert_answer(key, answer, is_correct, at)
                .await
                .map_err(Into::into)
        })
    }

    fn find_answer(
        &self,
        key: AnswerKey,
    ) -> BoxFuture<'static, StorageResult<Option<AnswerRecordEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load_answer(&key).await.map_err(Into::into) })
    }

    fn confirm_answer(
        &self,
        key: AnswerKey,
        at: SystemTime,
        crown_if_correct: bool,
    ) -> BoxFuture<'static, StorageResult<Option<ConfirmedAnswer>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .confirm_answer(key, at, crown_if_correct)
                .await
                .map_err(Into::into)
        })
    }

    fn tally_confirmed_answers(
        &self,
        game_id: GameId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<AnswerTally>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .tally_confirmed_answers(game_id, question_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_winners(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<Vec<UserId>>> {
        let store = self.clone();
        Box::pin(async move { store.list_winners(game_id).await.map_err(Into::into) })
    }

    fn reset_game(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.reset_game(game_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }
}
