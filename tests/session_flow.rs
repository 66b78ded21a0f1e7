use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use futures::future::BoxFuture;
use live_trivia_back::{
    config::AppConfig,
    dao::{
        game_store::{GameStore, memory::MemoryGameStore},
        models::{
            AnswerKey, AnswerRecordEntity, AnswerTally, AnswerWrite, ConfirmedAnswer, GameEntity,
            GameId, GamePatch, GameQuestionEntity, GameStatus, ParticipantEntity,
            ParticipantRole, QuestionEntity, QuestionId, QuestionStatsEntity, QuestionStatus,
            SeedData, UserId,
        },
        session_store::memory::MemorySessionStore,
        storage::StorageResult,
    },
    dto::ws::OutboundEvent,
    error::ServiceError,
    services::{answer_service, question_service, session_service},
    state::{AppState, SessionSnapshot, SharedState, state_machine::SessionPhase},
};
use tokio::{sync::broadcast, time::sleep};

const GAME: i64 = 1;
const SECRET: &str = "s3cret";

fn seed() -> SeedData {
    let question = |id, text: &str, correct_answer| QuestionEntity {
        id,
        text: text.into(),
        options: vec!["one".into(), "two".into(), "three".into()],
        correct_answer,
        level: Some(1),
        status: QuestionStatus::New,
    };
    let link = |link_id, question_id, priority| GameQuestionEntity {
        link_id,
        game_id: GAME,
        question_id,
        priority,
        is_published: false,
        published_at: None,
        stats: None,
    };
    SeedData {
        games: vec![GameEntity {
            id: GAME,
            secret: SECRET.into(),
            title: "Friday quiz".into(),
            prize_name: Some("cash".into()),
            prize_pool: 100,
            status: GameStatus::Active,
            current_question_id: None,
            total_winners: 0,
            opened_at: None,
            started_at: None,
            finished_at: None,
            closed_at: None,
        }],
        questions: vec![question(10, "First?", 2), question(11, "Last?", 1)],
        links: vec![link(1, 10, 1), link(2, 11, 2)],
    }
}

fn config(ticks: u32, tick_ms: u64) -> AppConfig {
    AppConfig {
        countdown_ticks: ticks,
        tick_interval: Duration::from_millis(tick_ms),
        stats_interval: Duration::from_secs(60),
        expiry_grace: Duration::ZERO,
        ..AppConfig::default()
    }
}

/// One server process over the given stores.
fn process(
    store: Arc<dyn GameStore>,
    sessions: &MemorySessionStore,
    ticks: u32,
    tick_ms: u64,
) -> SharedState {
    AppState::new(config(ticks, tick_ms), store, Arc::new(sessions.clone()), None)
}

fn app(ticks: u32, tick_ms: u64) -> (SharedState, MemoryGameStore) {
    let store = MemoryGameStore::with_seed(seed());
    let state = process(
        Arc::new(store.clone()),
        &MemorySessionStore::new(),
        ticks,
        tick_ms,
    );
    (state, store)
}

/// Game store whose question lookups and activations answer late.
#[derive(Clone)]
struct SlowStore {
    inner: MemoryGameStore,
    lookup_delay: Duration,
    activation_delay: Duration,
}

impl SlowStore {
    fn new(inner: MemoryGameStore) -> Self {
        Self {
            inner,
            lookup_delay: Duration::ZERO,
            activation_delay: Duration::ZERO,
        }
    }
}

impl GameStore for SlowStore {
    fn find_game(&self, id: GameId) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        self.inner.find_game(id)
    }

    fn update_game(
        &self,
        id: GameId,
        expected: Vec<GameStatus>,
        patch: GamePatch,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.update_game(id, expected, patch)
    }

    fn count_game_questions(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<u32>> {
        self.inner.count_game_questions(game_id)
    }

    fn next_unpublished_question(
        &self,
        game_id: GameId,
    ) -> BoxFuture<'static, StorageResult<Option<(GameQuestionEntity, QuestionEntity)>>> {
        let inner = self.inner.clone();
        let delay = self.lookup_delay;
        Box::pin(async move {
            sleep(delay).await;
            inner.next_unpublished_question(game_id).await
        })
    }

    fn find_question(
        &self,
        id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        self.inner.find_question(id)
    }

    fn activate_question(
        &self,
        game_id: GameId,
        question_id: QuestionId,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        let delay = self.activation_delay;
        Box::pin(async move {
            sleep(delay).await;
            inner.activate_question(game_id, question_id, at).await
        })
    }

    fn save_question_stats(
        &self,
        game_id: GameId,
        question_id: QuestionId,
        stats: QuestionStatsEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_question_stats(game_id, question_id, stats)
    }

    fn upsert_participant(
        &self,
        game_id: GameId,
        user_id: UserId,
        role: ParticipantRole,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<(ParticipantEntity, bool)>> {
        self.inner.upsert_participant(game_id, user_id, role, at)
    }

    fn find_participant(
        &self,
        game_id: GameId,
        user_id: UserId,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        self.inner.find_participant(game_id, user_id)
    }

    fn acknowledge_question(
        &self,
        key: AnswerKey,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<AnswerRecordEntity>> {
        self.inner.acknowledge_question(key, at)
    }

    fn upsert_answer(
        &self,
        key: AnswerKey,
        answer: u8,
        is_correct: bool,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<AnswerWrite>> {
        self.inner.upsert_answer(key, answer, is_correct, at)
    }

    fn find_answer(
        &self,
        key: AnswerKey,
    ) -> BoxFuture<'static, StorageResult<Option<AnswerRecordEntity>>> {
        self.inner.find_answer(key)
    }

    fn confirm_answer(
        &self,
        key: AnswerKey,
        at: SystemTime,
        crown_if_correct: bool,
    ) -> BoxFuture<'static, StorageResult<Option<ConfirmedAnswer>>> {
        self.inner.confirm_answer(key, at, crown_if_correct)
    }

    fn tally_confirmed_answers(
        &self,
        game_id: GameId,
        question_id: QuestionId,
    ) -> BoxFuture<'static, StorageResult<AnswerTally>> {
        self.inner.tally_confirmed_answers(game_id, question_id)
    }

    fn list_winners(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<Vec<UserId>>> {
        self.inner.list_winners(game_id)
    }

    fn reset_game(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.reset_game(game_id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }
}

fn drain(rx: &mut broadcast::Receiver<OutboundEvent>) -> Vec<OutboundEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn count(events: &[OutboundEvent], name: &str) -> usize {
    events.iter().filter(|event| event.name() == name).count()
}

fn timer_counters(events: &[OutboundEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|event| match event {
            OutboundEvent::Timer(timer) => Some(timer.counter),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn start_with_wrong_secret_changes_nothing() {
    let (state, store) = app(10, 1000);

    let wrong = session_service::start(&state, GAME, "nope").await.unwrap_err();
    let unknown = session_service::start(&state, 99, SECRET).await.unwrap_err();
    assert!(matches!(wrong, ServiceError::NotFound(_)));
    assert_eq!(wrong.public_message(), unknown.public_message());

    let game = store.find_game(GAME).await.unwrap().unwrap();
    assert_eq!(game.status, GameStatus::Active);
    assert_eq!(state.sessions().get().await.unwrap(), None);
}

#[tokio::test]
async fn start_twice_names_the_phase() {
    let (state, _) = app(10, 1000);
    let view = session_service::start(&state, GAME, SECRET).await.unwrap();
    assert_eq!(view.phase, SessionPhase::Starting);
    assert_eq!(view.total_questions, 2);

    let err = session_service::start(&state, GAME, SECRET).await.unwrap_err();
    assert_eq!(err.public_message(), "the game is starting");
}

#[tokio::test]
async fn concurrent_pushes_serve_one_question() {
    let (state, _) = app(10, 1000);
    let mut rx = state.hub().subscribe();
    session_service::start(&state, GAME, SECRET).await.unwrap();

    let (first, second) = tokio::join!(
        question_service::push_question(&state, GAME, SECRET),
        question_service::push_question(&state, GAME, SECRET),
    );
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first, second);
    assert_eq!(first.question_id, 10);

    let snapshot = state.sessions().get().await.unwrap().unwrap();
    assert_eq!(snapshot.current_question_index, 1);
    assert_eq!(snapshot.phase, SessionPhase::Started);
    assert_eq!(count(&drain(&mut rx), "question_up"), 1);
}

#[tokio::test]
async fn push_without_questions_left_conflicts() {
    let (state, _) = app(10, 1000);
    session_service::start(&state, GAME, SECRET).await.unwrap();
    for _ in 0..2 {
        question_service::push_question(&state, GAME, SECRET)
            .await
            .unwrap();
        question_service::retract_question(&state, GAME, SECRET)
            .await
            .unwrap();
    }

    let err = question_service::push_question(&state, GAME, SECRET)
        .await
        .unwrap_err();
    assert_eq!(err.public_message(), "there are no other questions to submit");
    let snapshot = state.sessions().get().await.unwrap().unwrap();
    assert_eq!(snapshot.current_question_id, Some(11));
    assert_eq!(snapshot.current_question_index, 2);
}

#[tokio::test]
async fn countdown_ticks_down_then_expires() {
    let (state, _) = app(3, 20);
    let mut rx = state.hub().subscribe();
    session_service::start(&state, GAME, SECRET).await.unwrap();
    question_service::push_question(&state, GAME, SECRET)
        .await
        .unwrap();

    sleep(Duration::from_millis(300)).await;

    assert_eq!(timer_counters(&drain(&mut rx)), vec![2, 1, 0]);

    let snapshot = state.sessions().get().await.unwrap().unwrap();
    assert!(snapshot.can_advance_question);
    assert!(snapshot.countdown.is_none());
}

#[tokio::test]
async fn no_tick_follows_a_retraction() {
    let (state, _) = app(10, 30);
    let mut rx = state.hub().subscribe();
    session_service::start(&state, GAME, SECRET).await.unwrap();
    question_service::push_question(&state, GAME, SECRET)
        .await
        .unwrap();
    sleep(Duration::from_millis(45)).await;

    let retracted = question_service::retract_question(&state, GAME, SECRET)
        .await
        .unwrap();
    assert_eq!(retracted.question_id, 10);
    sleep(Duration::from_millis(150)).await;

    let names: Vec<&str> = drain(&mut rx).iter().map(OutboundEvent::name).collect();
    let down = names
        .iter()
        .position(|name| *name == "question_down")
        .unwrap();
    assert!(!names[down..].contains(&"timer"));

    let err = question_service::retract_question(&state, GAME, SECRET)
        .await
        .unwrap_err();
    assert_eq!(err.public_message(), "no question is live");
}

#[tokio::test]
async fn resubmission_overwrites_until_confirmed() {
    let (state, store) = app(10, 1000);
    session_service::start(&state, GAME, SECRET).await.unwrap();
    let joined = answer_service::join(&state, 7).await.unwrap();
    assert_eq!(joined.role, "Player");
    question_service::push_question(&state, GAME, SECRET)
        .await
        .unwrap();

    answer_service::record_answer(&state, 7, 1).await.unwrap();
    answer_service::record_answer(&state, 7, 2).await.unwrap();
    let key = AnswerKey {
        game_id: GAME,
        user_id: 7,
        question_id: 10,
    };
    let record = store.find_answer(key).await.unwrap().unwrap();
    assert_eq!(record.answer, Some(2));
    assert_eq!(record.is_correct, Some(true));

    let check = answer_service::confirm_answer(&state, GAME, 7).await.unwrap();
    assert!(check.is_qualified);
    assert_eq!(check.user_answer, 2);
    assert!(!check.is_winner);

    let err = answer_service::record_answer(&state, 7, 3).await.unwrap_err();
    assert_eq!(err.public_message(), "the answer is already confirmed");

    let out_of_range = answer_service::record_answer(&state, 7, 4).await.unwrap_err();
    assert!(matches!(out_of_range, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn confirmation_without_answer_is_not_qualified() {
    let (state, _) = app(10, 1000);
    session_service::start(&state, GAME, SECRET).await.unwrap();
    answer_service::join(&state, 7).await.unwrap();
    question_service::push_question(&state, GAME, SECRET)
        .await
        .unwrap();
    answer_service::acknowledge_question(&state, 7).await.unwrap();

    let check = answer_service::confirm_answer(&state, GAME, 7).await.unwrap();
    assert!(!check.is_qualified);
    assert_eq!(check.user_answer, 0);
}

#[tokio::test]
async fn result_with_no_winner_pays_nothing() {
    let (state, store) = app(10, 1000);
    session_service::start(&state, GAME, SECRET).await.unwrap();
    question_service::push_question(&state, GAME, SECRET)
        .await
        .unwrap();
    question_service::retract_question(&state, GAME, SECRET)
        .await
        .unwrap();

    let result = session_service::reveal_result(&state, GAME, SECRET)
        .await
        .unwrap();
    assert_eq!(result.prize_per_user, 0);
    assert!(result.winners.is_empty());

    let game = store.find_game(GAME).await.unwrap().unwrap();
    assert_eq!(game.status, GameStatus::Finished);
    assert_eq!(game.total_winners, 0);
}

#[tokio::test]
async fn full_game_crowns_last_question_and_resets() {
    let (state, store) = app(10, 1000);
    let mut rx = state.hub().subscribe();
    session_service::start(&state, GAME, SECRET).await.unwrap();
    answer_service::join(&state, 7).await.unwrap();
    answer_service::join(&state, 8).await.unwrap();

    question_service::push_question(&state, GAME, SECRET)
        .await
        .unwrap();
    let late = answer_service::join(&state, 9).await.unwrap();
    assert_eq!(late.role, "Observer");
    answer_service::record_answer(&state, 7, 2).await.unwrap();
    answer_service::record_answer(&state, 8, 1).await.unwrap();
    answer_service::record_answer(&state, 9, 2).await.unwrap();
    question_service::retract_question(&state, GAME, SECRET)
        .await
        .unwrap();
    for user in [7, 8, 9] {
        let check = answer_service::confirm_answer(&state, GAME, user).await.unwrap();
        assert!(!check.is_winner);
    }

    let stats = answer_service::reveal_answer(&state, GAME, SECRET)
        .await
        .unwrap();
    assert_eq!(stats.total_count, 2);
    assert_eq!(stats.correct_count, 1);
    assert_eq!(stats.options.iter().map(|o| o.count).sum::<u32>(), stats.total_count);
    answer_service::hide_answer(&state, GAME, SECRET).await.unwrap();

    question_service::push_question(&state, GAME, SECRET)
        .await
        .unwrap();
    answer_service::record_answer(&state, 7, 1).await.unwrap();
    answer_service::record_answer(&state, 8, 3).await.unwrap();
    answer_service::record_answer(&state, 9, 1).await.unwrap();
    question_service::retract_question(&state, GAME, SECRET)
        .await
        .unwrap();

    let winner = answer_service::confirm_answer(&state, GAME, 7).await.unwrap();
    assert!(winner.is_winner);
    assert_eq!(winner.question_index, 2);
    let again = answer_service::confirm_answer(&state, GAME, 7).await.unwrap();
    assert_eq!(again, winner);
    assert!(!answer_service::confirm_answer(&state, GAME, 8).await.unwrap().is_winner);
    assert!(!answer_service::confirm_answer(&state, GAME, 9).await.unwrap().is_winner);

    let result = session_service::reveal_result(&state, GAME, SECRET)
        .await
        .unwrap();
    assert_eq!(result.total_winners, 1);
    assert_eq!(result.prize_per_user, 100);
    assert_eq!(result.winners[0].user_id, 7);

    let view = session_service::reset(&state, GAME, SECRET).await.unwrap();
    assert_eq!(view.phase, SessionPhase::Active);
    assert_eq!(view.current_question_id, None);
    assert_eq!(state.sessions().get().await.unwrap(), None);

    let key = AnswerKey {
        game_id: GAME,
        user_id: 7,
        question_id: 11,
    };
    assert_eq!(store.find_answer(key).await.unwrap(), None);
    let (next_link, _) = store.next_unpublished_question(GAME).await.unwrap().unwrap();
    assert_eq!(next_link.question_id, 10);
    assert_eq!(next_link.stats, None);
    let game = store.find_game(GAME).await.unwrap().unwrap();
    assert_eq!(game.status, GameStatus::Active);
    assert_eq!(game.current_question_id, None);

    let names: Vec<&str> = drain(&mut rx).iter().map(OutboundEvent::name).collect();
    for expected in ["start_game", "question_up", "answer_up", "answer_down", "result_up", "reset"] {
        assert!(names.contains(&expected), "missing {expected}");
    }
}

#[tokio::test]
async fn reset_before_finish_conflicts() {
    let (state, _) = app(10, 1000);
    session_service::start(&state, GAME, SECRET).await.unwrap();
    let err = session_service::reset(&state, GAME, SECRET).await.unwrap_err();
    assert_eq!(err.public_message(), "the game is not over yet");
    let snapshot = state.sessions().get().await.unwrap().unwrap();
    assert_eq!(snapshot.phase, SessionPhase::Starting);
}

#[tokio::test]
async fn stop_closes_the_session() {
    let (state, _) = app(10, 1000);
    let mut rx = state.hub().subscribe();
    session_service::start(&state, GAME, SECRET).await.unwrap();
    let view = session_service::stop(&state, GAME, SECRET).await.unwrap();
    assert_eq!(view.phase, SessionPhase::Finished);
    assert!(view.closed_at.is_some());
    assert_eq!(count(&drain(&mut rx), "leave"), 1);

    let err = answer_service::join(&state, 7).await.unwrap_err();
    assert_eq!(err.public_message(), "the game is over");
}

#[tokio::test]
async fn dropped_command_releases_the_session() {
    let store = MemoryGameStore::with_seed(seed());
    let slow = SlowStore {
        lookup_delay: Duration::from_millis(300),
        ..SlowStore::new(store.clone())
    };
    let state = process(Arc::new(slow), &MemorySessionStore::new(), 10, 1000);
    session_service::start(&state, GAME, SECRET).await.unwrap();

    let push = tokio::spawn({
        let state = Arc::clone(&state);
        async move { question_service::push_question(&state, GAME, SECRET).await }
    });
    sleep(Duration::from_millis(50)).await;
    push.abort();
    assert!(push.await.unwrap_err().is_cancelled());

    let pushed = question_service::push_question(&state, GAME, SECRET)
        .await
        .unwrap();
    assert_eq!(pushed.question_id, 10);
    let view = session_service::stop(&state, GAME, SECRET).await.unwrap();
    assert_eq!(view.phase, SessionPhase::Finished);
}

#[tokio::test]
async fn racing_processes_serve_the_first_question_once() {
    let store = MemoryGameStore::with_seed(seed());
    let sessions = MemorySessionStore::new();
    let first = process(Arc::new(store.clone()), &sessions, 10, 30);
    let slow = SlowStore {
        activation_delay: Duration::from_millis(200),
        ..SlowStore::new(store.clone())
    };
    let second = process(Arc::new(slow), &sessions, 10, 30);
    let mut first_rx = first.hub().subscribe();
    let mut second_rx = second.hub().subscribe();
    session_service::start(&first, GAME, SECRET).await.unwrap();

    let claimed = tokio::spawn({
        let second = Arc::clone(&second);
        async move { question_service::push_question(&second, GAME, SECRET).await }
    });
    sleep(Duration::from_millis(50)).await;
    let live = question_service::push_question(&first, GAME, SECRET)
        .await
        .unwrap();
    let served = claimed.await.unwrap().unwrap();
    assert_eq!(served.question_id, 10);
    assert_eq!(live, served);

    sleep(Duration::from_millis(600)).await;
    let first_events = drain(&mut first_rx);
    let second_events = drain(&mut second_rx);
    assert_eq!(
        count(&first_events, "question_up") + count(&second_events, "question_up"),
        1
    );
    assert!(timer_counters(&first_events).is_empty());
    assert_eq!(
        timer_counters(&second_events),
        (0..10).rev().collect::<Vec<u32>>()
    );

    let snapshot = sessions_snapshot(&first).await;
    assert_eq!(snapshot.phase, SessionPhase::Started);
    assert_eq!(snapshot.current_question_id, Some(10));
    assert!(snapshot.can_advance_question);
    assert!(snapshot.countdown.is_none());
    let (next_link, _) = store.next_unpublished_question(GAME).await.unwrap().unwrap();
    assert_eq!(next_link.question_id, 11);
}

#[tokio::test]
async fn every_process_reports_its_own_connections() {
    let store = MemoryGameStore::with_seed(seed());
    let sessions = MemorySessionStore::new();
    let opener = process(Arc::new(store.clone()), &sessions, 10, 1000);
    let other = process(Arc::new(store), &sessions, 10, 1000);
    session_service::start(&opener, GAME, SECRET).await.unwrap();
    assert!(opener.broadcasts_stats_for(GAME));
    assert!(!other.broadcasts_stats_for(GAME));

    let mut rx = other.hub().subscribe();
    answer_service::join(&other, 7).await.unwrap();
    assert!(other.broadcasts_stats_for(GAME));
    sleep(Duration::from_millis(50)).await;
    assert!(count(&drain(&mut rx), "game_stats") >= 1);
}

#[tokio::test]
async fn rejected_commands_broadcast_nothing() {
    let (state, _) = app(10, 1000);
    session_service::start(&state, GAME, SECRET).await.unwrap();
    let before = sessions_snapshot(&state).await;
    let mut rx = state.hub().subscribe();

    let wrong = session_service::stop(&state, GAME, "nope").await.unwrap_err();
    assert!(matches!(wrong, ServiceError::NotFound(_)));
    let early = session_service::reveal_result(&state, GAME, SECRET)
        .await
        .unwrap_err();
    assert_eq!(early.public_message(), "no question has been played yet");
    assert!(question_service::retract_question(&state, GAME, SECRET).await.is_err());
    assert!(answer_service::reveal_answer(&state, GAME, SECRET).await.is_err());
    assert!(session_service::reset(&state, GAME, SECRET).await.is_err());

    sleep(Duration::from_millis(20)).await;
    let shared: Vec<&str> = drain(&mut rx)
        .iter()
        .filter(|event| event.is_shared())
        .map(OutboundEvent::name)
        .collect();
    assert!(shared.is_empty(), "unexpected events {shared:?}");
    assert_eq!(sessions_snapshot(&state).await, before);
}

#[tokio::test]
async fn exhausted_push_broadcasts_nothing() {
    let (state, _) = app(10, 1000);
    session_service::start(&state, GAME, SECRET).await.unwrap();
    for _ in 0..2 {
        question_service::push_question(&state, GAME, SECRET)
            .await
            .unwrap();
        question_service::retract_question(&state, GAME, SECRET)
            .await
            .unwrap();
    }
    let mut rx = state.hub().subscribe();

    assert!(question_service::push_question(&state, GAME, SECRET).await.is_err());
    sleep(Duration::from_millis(20)).await;
    assert!(drain(&mut rx).iter().all(|event| !event.is_shared()));
}

#[tokio::test]
async fn no_tick_follows_a_stop() {
    let (state, _) = app(10, 20);
    let mut rx = state.hub().subscribe();
    session_service::start(&state, GAME, SECRET).await.unwrap();
    question_service::push_question(&state, GAME, SECRET)
        .await
        .unwrap();
    sleep(Duration::from_millis(50)).await;

    session_service::stop(&state, GAME, SECRET).await.unwrap();
    sleep(Duration::from_millis(150)).await;

    let names: Vec<&str> = drain(&mut rx).iter().map(OutboundEvent::name).collect();
    let leave = names.iter().position(|name| *name == "leave").unwrap();
    assert!(!names[leave..].contains(&"timer"));
}

async fn sessions_snapshot(state: &SharedState) -> SessionSnapshot {
    state.sessions().get().await.unwrap().unwrap()
}
