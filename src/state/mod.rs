pub mod hub;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod state_machine;
pub mod transitions;

use std::{
    future::Future,
    sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError},
};

use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{MissedTickBehavior, interval, timeout},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        game_store::GameStore,
        models::{GameId, QuestionId},
        relay::FanoutRelay,
        session_store::SessionStore,
        storage::StorageResult,
    },
    dto::ws::{GameStatsPayload, OutboundEvent},
    error::ServiceError,
};

pub use self::hub::BroadcastHub;
pub use self::registry::ConnectionRegistry;
pub use self::session::{Mutation, SessionStateStore};
pub use self::snapshot::SessionSnapshot;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId};
use self::state_machine::{SessionEvent, SessionPhase, SessionStateMachine};

pub type SharedState = Arc<AppState>;

/// Countdown task running on this process.
pub struct LocalCountdown {
    /// Question the task counts down.
    pub question_id: QuestionId,
    /// Handle used to cancel the task.
    pub handle: JoinHandle<()>,
}

/// Central application state: stores, broadcast hub, connection registry and timers.
pub struct AppState {
    config: AppConfig,
    process_id: Uuid,
    game_store: Arc<dyn GameStore>,
    sessions: SessionStateStore,
    hub: Arc<BroadcastHub>,
    connections: ConnectionRegistry,
    machine: StdMutex<SessionStateMachine>,
    transition_gate: Mutex<()>,
    countdown: Mutex<Option<LocalCountdown>>,
    stats_task: StdMutex<Option<(GameId, JoinHandle<()>)>>,
}

/// Pending plan of an in-flight command, discarded on drop unless it was taken.
struct PendingPlan<'a> {
    machine: &'a StdMutex<SessionStateMachine>,
    id: PlanId,
    event: SessionEvent,
    armed: bool,
}

impl<'a> PendingPlan<'a> {
    fn new(
        machine: &'a StdMutex<SessionStateMachine>,
        event: SessionEvent,
        from: SessionPhase,
    ) -> Result<Self, PlanError> {
        let id = lock_machine(machine).plan(from, event)?.id;
        Ok(Self {
            machine,
            id,
            event,
            armed: true,
        })
    }

    fn take(mut self) -> Result<Plan, ApplyError> {
        self.armed = false;
        lock_machine(self.machine).take(self.id)
    }
}

impl Drop for PendingPlan<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match lock_machine(self.machine).abort(self.id) {
            Ok(()) => debug!(event = ?self.event, plan_id = %self.id, "transition discarded"),
            Err(err) => warn!(
                event = ?self.event,
                plan_id = %self.id,
                error = ?err,
                "failed to discard transition"
            ),
        }
    }
}

fn lock_machine(machine: &StdMutex<SessionStateMachine>) -> MutexGuard<'_, SessionStateMachine> {
    machine.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        game_store: Arc<dyn GameStore>,
        session_store: Arc<dyn SessionStore>,
        relay: Option<Arc<dyn FanoutRelay>>,
    ) -> SharedState {
        let process_id = Uuid::new_v4();
        let sessions = SessionStateStore::new(session_store, config.cas_max_attempts);
        let hub = Arc::new(BroadcastHub::new(config.hub_capacity, process_id, relay));
        info!(process_id = %process_id, "application state initialised");

        Arc::new(Self {
            config,
            process_id,
            game_store,
            sessions,
            hub,
            connections: ConnectionRegistry::new(),
            machine: StdMutex::new(SessionStateMachine::new()),
            transition_gate: Mutex::new(()),
            countdown: Mutex::new(None),
            stats_task: StdMutex::new(None),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Identifier of this server process, used as countdown owner and relay origin.
    pub fn process_id(&self) -> Uuid {
        self.process_id
    }

    pub fn game_store(&self) -> &Arc<dyn GameStore> {
        &self.game_store
    }

    pub fn sessions(&self) -> &SessionStateStore {
        &self.sessions
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Registry of participant sockets open on this process.
    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Gate held while touching the local countdown task.
    pub fn countdown(&self) -> &Mutex<Option<LocalCountdown>> {
        &self.countdown
    }

    /// Grace period applied to countdowns whose owner went silent, in milliseconds.
    pub fn expiry_grace_ms(&self) -> i64 {
        i64::try_from(self.config.expiry_grace.as_millis()).unwrap_or(i64::MAX)
    }

    /// Run a durable store call under the configured timeout.
    pub async fn durable<T, F>(&self, call: F) -> Result<T, ServiceError>
    where
        F: Future<Output = StorageResult<T>>,
    {
        match timeout(self.config.store_timeout, call).await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => {
                warn!(
                    timeout_ms = self.config.store_timeout.as_millis() as u64,
                    "durable store call timed out"
                );
                Err(ServiceError::Timeout)
            }
        }
    }

    /// Snapshot of `game_id`, failing when another game (or none) is live.
    pub async fn require_session(&self, game_id: GameId) -> Result<SessionSnapshot, ServiceError> {
        match self.sessions.get().await? {
            Some(snapshot) if snapshot.game_id == game_id => Ok(snapshot),
            _ => Err(ServiceError::InvalidState("the game is not running".into())),
        }
    }

    /// Cancel the local countdown task, if any.
    pub async fn cancel_countdown(&self) -> Option<QuestionId> {
        let mut slot = self.countdown.lock().await;
        let running = slot.take()?;
        running.handle.abort();
        Some(running.question_id)
    }

    /// Snapshot of whichever game is live, failing when none is.
    pub async fn live_session(&self) -> Result<SessionSnapshot, ServiceError> {
        self.sessions
            .get()
            .await?
            .ok_or_else(|| ServiceError::InvalidState("no game is running".into()))
    }

    /// Plan `event` from the phase `observe` reads off the current snapshot, run the
    /// durable `work` under the store timeout, then let `commit` decide the snapshot
    /// mutation in a single compare-and-swap.
    ///
    /// Operator commands of this process are serialized by the transition gate.
    /// A failed, timed out or dropped `work` discards the plan and leaves the snapshot
    /// untouched.
    pub async fn run_transition<O, W, Fut, T, C>(
        &self,
        event: SessionEvent,
        observe: O,
        work: W,
        commit: C,
    ) -> Result<(T, Option<SessionSnapshot>), ServiceError>
    where
        O: FnOnce(Option<&SessionSnapshot>) -> Result<SessionPhase, ServiceError>,
        W: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
        C: Fn(Option<&SessionSnapshot>, &Plan, &T) -> Result<Mutation<()>, ServiceError>,
    {
        let gate = self.transition_gate.lock().await;
        let current = self.sessions.get().await?;
        let from = observe(current.as_ref())?;
        let pending = PendingPlan::new(&self.machine, event, from)?;
        let plan_id = pending.id;

        let value = match timeout(self.config.store_timeout, work()).await {
            Ok(result) => result?,
            Err(_) => return Err(ServiceError::Timeout),
        };

        let plan = pending.take()?;
        let applied = self
            .sessions
            .update(|current| commit(current, &plan, &value))
            .await;
        drop(gate);

        match applied {
            Ok(((), stored)) => {
                debug!(event = ?event, from = ?plan.from, to = ?plan.to, "transition applied");
                Ok((value, stored))
            }
            Err(err) => {
                warn!(
                    event = ?event,
                    plan_id = %plan_id,
                    error = %err,
                    "durable work done but the snapshot could not follow"
                );
                Err(err)
            }
        }
    }

    /// [`AppState::run_transition`] for commands addressing the live session of `game_id`:
    /// the plan is applied onto that snapshot, then `amend` adjusts it.
    pub async fn run_session_transition<W, Fut, T, A>(
        &self,
        game_id: GameId,
        event: SessionEvent,
        work: W,
        amend: A,
    ) -> Result<(T, SessionSnapshot), ServiceError>
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
        A: Fn(&mut SessionSnapshot, &T),
    {
        let (value, stored) = self
            .run_transition(
                event,
                |current| match current {
                    Some(snapshot) if snapshot.game_id == game_id => Ok(snapshot.phase),
                    _ => Err(ServiceError::InvalidState("the game is not running".into())),
                },
                work,
                |current, plan, value| {
                    let Some(current) = current.filter(|snapshot| snapshot.game_id == game_id)
                    else {
                        return Err(ApplyError::SessionMismatch.into());
                    };
                    let mut next = current.clone();
                    plan.apply_to(&mut next)?;
                    amend(&mut next, value);
                    Ok(Mutation::Write(next, ()))
                },
            )
            .await?;
        let stored = stored.ok_or(ApplyError::SessionMismatch)?;
        Ok((value, stored))
    }

    /// Make sure this process runs the periodic `game_stats` broadcast for `game_id`.
    ///
    /// Called by the command that opens the game and by every participant connecting
    /// here, so each process reports its own sockets.
    pub fn ensure_stats_broadcaster(self: &Arc<Self>, game_id: GameId) {
        let mut slot = self.stats_task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((running_game, task)) = slot.as_ref() {
            if *running_game == game_id && !task.is_finished() {
                return;
            }
            task.abort();
        }
        let state = Arc::clone(self);
        let task = tokio::spawn(async move {
            state.broadcast_stats_until_finished(game_id).await;
        });
        *slot = Some((game_id, task));
        debug!(game_id, "game stats broadcaster started");
    }

    /// Whether this process currently broadcasts `game_stats` for `game_id`.
    pub fn broadcasts_stats_for(&self, game_id: GameId) -> bool {
        let slot = self.stats_task.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref()
            .is_some_and(|(running_game, task)| *running_game == game_id && !task.is_finished())
    }

    /// Stop the periodic `game_stats` broadcast.
    pub fn stop_stats_broadcaster(&self) {
        let mut slot = self.stats_task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, task)) = slot.take() {
            task.abort();
        }
    }

    async fn broadcast_stats_until_finished(&self, game_id: GameId) {
        let mut ticker = interval(self.config.stats_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match self.sessions.get().await {
                Ok(Some(snapshot))
                    if snapshot.game_id == game_id && snapshot.phase != SessionPhase::Finished => {}
                Ok(_) => break,
                Err(err) => {
                    warn!(game_id, error = %err, "failed to read snapshot for game stats");
                    continue;
                }
            }
            self.hub.publish_local(OutboundEvent::GameStats(GameStatsPayload {
                connected_count: self.connections.len(),
            }));
        }
        debug!(game_id, "game stats broadcaster stopped");
    }
}
