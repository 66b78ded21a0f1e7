//! Operator commands opening, closing and resetting the live session.

use std::time::SystemTime;

use tracing::info;

use crate::{
    dao::models::{GameEntity, GameId, GamePatch, GameStatus},
    dto::{
        session::SessionView,
        ws::{GameRefPayload, OutboundEvent, ResultPayload, StartGamePayload},
    },
    error::ServiceError,
    services::winner_service::split_prize,
    state::{
        ApplyError, LocalCountdown, Mutation, SharedState,
        snapshot::{SessionSnapshot, now_ms},
        state_machine::{SessionEvent, SessionPhase},
        transitions::run_transition_with_broadcast,
    },
};

const GAME_NOT_FOUND: &str = "game not found";

/// Load `game_id` and check the operator secret.
///
/// Unknown games and wrong secrets are indistinguishable to the caller.
pub async fn authenticate(
    state: &SharedState,
    game_id: GameId,
    secret: &str,
) -> Result<GameEntity, ServiceError> {
    match state.durable(state.game_store().find_game(game_id)).await? {
        Some(game) if game.secret == secret => Ok(game),
        _ => Err(ServiceError::NotFound(GAME_NOT_FOUND.into())),
    }
}

/// Snapshot view for late joiners.
pub async fn current_session(state: &SharedState) -> Result<SessionView, ServiceError> {
    let snapshot = state
        .sessions()
        .get()
        .await?
        .ok_or_else(|| ServiceError::NotFound("no game is running".into()))?;
    Ok(view(state, &snapshot))
}

/// Open `game_id` to participants.
pub async fn start(
    state: &SharedState,
    game_id: GameId,
    secret: &str,
) -> Result<SessionView, ServiceError> {
    let game = authenticate(state, game_id, secret).await?;
    let durable_phase = SessionPhase::from(game.status);

    let (_, stored) = state
        .run_transition(
            SessionEvent::Start,
            |current| {
                ensure_no_other_game(current, game_id)?;
                Ok(durable_phase)
            },
            || async {
                let total = state
                    .durable(state.game_store().count_game_questions(game_id))
                    .await?;
                let patch = GamePatch {
                    status: Some(GameStatus::Starting),
                    opened_at: Some(SystemTime::now()),
                    ..GamePatch::default()
                };
                let opened = state
                    .durable(
                        state
                            .game_store()
                            .update_game(game_id, vec![GameStatus::Active], patch),
                    )
                    .await?;
                if !opened {
                    return Err(ServiceError::InvalidState(
                        "the game changed while starting".into(),
                    ));
                }
                Ok(SessionSnapshot::opened(game_id, total, now_ms()))
            },
            |current, plan, opened| {
                ensure_no_other_game(current, game_id)?;
                let mut next = opened.clone();
                next.phase = plan.to;
                Ok(Mutation::Write(next, ()))
            },
        )
        .await?;
    let snapshot = stored.ok_or(ApplyError::SessionMismatch)?;

    state.cancel_countdown().await;
    state.ensure_stats_broadcaster(game_id);
    state
        .hub()
        .publish(OutboundEvent::StartGame(StartGamePayload {
            game_id,
            total_questions: snapshot.total_questions,
        }))
        .await;
    info!(game_id, total_questions = snapshot.total_questions, "game started");
    Ok(view(state, &snapshot))
}

/// End the running game.
pub async fn stop(
    state: &SharedState,
    game_id: GameId,
    secret: &str,
) -> Result<SessionView, ServiceError> {
    authenticate(state, game_id, secret).await?;
    let closed_at = now_ms();

    let mut local = state.countdown().lock().await;
    let (_, snapshot) = run_transition_with_broadcast(
        state,
        game_id,
        SessionEvent::Stop,
        || async {
            let patch = GamePatch {
                status: Some(GameStatus::Finished),
                closed_at: Some(SystemTime::now()),
                ..GamePatch::default()
            };
            let stopped = state
                .durable(state.game_store().update_game(
                    game_id,
                    vec![GameStatus::Starting, GameStatus::Started],
                    patch,
                ))
                .await?;
            if stopped {
                Ok(())
            } else {
                Err(ServiceError::InvalidState(
                    "the game changed while stopping".into(),
                ))
            }
        },
        |snapshot, _| {
            snapshot.closed_at_ms = Some(closed_at);
            close_question(snapshot);
        },
        |_, _| OutboundEvent::Leave(GameRefPayload { game_id }),
    )
    .await?;
    abort_local_countdown(&mut local);
    drop(local);

    info!(game_id, "game stopped");
    Ok(view(state, &snapshot))
}

/// Compute the winners, persist their count and reveal the prize split.
pub async fn reveal_result(
    state: &SharedState,
    game_id: GameId,
    secret: &str,
) -> Result<ResultPayload, ServiceError> {
    let game = authenticate(state, game_id, secret).await?;
    let finished_at = now_ms();

    let mut local = state.countdown().lock().await;
    let (result, _) = run_transition_with_broadcast(
        state,
        game_id,
        SessionEvent::RevealResult,
        || async {
            let winners = state
                .durable(state.game_store().list_winners(game_id))
                .await?;
            let (prize_per_user, shares) = split_prize(game.prize_pool, &winners);
            let total_winners = u32::try_from(shares.len()).unwrap_or(u32::MAX);

            let patch = GamePatch {
                status: Some(GameStatus::Finished),
                finished_at: Some(SystemTime::now()),
                total_winners: Some(i64::from(total_winners)),
                ..GamePatch::default()
            };
            let updated = state
                .durable(state.game_store().update_game(
                    game_id,
                    vec![GameStatus::Started, GameStatus::Finished],
                    patch,
                ))
                .await?;
            if !updated {
                return Err(ServiceError::InvalidState(
                    "the game changed while computing results".into(),
                ));
            }
            Ok(ResultPayload {
                game_id,
                prize_per_user,
                total_winners,
                winners: shares,
            })
        },
        |snapshot, _| {
            snapshot.finished_at_ms = Some(finished_at);
            close_question(snapshot);
        },
        |result, _| OutboundEvent::ResultUp(result.clone()),
    )
    .await?;
    abort_local_countdown(&mut local);
    drop(local);

    info!(
        game_id,
        total_winners = result.total_winners,
        prize_per_user = result.prize_per_user,
        "results revealed"
    );
    Ok(result)
}

/// Hide the results; closes the game if it was not stopped explicitly.
pub async fn hide_result(
    state: &SharedState,
    game_id: GameId,
    secret: &str,
) -> Result<SessionView, ServiceError> {
    let game = authenticate(state, game_id, secret).await?;
    let closed_at = now_ms();

    let mut local = state.countdown().lock().await;
    let (_, snapshot) = run_transition_with_broadcast(
        state,
        game_id,
        SessionEvent::HideResult,
        || async {
            let patch = GamePatch {
                status: Some(GameStatus::Finished),
                closed_at: game.closed_at.is_none().then(SystemTime::now),
                ..GamePatch::default()
            };
            let updated = state
                .durable(state.game_store().update_game(
                    game_id,
                    vec![GameStatus::Started, GameStatus::Finished],
                    patch,
                ))
                .await?;
            if updated {
                Ok(())
            } else {
                Err(ServiceError::InvalidState(
                    "the game changed while hiding results".into(),
                ))
            }
        },
        |snapshot, _| {
            snapshot.closed_at_ms.get_or_insert(closed_at);
            close_question(snapshot);
        },
        |_, _| OutboundEvent::ResultDown(GameRefPayload { game_id }),
    )
    .await?;
    abort_local_countdown(&mut local);
    drop(local);

    Ok(view(state, &snapshot))
}

/// Return a finished game to `Active`, wiping its participants, answers and link statistics.
pub async fn reset(
    state: &SharedState,
    game_id: GameId,
    secret: &str,
) -> Result<SessionView, ServiceError> {
    let game = authenticate(state, game_id, secret).await?;
    let durable_phase = SessionPhase::from(game.status);

    state
        .run_transition(
            SessionEvent::Reset,
            |current| {
                Ok(match current {
                    Some(snapshot) if snapshot.game_id == game_id => snapshot.phase,
                    _ => durable_phase,
                })
            },
            || async {
                let reset = state.durable(state.game_store().reset_game(game_id)).await?;
                if reset {
                    Ok(())
                } else {
                    Err(ServiceError::InvalidState("the game is not over yet".into()))
                }
            },
            |current, _, _| {
                Ok(match current {
                    Some(snapshot) if snapshot.game_id == game_id => Mutation::Delete(()),
                    _ => Mutation::Keep(()),
                })
            },
        )
        .await?;

    state.cancel_countdown().await;
    state.stop_stats_broadcaster();
    state
        .hub()
        .publish(OutboundEvent::Reset(GameRefPayload { game_id }))
        .await;

    let total = state
        .durable(state.game_store().count_game_questions(game_id))
        .await?;
    info!(game_id, "game reset");
    Ok(SessionView::idle(game_id, total))
}

fn ensure_no_other_game(
    current: Option<&SessionSnapshot>,
    game_id: GameId,
) -> Result<(), ServiceError> {
    match current {
        Some(snapshot) if snapshot.game_id != game_id && snapshot.phase != SessionPhase::Finished => {
            Err(ServiceError::InvalidState(
                "another game is in progress".into(),
            ))
        }
        _ => Ok(()),
    }
}

/// Stop this process's countdown task; the caller holds the slot until its event is out.
fn abort_local_countdown(slot: &mut Option<LocalCountdown>) {
    if let Some(running) = slot.take() {
        running.handle.abort();
    }
}

/// Drop the live question, if any, so nothing keeps accepting answers.
fn close_question(snapshot: &mut SessionSnapshot) {
    snapshot.can_advance_question = true;
    snapshot.countdown = None;
}

pub(crate) fn view(state: &SharedState, snapshot: &SessionSnapshot) -> SessionView {
    SessionView::at(snapshot, now_ms(), state.expiry_grace_ms())
}
