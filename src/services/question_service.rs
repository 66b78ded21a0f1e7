//! Question lifecycle: pushing the next question, retracting it and owning its countdown.
//!
//! The snapshot is the single source of truth for "is a question live". A push
//! claims the slot with a compare-and-swap before any durable write, so two
//! operators racing on different processes serve at most one question. The
//! countdown deadline and the id of the process running the timer are stored
//! next to the claim; only that process fires ticks and the expiry. The claim also
//! moves the phase to `Started`, so every process racing on the same push commits
//! against the phase the winner left.

use std::{sync::Arc, time::SystemTime};

use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::{GameId, QuestionEntity, QuestionId},
        storage::StorageError,
    },
    dto::ws::{OutboundEvent, QuestionRefPayload, QuestionUpPayload, TimerPayload},
    error::ServiceError,
    services::session_service::authenticate,
    state::{
        ApplyError, LocalCountdown, Mutation, SharedState,
        session::SessionStateError,
        snapshot::{Countdown, SessionSnapshot, now_ms},
        state_machine::{SessionEvent, SessionPhase},
    },
};

enum PushOutcome {
    /// A question is still live; nothing changed.
    AlreadyLive(QuestionUpPayload),
    /// A new question went live.
    Served(QuestionUpPayload),
}

/// Serve the next question of `game_id`, or return the live one unchanged.
pub async fn push_question(
    state: &SharedState,
    game_id: GameId,
    secret: &str,
) -> Result<QuestionUpPayload, ServiceError> {
    authenticate(state, game_id, secret).await?;

    let (outcome, _) = state
        .run_session_transition(
            game_id,
            SessionEvent::PushQuestion,
            || claim_next_question(state, game_id),
            |_, _| {},
        )
        .await?;

    match outcome {
        PushOutcome::AlreadyLive(payload) => {
            debug!(
                game_id,
                question_id = payload.question_id,
                "question still live; push ignored"
            );
            Ok(payload)
        }
        PushOutcome::Served(payload) => {
            state
                .hub()
                .publish(OutboundEvent::QuestionUp(payload.clone()))
                .await;
            start_countdown(state, game_id, payload.question_id).await;
            info!(
                game_id,
                question_id = payload.question_id,
                question_index = payload.question_index,
                "question pushed"
            );
            Ok(payload)
        }
    }
}

/// Withdraw the live question before its countdown ends.
pub async fn retract_question(
    state: &SharedState,
    game_id: GameId,
    secret: &str,
) -> Result<QuestionRefPayload, ServiceError> {
    authenticate(state, game_id, secret).await?;

    // Held until `question_down` is out so the local timer cannot slip a tick in between.
    let mut local = state.countdown().lock().await;
    let snapshot = state.require_session(game_id).await?;
    if snapshot.phase == SessionPhase::Started
        && !snapshot.is_question_live(now_ms(), state.expiry_grace_ms())
    {
        return Err(ServiceError::InvalidState("no question is live".into()));
    }
    let question_id = snapshot.current_question_id;

    let (question_id, _) = state
        .run_session_transition(
            game_id,
            SessionEvent::RetractQuestion,
            || async {
                question_id.ok_or_else(|| {
                    ServiceError::InvalidState("no question has been pushed yet".into())
                })
            },
            |snapshot, _| {
                snapshot.can_advance_question = true;
                snapshot.countdown = None;
            },
        )
        .await?;

    if let Some(running) = local.take() {
        running.handle.abort();
    }
    let payload = QuestionRefPayload {
        game_id,
        question_id,
    };
    state
        .hub()
        .publish(OutboundEvent::QuestionDown(payload.clone()))
        .await;
    drop(local);

    info!(game_id, question_id, "question retracted");
    Ok(payload)
}

async fn claim_next_question(
    state: &SharedState,
    game_id: GameId,
) -> Result<PushOutcome, ServiceError> {
    let grace = state.expiry_grace_ms();
    let snapshot = state.require_session(game_id).await?;
    if snapshot.is_question_live(now_ms(), grace) {
        return live_question(state, &snapshot).await.map(PushOutcome::AlreadyLive);
    }

    let Some((_, question)) = state
        .durable(state.game_store().next_unpublished_question(game_id))
        .await?
    else {
        return Err(ServiceError::InvalidState(
            "there are no other questions to submit".into(),
        ));
    };

    let config = state.config();
    let owner = state.process_id();
    let length_ms = i64::try_from(config.countdown_length().as_millis()).unwrap_or(i64::MAX);
    let (claimed, stored) = state
        .sessions()
        .update(|current| {
            let Some(current) = current.filter(|snapshot| snapshot.game_id == game_id) else {
                return Err(ServiceError::from(ApplyError::SessionMismatch));
            };
            let now = now_ms();
            if current.is_question_live(now, grace) {
                return Ok(Mutation::Keep(None));
            }
            let mut next = current.clone();
            next.phase = SessionPhase::Started;
            next.started_at_ms.get_or_insert(now);
            next.current_question_index += 1;
            next.current_question_id = Some(question.id);
            next.can_advance_question = false;
            next.countdown = Some(Countdown {
                question_id: question.id,
                deadline_ms: now.saturating_add(length_ms),
                ticks: config.countdown_ticks,
                owner,
            });
            Ok(Mutation::Write(next, Some(current.clone())))
        })
        .await?;
    let stored = stored.ok_or(ApplyError::SessionMismatch)?;

    let Some(previous) = claimed else {
        return live_question(state, &stored).await.map(PushOutcome::AlreadyLive);
    };

    let activated = state
        .durable(
            state
                .game_store()
                .activate_question(game_id, question.id, SystemTime::now()),
        )
        .await;
    match activated {
        Ok(true) => {}
        Ok(false) => {
            revert_claim(state, &previous, question.id).await;
            return Err(ServiceError::InvalidState(
                "the question was already served".into(),
            ));
        }
        Err(err) => {
            revert_claim(state, &previous, question.id).await;
            return Err(err);
        }
    }

    Ok(PushOutcome::Served(question_up(
        game_id,
        stored.current_question_index,
        &question,
        config.countdown_ticks,
    )))
}

/// Undo a claim whose durable write failed, unless someone moved on since.
async fn revert_claim(state: &SharedState, previous: &SessionSnapshot, question_id: QuestionId) {
    let owner = state.process_id();
    let reverted = state
        .sessions()
        .update(|current| {
            let ours = current.is_some_and(|snapshot| {
                snapshot.game_id == previous.game_id
                    && snapshot.countdown.as_ref().is_some_and(|countdown| {
                        countdown.owner == owner && countdown.question_id == question_id
                    })
            });
            let Some(current) = current.filter(|_| ours) else {
                return Ok::<_, SessionStateError>(Mutation::Keep(false));
            };
            let mut next = current.clone();
            next.phase = previous.phase;
            next.started_at_ms = previous.started_at_ms;
            next.current_question_index = previous.current_question_index;
            next.current_question_id = previous.current_question_id;
            next.can_advance_question = previous.can_advance_question;
            next.countdown = previous.countdown.clone();
            Ok(Mutation::Write(next, true))
        })
        .await;
    match reverted {
        Ok((true, _)) => warn!(
            game_id = previous.game_id,
            question_id, "question claim reverted after durable failure"
        ),
        Ok((false, _)) => {}
        Err(err) => warn!(
            game_id = previous.game_id,
            question_id,
            error = %err,
            "failed to revert question claim"
        ),
    }
}

async fn live_question(
    state: &SharedState,
    snapshot: &SessionSnapshot,
) -> Result<QuestionUpPayload, ServiceError> {
    let question_id = snapshot
        .current_question_id
        .ok_or_else(|| StorageError::corrupted("live question without an id"))?;
    let question = state
        .durable(state.game_store().find_question(question_id))
        .await?
        .ok_or_else(|| StorageError::corrupted(format!("question {question_id} vanished")))?;
    let ticks = snapshot
        .countdown
        .as_ref()
        .map_or(state.config().countdown_ticks, |countdown| countdown.ticks);
    Ok(question_up(
        snapshot.game_id,
        snapshot.current_question_index,
        &question,
        ticks,
    ))
}

fn question_up(
    game_id: GameId,
    question_index: u32,
    question: &QuestionEntity,
    ticks: u32,
) -> QuestionUpPayload {
    QuestionUpPayload {
        game_id,
        question_index,
        question_id: question.id,
        question_text: question.text.clone(),
        options: question.options.clone(),
        time_limit: ticks,
    }
}

async fn start_countdown(state: &SharedState, game_id: GameId, question_id: QuestionId) {
    let mut slot = state.countdown().lock().await;
    if let Some(previous) = slot.take() {
        previous.handle.abort();
    }
    let task_state = Arc::clone(state);
    let handle = tokio::spawn(async move {
        run_countdown(task_state, game_id, question_id).await;
    });
    *slot = Some(LocalCountdown {
        question_id,
        handle,
    });
}

/// Broadcast one tick per interval, counting down to 0, then expire the question.
async fn run_countdown(state: SharedState, game_id: GameId, question_id: QuestionId) {
    let period = state.config().tick_interval;
    let ticks = state.config().countdown_ticks;
    let mut ticker = interval_at(Instant::now() + period, period);

    for counter in (0..ticks).rev() {
        ticker.tick().await;
        if !owns_countdown(&state, game_id, question_id).await {
            debug!(game_id, question_id, "countdown taken over or cleared; stopping");
            return;
        }
        let slot = state.countdown().lock().await;
        if slot.as_ref().map(|running| running.question_id) != Some(question_id) {
            return;
        }
        state
            .hub()
            .publish(OutboundEvent::Timer(TimerPayload { counter }))
            .await;
        drop(slot);
    }

    expire_question(&state, game_id, question_id).await;
}

async fn owns_countdown(state: &SharedState, game_id: GameId, question_id: QuestionId) -> bool {
    match state.sessions().get().await {
        Ok(Some(snapshot)) => {
            snapshot.game_id == game_id
                && snapshot.countdown.is_some_and(|countdown| {
                    countdown.owner == state.process_id() && countdown.question_id == question_id
                })
        }
        Ok(None) => false,
        Err(err) => {
            warn!(game_id, question_id, error = %err, "failed to read snapshot during countdown");
            true
        }
    }
}

async fn expire_question(state: &SharedState, game_id: GameId, question_id: QuestionId) {
    let mut slot = state.countdown().lock().await;
    let owner = state.process_id();
    let expired = state
        .sessions()
        .update(|current| {
            let Some(current) = current.filter(|snapshot| {
                snapshot.game_id == game_id
                    && snapshot.countdown.as_ref().is_some_and(|countdown| {
                        countdown.owner == owner && countdown.question_id == question_id
                    })
            }) else {
                return Ok::<_, SessionStateError>(Mutation::Keep(false));
            };
            let mut next = current.clone();
            next.can_advance_question = true;
            next.countdown = None;
            Ok(Mutation::Write(next, true))
        })
        .await;

    if slot.as_ref().map(|running| running.question_id) == Some(question_id) {
        slot.take();
    }
    drop(slot);

    match expired {
        Ok((true, _)) => info!(game_id, question_id, "question expired"),
        Ok((false, _)) => debug!(game_id, question_id, "question already closed before expiry"),
        Err(err) => warn!(game_id, question_id, error = %err, "failed to expire question"),
    }
}
