//! Participant registration, answer recording and confirmation, answer statistics.

use std::time::SystemTime;

use tracing::{debug, info};

use crate::{
    dao::{
        models::{
            AnswerKey, AnswerRecordEntity, AnswerTally, AnswerWrite, GameId, ParticipantEntity,
            ParticipantRole, ParticipantStatus, QuestionEntity, QuestionId, QuestionStatsEntity, UserId,
        },
        storage::StorageError,
    },
    dto::{
        session::AnswerCheckResponse,
        ws::{AnswerStatsPayload, JoinedPayload, OptionStats, OutboundEvent, QuestionRefPayload},
    },
    error::ServiceError,
    services::session_service::authenticate,
    state::{
        Mutation, SharedState,
        session::SessionStateError,
        snapshot::{SessionSnapshot, now_ms},
        state_machine::{SessionEvent, SessionPhase},
        transitions::run_transition_with_broadcast,
    },
};

/// Largest option number a question can carry.
const MAX_OPTIONS: i64 = 4;

/// Register `user_id` in the live game.
///
/// Users joining before the first question play; later arrivals only watch.
pub async fn join(state: &SharedState, user_id: UserId) -> Result<JoinedPayload, ServiceError> {
    let snapshot = state.live_session().await?;
    let game_id = snapshot.game_id;
    let role = match snapshot.phase {
        SessionPhase::Starting => ParticipantRole::Player,
        SessionPhase::Started => ParticipantRole::Observer,
        SessionPhase::Finished => {
            return Err(ServiceError::InvalidState("the game is over".into()));
        }
        SessionPhase::Draft | SessionPhase::Active => {
            return Err(ServiceError::InvalidState(
                "the game has not started yet".into(),
            ));
        }
    };

    let (participant, created) = state
        .durable(
            state
                .game_store()
                .upsert_participant(game_id, user_id, role, SystemTime::now()),
        )
        .await?;

    if created {
        state
            .sessions()
            .update(|current| {
                Ok::<_, SessionStateError>(match current {
                    Some(current) if current.game_id == game_id => {
                        let mut next = current.clone();
                        next.attendee_count += 1;
                        Mutation::Write(next, ())
                    }
                    _ => Mutation::Keep(()),
                })
            })
            .await?;
        info!(game_id, user_id, role = participant.role.as_str(), "participant joined");
    }
    state.ensure_stats_broadcaster(game_id);

    Ok(JoinedPayload {
        game_id,
        user_id,
        role: participant.role.as_str().into(),
        phase: snapshot.phase,
        question_index: snapshot.current_question_index,
        total_questions: snapshot.total_questions,
    })
}

/// Record that `user_id` displayed the current question.
pub async fn acknowledge_question(
    state: &SharedState,
    user_id: UserId,
) -> Result<AnswerRecordEntity, ServiceError> {
    let snapshot = state.live_session().await?;
    let question_id = current_question(&snapshot)?;
    require_participant(state, snapshot.game_id, user_id).await?;

    let key = AnswerKey {
        game_id: snapshot.game_id,
        user_id,
        question_id,
    };
    state
        .durable(state.game_store().acknowledge_question(key, SystemTime::now()))
        .await
}

/// Store `user_answer` for the live question, replacing any unconfirmed earlier answer.
pub async fn record_answer(
    state: &SharedState,
    user_id: UserId,
    user_answer: i64,
) -> Result<AnswerRecordEntity, ServiceError> {
    if !(1..=MAX_OPTIONS).contains(&user_answer) {
        return Err(ServiceError::InvalidInput(format!(
            "userAnswer must be between 1 and {MAX_OPTIONS}"
        )));
    }

    let snapshot = state.live_session().await?;
    let question_id = current_question(&snapshot)?;
    if !snapshot.is_question_live(now_ms(), state.expiry_grace_ms()) {
        return Err(ServiceError::InvalidState("the question is closed".into()));
    }

    let question = load_question(state, question_id).await?;
    let answer = u8::try_from(user_answer)
        .ok()
        .filter(|answer| question.accepts(*answer))
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "userAnswer must be between 1 and {}",
                question.option_count()
            ))
        })?;

    let participant = require_participant(state, snapshot.game_id, user_id).await?;
    if participant.status != ParticipantStatus::Active {
        return Err(ServiceError::InvalidState(
            "the participant is not active".into(),
        ));
    }

    let key = AnswerKey {
        game_id: snapshot.game_id,
        user_id,
        question_id,
    };
    let write = state
        .durable(state.game_store().upsert_answer(
            key,
            answer,
            question.is_correct(answer),
            SystemTime::now(),
        ))
        .await?;
    match write {
        AnswerWrite::Recorded(record) => {
            debug!(
                game_id = key.game_id,
                user_id,
                question_id,
                answer,
                "answer recorded"
            );
            Ok(record)
        }
        AnswerWrite::Frozen(_) => Err(ServiceError::InvalidState(
            "the answer is already confirmed".into(),
        )),
    }
}

/// Freeze the answer of `user_id` to the current question of `game_id`.
///
/// Winners are decided here and only here: a correct confirmed answer to the
/// last question crowns a Player. Repeated calls return the frozen result.
pub async fn confirm_answer(
    state: &SharedState,
    game_id: GameId,
    user_id: UserId,
) -> Result<AnswerCheckResponse, ServiceError> {
    let snapshot = state.require_session(game_id).await?;
    let question_id = current_question(&snapshot)?;
    let participant = state
        .durable(state.game_store().find_participant(game_id, user_id))
        .await?;
    let crown_if_correct = snapshot.is_last_question()
        && participant
            .as_ref()
            .is_some_and(|p| p.role == ParticipantRole::Player);

    let key = AnswerKey {
        game_id,
        user_id,
        question_id,
    };
    let confirmed = state
        .durable(
            state
                .game_store()
                .confirm_answer(key, SystemTime::now(), crown_if_correct),
        )
        .await?;

    let mut response = AnswerCheckResponse {
        game_id,
        question_id,
        question_index: snapshot.current_question_index,
        is_qualified: false,
        user_answer: 0,
        is_winner: participant.is_some_and(|p| p.is_winner),
    };
    if let Some(confirmed) = confirmed {
        response.is_qualified = confirmed.record.is_correct == Some(true);
        response.user_answer = confirmed.record.answer.unwrap_or(0);
        response.is_winner = confirmed.is_winner;
        if confirmed.newly_confirmed {
            debug!(
                game_id,
                user_id,
                question_id,
                is_winner = confirmed.is_winner,
                "answer confirmed"
            );
        }
    }
    Ok(response)
}

/// Compute, persist and broadcast the statistics of the current question.
pub async fn reveal_answer(
    state: &SharedState,
    game_id: GameId,
    secret: &str,
) -> Result<AnswerStatsPayload, ServiceError> {
    authenticate(state, game_id, secret).await?;

    let (payload, _) = run_transition_with_broadcast(
        state,
        game_id,
        SessionEvent::RevealAnswer,
        || async {
            let snapshot = state.require_session(game_id).await?;
            let question_id = current_question(&snapshot)?;
            if snapshot.is_question_live(now_ms(), state.expiry_grace_ms()) {
                return Err(ServiceError::InvalidState("the question is still live".into()));
            }
            let question = load_question(state, question_id).await?;
            let tally = state
                .durable(
                    state
                        .game_store()
                        .tally_confirmed_answers(game_id, question_id),
                )
                .await?;
            let (payload, stats) =
                answer_stats(game_id, snapshot.current_question_index, &question, &tally);
            state
                .durable(
                    state
                        .game_store()
                        .save_question_stats(game_id, question_id, stats),
                )
                .await?;
            Ok(payload)
        },
        |_, _| {},
        |payload, _| OutboundEvent::AnswerUp(payload.clone()),
    )
    .await?;

    info!(
        game_id,
        question_id = payload.question_id,
        total_count = payload.total_count,
        "answer statistics revealed"
    );
    Ok(payload)
}

/// Hide the statistics of the current question.
pub async fn hide_answer(
    state: &SharedState,
    game_id: GameId,
    secret: &str,
) -> Result<QuestionRefPayload, ServiceError> {
    authenticate(state, game_id, secret).await?;

    let (payload, _) = run_transition_with_broadcast(
        state,
        game_id,
        SessionEvent::HideAnswer,
        || async {
            let snapshot = state.require_session(game_id).await?;
            Ok(QuestionRefPayload {
                game_id,
                question_id: current_question(&snapshot)?,
            })
        },
        |_, _| {},
        |payload, _| OutboundEvent::AnswerDown(payload.clone()),
    )
    .await?;
    Ok(payload)
}

/// Confirmed-answer statistics of `question`.
///
/// Percentages are whole numbers rounded down and are 0 when nobody answered.
/// The per-option counts always add up to the total.
pub fn answer_stats(
    game_id: GameId,
    question_index: u32,
    question: &QuestionEntity,
    tally: &AnswerTally,
) -> (AnswerStatsPayload, QuestionStatsEntity) {
    let counts: Vec<u32> = (1..=question.option_count())
        .map(|option| tally.count(option))
        .collect();
    let total_count: u32 = counts.iter().sum();
    let correct_count = counts
        .get(usize::from(question.correct_answer).wrapping_sub(1))
        .copied()
        .unwrap_or(0);
    let wrong_count = total_count - correct_count;

    let options = question
        .options
        .iter()
        .zip(&counts)
        .enumerate()
        .map(|(index, (text, &count))| OptionStats {
            option: u8::try_from(index + 1).unwrap_or(u8::MAX),
            text: text.clone(),
            count,
            percentage: percentage(count, total_count),
        })
        .collect();

    let payload = AnswerStatsPayload {
        game_id,
        question_id: question.id,
        question_index,
        question_text: question.text.clone(),
        options,
        correct_answer: question.correct_answer,
        total_count,
        correct_count,
        wrong_count,
    };
    let stats = QuestionStatsEntity {
        option_counts: counts,
        correct_count,
        wrong_count,
        total_count,
    };
    (payload, stats)
}

fn percentage(count: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (u64::from(count) * 100 / u64::from(total)) as u32
}

fn current_question(snapshot: &SessionSnapshot) -> Result<QuestionId, ServiceError> {
    snapshot
        .current_question_id
        .ok_or_else(|| ServiceError::InvalidState("no question has been pushed yet".into()))
}

async fn load_question(
    state: &SharedState,
    question_id: QuestionId,
) -> Result<QuestionEntity, ServiceError> {
    state
        .durable(state.game_store().find_question(question_id))
        .await?
        .ok_or_else(|| StorageError::corrupted(format!("question {question_id} vanished")).into())
}

async fn require_participant(
    state: &SharedState,
    game_id: GameId,
    user_id: UserId,
) -> Result<ParticipantEntity, ServiceError> {
    state
        .durable(state.game_store().find_participant(game_id, user_id))
        .await?
        .ok_or_else(|| ServiceError::InvalidState("join the game first".into()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::dao::models::QuestionStatus;

    fn question() -> QuestionEntity {
        QuestionEntity {
            id: 12,
            text: "Largest planet?".into(),
            options: vec!["Mars".into(), "Jupiter".into(), "Venus".into()],
            correct_answer: 2,
            level: Some(1),
            status: QuestionStatus::New,
        }
    }

    #[test]
    fn percentages_round_down() {
        let tally = AnswerTally(BTreeMap::from([(1, 1), (2, 1), (3, 1)]));
        let (payload, stats) = answer_stats(3, 1, &question(), &tally);

        let percentages: Vec<u32> = payload.options.iter().map(|o| o.percentage).collect();
        assert_eq!(percentages, vec![33, 33, 33]);
        assert_eq!(payload.correct_count, 1);
        assert_eq!(payload.wrong_count, 2);
        assert_eq!(stats.option_counts, vec![1, 1, 1]);
    }

    #[test]
    fn empty_tally_has_zero_percentages() {
        let (payload, _) = answer_stats(3, 1, &question(), &AnswerTally::default());
        assert_eq!(payload.total_count, 0);
        assert!(payload.options.iter().all(|o| o.percentage == 0 && o.count == 0));
    }

    #[test]
    fn option_counts_sum_to_total() {
        let tally = AnswerTally(BTreeMap::from([(1, 4), (2, 9), (3, 2)]));
        let (payload, stats) = answer_stats(3, 2, &question(), &tally);
        let sum: u32 = payload.options.iter().map(|o| o.count).sum();
        assert_eq!(sum, payload.total_count);
        assert_eq!(stats.total_count, 15);
        assert_eq!(payload.correct_count + payload.wrong_count, 15);
        assert_eq!(payload.options[1].percentage, 60);
    }
}
