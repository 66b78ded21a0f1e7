use crate::{
    dao::models::GameId,
    dto::ws::OutboundEvent,
    error::ServiceError,
    state::{SessionSnapshot, SharedState, state_machine::SessionEvent},
};

/// Execute a planned transition on the live session, then broadcast the event `announce` builds.
pub async fn run_transition_with_broadcast<W, Fut, T, A, N>(
    state: &SharedState,
    game_id: GameId,
    event: SessionEvent,
    work: W,
    amend: A,
    announce: N,
) -> Result<(T, SessionSnapshot), ServiceError>
where
    W: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, ServiceError>>,
    A: Fn(&mut SessionSnapshot, &T),
    N: FnOnce(&T, &SessionSnapshot) -> OutboundEvent,
{
    let (value, next) = state
        .run_session_transition(game_id, event, work, amend)
        .await?;
    state.hub().publish(announce(&value, &next)).await;
    Ok((value, next))
}
