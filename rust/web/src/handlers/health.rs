use crate::coordinator::TurnCoordinator;
use chain_reaction_core::state::TurnState;
use serde::Serialize;
use warp::reply::Json;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    /// Last phase the coordinator saw; does not touch the state resource
    phase: TurnState,
}

pub fn health(coordinator: &TurnCoordinator) -> Json {
    warp::reply::json(&HealthBody {
        status: "ok",
        phase: coordinator.turn_state(),
    })
}
