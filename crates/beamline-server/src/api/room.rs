use crate::state::AppState;
use axum::{extract::State, Json};
use beamline_protocol::RoomStatus;

pub async fn get_room_status(State(state): State<AppState>) -> Json<RoomStatus> {
    let connections = state.gateway.connections().connection_count().await;
    Json(state.room.snapshot(connections as u32))
}
