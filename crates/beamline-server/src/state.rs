use crate::config::Config;
use crate::sfu::RoomStats;
use crate::signaling::SignalingGateway;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub gateway: SignalingGateway,
    pub room: Arc<RoomStats>,
}

impl AppState {
    pub fn new(config: Config, gateway: SignalingGateway, room: Arc<RoomStats>) -> Self {
        Self {
            config,
            gateway,
            room,
        }
    }
}
