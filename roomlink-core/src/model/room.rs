use serde::{Deserialize, Serialize};

/// Room membership confirmed by the relay (`room-assigned` / `room-joined`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomIdentity {
    pub room_code: String,
    pub local_name: String,
}

impl RoomIdentity {
    pub fn new(room_code: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            room_code: room_code.into(),
            local_name: local_name.into(),
        }
    }
}
