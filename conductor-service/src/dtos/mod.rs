pub mod auth;
pub mod invitations;
pub mod users;

use serde::Serialize;

/// Success body: `{ "err": false, ...payload }`. Failures use
/// `service_core::error::ErrorEnvelope`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub err: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { err: false, data }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}
