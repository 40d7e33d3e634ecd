//! HTTP handlers for conductor-service.

pub mod auth;
pub mod invitation;
pub mod metrics;
pub mod oauth;
pub mod user;

pub use invitation::*;
pub use oauth::*;
pub use user::*;
