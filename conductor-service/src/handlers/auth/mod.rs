pub mod session;
pub mod sso;

pub use session::{login, logout, register};
pub use sso::{sso_callback, sso_login};
