pub mod password;
pub mod tokens;
pub mod validation;

pub use password::{equalize_verification_time, hash_password, verify_password, Password, PasswordHashString};
pub use tokens::{random_alphanumeric, random_hex};
pub use validation::ValidatedJson;
