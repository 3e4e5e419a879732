pub mod admin;
pub mod auth_code;
pub mod auth_session;
pub mod auth_success;
pub mod token_log;
