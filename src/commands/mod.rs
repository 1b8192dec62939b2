pub mod auth;
pub mod whoami;
