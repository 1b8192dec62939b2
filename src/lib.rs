// Module declarations
pub mod auth;
pub mod cli_context;
pub mod client;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod formatting;
pub mod logging;
pub mod models;
pub mod store;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use auth::{AuthFacade, CredentialSource, Session, SessionRequest, TokenManager, TokenState};
pub use cli_context::{CliContext, CliContextBuilder};
pub use client::LinearClient;
pub use config::{load_config, save_config, Config, EnvOverrides};
pub use error::{AuthError, AuthResult};
pub use models::*;
pub use store::{CredentialStore, EncryptedFileStore, MemoryStore, NativeStore};
