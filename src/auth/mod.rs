//! Authentication: obtaining, storing, validating and refreshing credentials.
//!
//! - `TokenManager`: lazy refresh of OAuth pairs with one refresh per key in flight
//! - `OAuthClient`: Linear's authorize, token and revoke endpoints
//! - `CallbackListener`: loopback capture of the authorization redirect
//! - `AuthFacade`: resolves the active workspace and hands out `Session`s

pub mod callback;
pub mod oauth;
pub mod session;
pub mod token_manager;

pub use callback::CallbackListener;
pub use oauth::{OAuthClient, OAuthEndpoints, TokenRefresher, TokenResponse};
pub use session::{AuthFacade, CredentialSource, Session, SessionRequest};
pub use token_manager::{TokenManager, TokenState};
