use thiserror::Error;

use crate::models::CredentialKey;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("No credential stored for workspace {0}")]
    NotFound(CredentialKey),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Network error: {0}")]
    TransientNetworkError(String),

    #[error("No active workspace. Pass --workspace, set LINEAR_WORKSPACE, or run 'linear auth login'.")]
    NoActiveWorkspace,

    #[error("Unknown workspace '{0}'")]
    UnknownWorkspace(String),

    #[error("Authentication expired for workspace {workspace}")]
    AuthenticationRequired { workspace: String },

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API request failed: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AuthError::Api(format!("Malformed response: {}", e))
        } else {
            AuthError::TransientNetworkError(e.to_string())
        }
    }
}

impl AuthError {
    /// Process exit code: 2 re-authenticate, 69 store unavailable,
    /// 75 retry, 78 configuration, 1 anything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            AuthError::NotFound(_)
            | AuthError::InvalidCredential(_)
            | AuthError::AuthenticationRequired { .. } => 2,
            AuthError::StoreUnavailable(_) => 69,
            AuthError::TransientNetworkError(_) => 75,
            AuthError::NoActiveWorkspace
            | AuthError::UnknownWorkspace(_)
            | AuthError::Config(_)
            | AuthError::OAuth(_) => 78,
            _ => 1,
        }
    }

    /// One-line suggestion printed under the error message.
    pub fn hint(&self) -> &'static str {
        match self {
            AuthError::NotFound(_) | AuthError::InvalidCredential(_) => {
                "Run 'linear auth login' to authenticate."
            }
            AuthError::AuthenticationRequired { .. } => {
                "Authentication expired - run 'linear auth login' to re-authenticate."
            }
            AuthError::StoreUnavailable(_) => {
                "Enable a system keyring, or set credential_store to \"encrypted-file\" in the config."
            }
            AuthError::TransientNetworkError(_) => "Check your connection and retry the command.",
            AuthError::NoActiveWorkspace => "Run 'linear auth login' or pass --workspace.",
            AuthError::UnknownWorkspace(_) => {
                "Run 'linear auth list-workspaces' to see known workspaces."
            }
            AuthError::Config(_) | AuthError::OAuth(_) => "Check the configuration file and OAuth client settings.",
            _ => "Re-run with --debug for details.",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::TransientNetworkError(_))
    }

    /// An equivalent error with the same class and message, for handing one
    /// failure to several callers.
    pub fn duplicate(&self) -> AuthError {
        match self {
            AuthError::StoreUnavailable(m) => AuthError::StoreUnavailable(m.clone()),
            AuthError::NotFound(key) => AuthError::NotFound(key.clone()),
            AuthError::InvalidCredential(m) => AuthError::InvalidCredential(m.clone()),
            AuthError::TransientNetworkError(m) => AuthError::TransientNetworkError(m.clone()),
            AuthError::NoActiveWorkspace => AuthError::NoActiveWorkspace,
            AuthError::UnknownWorkspace(m) => AuthError::UnknownWorkspace(m.clone()),
            AuthError::AuthenticationRequired { workspace } => AuthError::AuthenticationRequired {
                workspace: workspace.clone(),
            },
            AuthError::OAuth(m) => AuthError::OAuth(m.clone()),
            AuthError::Config(m) => AuthError::Config(m.clone()),
            AuthError::Api(m) => AuthError::Api(m.clone()),
            AuthError::Io(e) => AuthError::Io(std::io::Error::new(e.kind(), e.to_string())),
            AuthError::Json(e) => AuthError::Internal(format!("JSON error: {}", e)),
            AuthError::Internal(m) => AuthError::Internal(m.clone()),
        }
    }
}

pub trait ErrorContext<T> {
    fn context(self, msg: &str) -> AuthResult<T>;
    fn with_context<F>(self, f: F) -> AuthResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + 'static,
{
    fn context(self, msg: &str) -> AuthResult<T> {
        self.map_err(|e| AuthError::Internal(format!("{}: {}", msg, e)))
    }

    fn with_context<F>(self, f: F) -> AuthResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AuthError::Internal(format!("{}: {}", f(), e)))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, msg: &str) -> AuthResult<T> {
        self.ok_or_else(|| AuthError::Internal(msg.to_string()))
    }

    fn with_context<F>(self, f: F) -> AuthResult<T>
    where
        F: FnOnce() -> String,
    {
        self.ok_or_else(|| AuthError::Internal(f()))
    }
}

#[macro_export]
macro_rules! auth_error {
    ($error_type:ident, $msg:expr) => {
        $crate::error::AuthError::$error_type($msg.to_string())
    };
    ($error_type:ident, $fmt:expr, $($arg:tt)*) => {
        $crate::error::AuthError::$error_type(format!($fmt, $($arg)*))
    };
}
