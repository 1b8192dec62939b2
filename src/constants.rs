pub const LINEAR_API_URL: &str = "https://api.linear.app/graphql";
pub const OAUTH_AUTHORIZE_URL: &str = "https://linear.app/oauth/authorize";
pub const OAUTH_TOKEN_URL: &str = "https://api.linear.app/oauth/token";
pub const OAUTH_REVOKE_URL: &str = "https://api.linear.app/oauth/revoke";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";
pub const DEFAULT_SCOPES: &str = "read,write";

pub const APP_NAME: &str = "linear-cli";
pub const CONFIG_FILE: &str = "config.json";
pub const ENCRYPTED_STORE_FILE: &str = "credentials.enc.json";
pub const STORE_KEY_FILE: &str = "store.key";

/// Service name under which keyring entries are filed.
pub const KEYRING_SERVICE: &str = "linear-cli";

pub const DEFAULT_PROFILE: &str = "default";

/// Workspace id used for sessions built purely from flags or environment.
pub const EPHEMERAL_WORKSPACE_ID: &str = "env";

pub const DEFAULT_REFRESH_MARGIN_SECS: i64 = 300;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;
pub const CALLBACK_TIMEOUT_SECS: u64 = 300;

// Environment variables
pub const ENV_API_KEY: &str = "LINEAR_API_KEY";
pub const ENV_ACCESS_TOKEN: &str = "LINEAR_ACCESS_TOKEN";
pub const ENV_REFRESH_TOKEN: &str = "LINEAR_REFRESH_TOKEN";
pub const ENV_API_URL: &str = "LINEAR_API_URL";
pub const ENV_WORKSPACE: &str = "LINEAR_WORKSPACE";
pub const ENV_PROFILE: &str = "LINEAR_PROFILE";
pub const ENV_CLIENT_ID: &str = "LINEAR_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "LINEAR_CLIENT_SECRET";
pub const ENV_STORE_PASSPHRASE: &str = "LINEAR_STORE_PASSPHRASE";
pub const ENV_CONFIG_DIR: &str = "LINEAR_CONFIG_DIR";
pub const ENV_LOG: &str = "LINEAR_LOG";

pub const VIEWER_FIELDS: &str = r#"
    id
    name
    email
    organization {
        id
        name
        urlKey
    }
"#;
