pub mod credential;
pub mod graphql;
pub mod user;
pub mod workspace;

// Re-export commonly used types
pub use credential::{mask_secret, Credential, CredentialKey, OAuthTokenPair};
pub use graphql::{GraphQLError, GraphQLResponse, ViewerData};
pub use user::{Organization, Viewer};
pub use workspace::WorkspaceContext;
