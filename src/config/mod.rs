pub mod config;
pub mod env;

pub use config::{
    config_dir, config_path, load_config, save_config, Config, OAuthSettings, StoreBackendKind,
};
pub use env::EnvOverrides;
