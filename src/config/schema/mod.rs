mod env_overrides;
mod loader;
#[cfg(test)]
mod test_env;
mod types;

pub use loader::CONFIG_PATH_ENV;
pub use types::{
    AgentConfig, CoreConfig, LoggingConfig, MAX_TERMINATE_ATTEMPTS, PathsConfig, RuntimeConfig,
    StatusConfig,
};
