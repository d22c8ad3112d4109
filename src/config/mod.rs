pub mod schema;
pub mod settings;

pub use schema::{
    AgentConfig, CoreConfig, LoggingConfig, MAX_TERMINATE_ATTEMPTS, PathsConfig, RuntimeConfig,
    StatusConfig,
};
pub use settings::{ConfigSettings, Operation, resolve_sequence_number};
