use super::AgentConfig;
use crate::error::ConfigError;
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "PATCH_AGENT_CONFIG";

const CONFIG_FILE_NAME: &str = "agent.toml";

impl AgentConfig {
    /// Loads the config from `explicit`, `$PATCH_AGENT_CONFIG`, or the
    /// platform config directory, writing defaults when the file is missing.
    pub fn load_or_init(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        let mut config = if config_path.exists() {
            let contents = fs::read_to_string(config_path).map_err(|error| {
                ConfigError::Load(format!(
                    "failed to read {}: {error}",
                    config_path.display()
                ))
            })?;
            let mut config: AgentConfig = toml::from_str(&contents).map_err(|error| {
                ConfigError::Load(format!(
                    "failed to parse {}: {error}",
                    config_path.display()
                ))
            })?;
            config.config_path = config_path.to_path_buf();
            config
        } else {
            let config = Self {
                config_path: config_path.to_path_buf(),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|error| {
                ConfigError::Load(format!("failed to create {}: {error}", parent.display()))
            })?;
        }
        let toml_str = toml::to_string_pretty(self)
            .map_err(|error| ConfigError::Load(format!("failed to serialize config: {error}")))?;
        crate::utils::write_text_atomic(&self.config_path, &toml_str).map_err(|error| {
            ConfigError::Load(format!(
                "failed to write {}: {error}",
                self.config_path.display()
            ))
        })
    }
}

fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
        && !path.is_empty()
    {
        return Ok(PathBuf::from(shellexpand::tilde(&path).as_ref()));
    }
    ProjectDirs::from("", "", "patch-agent")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .ok_or_else(|| ConfigError::Load("could not determine a config directory".into()))
}
