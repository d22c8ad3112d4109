use super::AgentConfig;

pub(super) const STATUS_FOLDER_ENV: &str = "PATCH_AGENT_STATUS_FOLDER";
pub(super) const CONFIG_FOLDER_ENV: &str = "PATCH_AGENT_CONFIG_FOLDER";
pub(super) const LOG_FOLDER_ENV: &str = "PATCH_AGENT_LOG_FOLDER";
pub(super) const STATE_FOLDER_ENV: &str = "PATCH_AGENT_STATE_FOLDER";

impl AgentConfig {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(folder) = std::env::var(STATUS_FOLDER_ENV)
            && !folder.is_empty()
        {
            self.paths.status_folder = folder;
        }

        if let Ok(folder) = std::env::var(CONFIG_FOLDER_ENV)
            && !folder.is_empty()
        {
            self.paths.config_folder = folder;
        }

        if let Ok(folder) = std::env::var(LOG_FOLDER_ENV)
            && !folder.is_empty()
        {
            self.paths.log_folder = folder;
        }

        if let Ok(folder) = std::env::var(STATE_FOLDER_ENV)
            && !folder.is_empty()
        {
            self.paths.state_folder = folder;
        }
    }
}
