use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_key: String,
    pub request_timeout_secs: u64,
    /// Path of the local fallback database. `None` resolves to the platform
    /// data directory.
    pub db_path: Option<PathBuf>,
    /// Acting user recorded on audit entries.
    pub user_id: String,
    pub user_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3001".to_string(),
            api_key: String::new(),
            request_timeout_secs: 30,
            db_path: None,
            user_id: "local".to_string(),
            user_name: "Local User".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(app_data: &Path) -> Self {
        let config_path = app_data.join("config.json");
        let mut config = if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
                Err(_) => Self::default(),
            }
        } else {
            let c = Self::default();
            c.save(app_data);
            c
        };

        // Environment overrides win over the file (more secure than
        // persisting the key)
        if let Ok(url) = std::env::var("CRMLINK_API_URL") {
            if !url.is_empty() {
                config.api_base_url = url;
            }
        }
        if let Ok(key) = std::env::var("CRMLINK_API_KEY") {
            if !key.is_empty() {
                config.api_key = key;
            }
        }

        config
    }

    pub fn save(&self, app_data: &Path) {
        let config_path = app_data.join("config.json");
        if let Ok(content) = serde_json::to_string_pretty(self) {
            std::fs::write(config_path, content).ok();
        }
    }

    /// Where the fallback database lives: the configured path, or
    /// `<data dir>/crmlink/crmlink.db`. `None` when the platform has no
    /// data directory.
    pub fn resolve_db_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.db_path {
            return Some(path.clone());
        }
        dirs::data_dir().map(|d| d.join("crmlink").join("crmlink.db"))
    }
}
