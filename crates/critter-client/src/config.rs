use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::recent_search::RECENT_SEARCHES_KEY;

/// Runtime settings for the client core, read from `CRITTER_*` variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub db_path: PathBuf,
    /// Signed-in user; `None` means nobody is signed in yet.
    pub user_id: Option<String>,
    pub search_debounce: Duration,
    pub recent_searches_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("critter.db"),
            user_id: None,
            search_debounce: Duration::from_millis(300),
            recent_searches_key: RECENT_SEARCHES_KEY.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = lookup("CRITTER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let user_id = lookup("CRITTER_USER_ID").filter(|id| !id.trim().is_empty());
        let search_debounce = match lookup("CRITTER_SEARCH_DEBOUNCE_MS") {
            Some(raw) => Duration::from_millis(
                raw.parse()
                    .with_context(|| format!("CRITTER_SEARCH_DEBOUNCE_MS is not a number: {raw}"))?,
            ),
            None => defaults.search_debounce,
        };
        let recent_searches_key =
            lookup("CRITTER_RECENT_SEARCHES_KEY").unwrap_or(defaults.recent_searches_key);

        Ok(Self {
            db_path,
            user_id,
            search_debounce,
            recent_searches_key,
        })
    }
}
