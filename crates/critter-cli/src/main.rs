mod commands;

use std::sync::Arc;

use anyhow::bail;
use tracing::debug;

use critter_client::ClientConfig;
use critter_client::backend::LocalBackend;
use critter_client::kv::SqliteStore;
use critter_client::recent_search::RecentSearchCache;
use critter_db::Database;

const USAGE: &str = "\
usage: critter <command> [args]

commands:
  recent                                   list recent searches
  recent-remove <user_id>                  forget one recent search
  recent-clear                             forget all recent searches
  add-user <id> <name> [image]             create or update a user
  search <query>                           search users by name
  select <user_id>                         record a search selection
  notify <receiver> <sender|-> <title> [data-json]
  notifications                            list your notifications
  delete-notification <id>                 delete one notification
  watch                                    live feed; type a title to notify yourself

environment: CRITTER_DB_PATH, CRITTER_USER_ID, CRITTER_SEARCH_DEBOUNCE_MS,
             CRITTER_RECENT_SEARCHES_KEY";

pub struct App {
    pub config: ClientConfig,
    pub backend: Arc<LocalBackend>,
    pub recents: Arc<RecentSearchCache>,
}

impl App {
    pub fn user_id(&self) -> anyhow::Result<&str> {
        match self.config.user_id.as_deref() {
            Some(id) => Ok(id),
            None => bail!("CRITTER_USER_ID is not set"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "critter=debug,critter_client=debug,critter_db=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        println!("{USAGE}");
        return Ok(());
    };

    let config = ClientConfig::from_env()?;
    debug!("Using database {}", config.db_path.display());

    let db = Arc::new(Database::open(&config.db_path)?);
    let backend = Arc::new(LocalBackend::new(db.clone()));
    let recents = Arc::new(
        RecentSearchCache::new(Arc::new(SqliteStore::new(db)))
            .with_key(config.recent_searches_key.clone()),
    );
    let app = App {
        config,
        backend,
        recents,
    };

    commands::run(&app, command, rest).await
}

pub fn usage() -> &'static str {
    USAGE
}
