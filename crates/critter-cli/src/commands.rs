use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use critter_client::notifications::{NotificationFeed, fetch_all};
use critter_client::search::{LiveSearch, SearchSession};
use critter_types::{NotificationEntry, UserSnapshot};

use crate::{App, usage};

pub async fn run(app: &App, command: &str, args: &[String]) -> Result<()> {
    match (command, args) {
        ("recent", []) => list_recent(app).await,
        ("recent-remove", [user_id]) => {
            app.recents.remove(user_id).await;
            list_recent(app).await
        }
        ("recent-clear", []) => {
            app.recents.clear_all().await;
            println!("recent searches cleared");
            Ok(())
        }
        ("add-user", [id, name, rest @ ..]) if rest.len() <= 1 => {
            let mut user = UserSnapshot::new(id.as_str()).with_name(name.as_str());
            user.image = rest.first().cloned();
            app.backend.upsert_user(&user).await?;
            println!("saved user {id}");
            Ok(())
        }
        ("search", [query @ ..]) if !query.is_empty() => search(app, &query.join(" ")).await,
        ("select", [user_id]) => select(app, user_id).await,
        ("notify", [receiver, sender, title, rest @ ..]) if rest.len() <= 1 => {
            let sender = (sender != "-").then_some(sender.as_str());
            let data = match rest.first() {
                Some(raw) => serde_json::from_str(raw).context("data must be JSON")?,
                None => serde_json::json!({}),
            };
            let entry = app.backend.notify(receiver, sender, title, &data).await?;
            print_notification(&entry);
            Ok(())
        }
        ("notifications", []) => {
            let user_id = app.user_id()?;
            match fetch_all(app.backend.as_ref(), user_id).await {
                Some(items) if items.is_empty() => println!("no notifications"),
                Some(items) => items.iter().for_each(print_notification),
                None => bail!("could not load notifications"),
            }
            Ok(())
        }
        ("delete-notification", [id]) => {
            let mut feed = NotificationFeed::new(app.backend.clone());
            feed.set_user(Some(app.user_id()?.to_string())).await;
            let deleted = feed.delete(id).await;
            feed.close().await;
            if !deleted {
                bail!("could not delete {id}");
            }
            println!("deleted {id}");
            Ok(())
        }
        ("watch", []) => watch(app).await,
        _ => {
            eprintln!("{}", usage());
            bail!("unknown command or wrong arguments: {command}")
        }
    }
}

async fn list_recent(app: &App) -> Result<()> {
    let entries = app.recents.load().await;
    if entries.is_empty() {
        println!("no recent searches");
    }
    for entry in entries {
        println!(
            "{}\t{}\t{}",
            entry.user.id,
            entry.user.name.as_deref().unwrap_or("-"),
            entry.searched_at
        );
    }
    Ok(())
}

fn session(app: &App) -> Arc<SearchSession> {
    Arc::new(SearchSession::new(
        app.backend.clone(),
        app.recents.clone(),
        app.config.user_id.clone(),
    ))
}

async fn search(app: &App, query: &str) -> Result<()> {
    // Go through the debounced path so the configured delay applies
    let mut live = LiveSearch::new(session(app), app.config.search_debounce);
    let mut results = live.results();
    live.set_query(query);

    let wait = app.config.search_debounce + std::time::Duration::from_secs(5);
    if tokio::time::timeout(wait, results.changed()).await.is_err() {
        bail!("search timed out");
    }

    let users = results.borrow().clone();
    if users.is_empty() {
        println!("no users match '{query}'");
    }
    for user in users {
        println!("{}\t{}", user.id, user.name.as_deref().unwrap_or("-"));
    }
    Ok(())
}

async fn select(app: &App, user_id: &str) -> Result<()> {
    let Some(user) = app.backend.get_user(user_id).await? else {
        bail!("no such user: {user_id}");
    };
    if session(app).select(user).await {
        println!("recorded search for {user_id}");
    } else {
        println!("not recording a search for yourself");
    }
    Ok(())
}

fn print_notification(entry: &NotificationEntry) {
    let sender = entry.sender.as_ref().map(|s| s.name.as_str()).unwrap_or("-");
    let target = match entry.target() {
        Some(target) => format!("{target:?}"),
        None => "-".to_string(),
    };
    println!(
        "{}\t{}\t{}\t{}\t{}",
        entry.id, entry.created_at, sender, entry.title, target
    );
}

async fn watch(app: &App) -> Result<()> {
    let user_id = app.user_id()?.to_string();
    let mut feed = NotificationFeed::new(app.backend.clone());
    feed.set_user(Some(user_id.clone())).await;
    let mut changes = feed.changes();
    print_feed(&feed);

    info!("Watching notifications for {}; type a title to notify yourself, 'quit' to stop", user_id);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                print_feed(&feed);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                match line {
                    "" => {}
                    "quit" => break,
                    "refresh" => {
                        if !feed.refresh().await {
                            eprintln!("refresh failed, keeping current list");
                        }
                    }
                    _ => {
                        if let Some(id) = line.strip_prefix("delete ") {
                            if !feed.delete(id.trim()).await {
                                eprintln!("delete failed");
                            }
                        } else {
                            app.backend
                                .notify(&user_id, None, line, &serde_json::json!({ "userId": user_id }))
                                .await?;
                        }
                    }
                }
            }
        }
    }

    feed.close().await;
    Ok(())
}

fn print_feed(feed: &NotificationFeed) {
    println!("--- {} notification(s) ---", feed.items().len());
    for entry in feed.items() {
        print_notification(&entry);
    }
}
