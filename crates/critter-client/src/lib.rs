//! Client-side core of the critter social app: the recent-search cache and
//! the live notification feed, plus the collaborators they talk to.

pub mod backend;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod error;
pub mod kv;
pub mod notifications;
pub mod recent_search;
pub mod search;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use notifications::{NotificationFeed, NotificationSource, Subscription};
pub use recent_search::{MAX_RECENT_SEARCHES, RecentSearchCache};
pub use search::{LiveSearch, SearchSession, UserDirectory};
