pub mod events;
pub mod models;

pub use events::ChangeEvent;
pub use models::{
    NotificationEntry, NotificationTarget, RecentSearchEntry, Sender, UserSnapshot,
};
