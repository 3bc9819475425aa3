pub mod announcements;
pub mod cli;
pub mod config;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod ui;

pub use announcements::{AnnouncementStore, AuthoringPanel, FeedPresenter};
pub use config::ClientConfig;
