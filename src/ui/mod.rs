//! User-facing feedback shared by the presenter, the authoring panel and the CLI

pub mod notices;

pub use notices::{Notice, NoticeCenter, NoticeLevel};
