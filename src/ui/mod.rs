pub mod app;
pub mod clipboard;
pub mod conversation;
pub mod sidebar;

pub use app::App;
