//! Chat client for an HR knowledge assistant: persisted chat sessions, a
//! conversation controller that talks to the backend, and a terminal UI.

pub mod api;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod logging;
pub mod session;
pub mod storage;
pub mod ui;

pub use api::{HrApiClient, QueryBackend};
pub use config::Config;
pub use conversation::{ConversationController, ConversationState, PendingQuery};
pub use error::{FailureKind, StorageError};
pub use events::{ActiveSession, Message, MessageRole, Session, SourceCitation, UserRole};
pub use session::{SessionStore, SharedSessions};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
