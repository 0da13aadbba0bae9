#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod providers;
pub mod services;

// Re-export commonly used types
pub use config::Config;
pub use core::{
    BusinessContext, ChatMessage, ChatRole, ColumnDefinition, ColumnType, Record, ViewId,
};
pub use error::{ProviderError, WorkspaceError};
pub use providers::{CompletionProvider, GeminiClient};
pub use services::{RecordStore, SeedData, WorkspaceSession, WorkspaceSettings};
