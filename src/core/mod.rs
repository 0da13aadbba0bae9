pub mod business_context;
pub mod chat;
pub mod record;
pub mod schema;
pub mod types;

pub use business_context::{AgentRole, BusinessContext};
pub use chat::{ChatMessage, ChatRole, Transcript};
pub use record::{ID_FIELD, Record};
pub use schema::{InferenceRule, SchemaRules};
pub use types::*;
