pub mod assistant;
pub mod record_store;
pub mod workspace;

pub use assistant::{ContextSnapshot, PendingAsk};
pub use record_store::{MAX_SECONDARY_VIEWS, RecordStore, SeedData};
pub use workspace::{
    ActiveSource, AskState, CellRef, ColumnDraft, WorkspaceSession, WorkspaceSettings,
};
