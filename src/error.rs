//! Error types for the workspace engine and its AI provider.
//!
//! Application plumbing (config loading, logging, the binary) reports through
//! `color_eyre`; these enums cover the domain operations that callers match on.

use thiserror::Error;

use crate::core::{DatasetKey, ViewId};

/// Errors returned by record store and workspace session operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkspaceError {
    /// A dataset used as schema source has no records.
    #[error("dataset `{0}` is empty; at least one seed record is required")]
    EmptyDataset(DatasetKey),
    /// Two records in one dataset share an id.
    #[error("duplicate record id `{id}` in dataset `{dataset}`")]
    DuplicateRecordId { dataset: DatasetKey, id: String },
    /// More secondary views were seeded than the workspace supports.
    #[error("at most {max} secondary views are supported, got {got}")]
    TooManySecondaryViews { max: usize, got: usize },
    /// The view id is neither `main` nor a known secondary view.
    #[error("unknown view `{0}`")]
    UnknownView(ViewId),
    /// No record with this id exists in the active dataset.
    #[error("row `{row}` not found in dataset `{dataset}`")]
    UnknownRow { dataset: DatasetKey, row: String },
    /// The field key is not part of the active schema.
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    /// Deleting the record would leave the dataset without a schema source.
    #[error("cannot delete the last record of dataset `{0}`")]
    LastRecord(DatasetKey),
    /// The `id` field cannot be edited.
    #[error("the id field is immutable")]
    ImmutableId,
    /// A column label was empty after trimming.
    #[error("column label must not be empty")]
    EmptyLabel,
    /// A question was empty after trimming.
    #[error("question must not be empty")]
    EmptyQuestion,
    /// A question is already awaiting an answer in this session.
    #[error("an AI request is already in flight")]
    AskInFlight,
}

/// Errors raised by a completion provider. These never leave the assistant:
/// they are logged and replaced by a fixed notice in the transcript.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No API key was configured.
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    /// The request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The endpoint answered with a non-success status.
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The response carried no text.
    #[error("response contained no text")]
    Empty,
}
