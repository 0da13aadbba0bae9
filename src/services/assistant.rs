//! Assembles the AI request from a snapshot of the workspace.
//!
//! The request is built and owned before the provider is awaited, so the
//! session stays editable while a question is outstanding. The AI reasons
//! over the rows as they were when the question was asked; edits made during
//! the call are not reflected in that answer.

use serde::Serialize;
use std::fmt::Write as _;
use tracing::{debug, warn};

use crate::core::{BusinessContext, ChatMessage, ColumnDefinition, Record, ViewId};
use crate::error::ProviderError;
use crate::providers::{AiRequest, CompletionProvider};

/// Everything the AI gets to see about the workspace
#[derive(Debug, Clone, Copy)]
pub struct ContextSnapshot<'a> {
    pub scenario_name: &'a str,
    pub view: &'a ViewId,
    pub columns: &'a [ColumnDefinition],
    pub rows: &'a [&'a Record],
    pub business_context: Option<&'a BusinessContext>,
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        warn!(error = %e, "could not serialize workspace context, sending an empty list");
        "[]".to_string()
    })
}

/// Compose the instruction text: scenario, view, columns, visible rows,
/// optional business context, then the question.
pub fn build_instruction(snapshot: &ContextSnapshot<'_>, question: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "You are the data analyst of the \"{}\" workspace.",
        snapshot.scenario_name
    );
    let _ = writeln!(out, "Active view: {}", snapshot.view);
    let _ = writeln!(out, "Columns: {}", to_json(snapshot.columns));
    let _ = writeln!(
        out,
        "Visible rows ({}): {}",
        snapshot.rows.len(),
        to_json(snapshot.rows)
    );
    if let Some(ctx) = snapshot.business_context {
        out.push_str(&ctx.to_prompt_section());
    }
    let _ = writeln!(
        out,
        "Answer using the data above. Be concise and point to specific rows where relevant."
    );
    let _ = write!(out, "Question: {}", question.trim());
    out
}

/// Build the full request. `history` is the transcript before the question.
pub fn build_request(
    snapshot: &ContextSnapshot<'_>,
    history: &[ChatMessage],
    question: &str,
) -> AiRequest {
    AiRequest {
        history: history.to_vec(),
        instruction: build_instruction(snapshot, question),
    }
}

/// An outstanding question. Owns its request so it can be resolved without
/// borrowing the session.
#[derive(Debug, Clone)]
pub struct PendingAsk {
    question: String,
    request: AiRequest,
}

impl PendingAsk {
    pub(crate) fn new(question: String, request: AiRequest) -> Self {
        Self { question, request }
    }

    /// Call the provider once. No retry, no timeout.
    pub async fn resolve<P>(self, provider: &P) -> Result<String, ProviderError>
    where
        P: CompletionProvider + ?Sized,
    {
        debug!(question = %self.question, "sending question to AI provider");
        provider.complete(&self.request).await
    }
}
