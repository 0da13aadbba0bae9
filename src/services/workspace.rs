use crate::config::{Config, MessageTemplates, ViewDefinition, ViewFilter};
use crate::core::{
    BusinessContext, ChatMessage, ChatRole, ColumnDefinition, ColumnType, DatasetKey, FieldValue,
    ID_FIELD, Record, RecordId, SchemaRules, Transcript, ViewId,
};
use crate::error::{ProviderError, WorkspaceError};
use crate::providers::CompletionProvider;
use crate::services::assistant::{self, ContextSnapshot, PendingAsk};
use crate::services::record_store::RecordStore;
use tracing::{debug, info, warn};

/// Session-wide settings taken from configuration
#[derive(Debug, Clone)]
pub struct WorkspaceSettings {
    pub scenario_name: String,
    pub views: Vec<ViewDefinition>,
    pub rules: SchemaRules,
    pub messages: MessageTemplates,
}

impl WorkspaceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            scenario_name: config.scenario_name.clone(),
            views: config.views.clone(),
            rules: SchemaRules::with_extra(config.inference_rules.clone()),
            messages: config.messages.clone(),
        }
    }

    /// The configured definition of `id`, if any
    pub fn view(&self, id: &ViewId) -> Option<&ViewDefinition> {
        self.views.iter().find(|v| &v.id == id)
    }
}

/// Where the rows of the active view come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveSource {
    Main,
    /// The view's own secondary dataset
    Dedicated(ViewId),
    /// The shared secondary dataset
    Shared,
    /// `main` narrowed by the view's filter; no filter means no rows
    FilteredMain(Option<ViewFilter>),
}

impl ActiveSource {
    /// The dataset that physically holds the visible rows
    pub fn owner(&self) -> DatasetKey {
        match self {
            Self::Main | Self::FilteredMain(_) => DatasetKey::Main,
            Self::Dedicated(view) => DatasetKey::Secondary(view.clone()),
            Self::Shared => DatasetKey::Shared,
        }
    }
}

/// The cell currently open for editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRef {
    pub row_id: String,
    pub key: String,
}

/// In-progress "add column" form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDraft {
    pub label: String,
    pub column_type: ColumnType,
}

impl Default for ColumnDraft {
    fn default() -> Self {
        Self {
            label: String::new(),
            column_type: ColumnType::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskState {
    Idle,
    Awaiting,
}

/// WorkspaceSession is the single controller of a workspace
///
/// It owns the record store, the active view and its derived schema, the
/// editing state and the chat transcript. All mutation goes through it.
#[derive(Debug)]
pub struct WorkspaceSession {
    store: RecordStore,
    settings: WorkspaceSettings,
    active_view: ViewId,
    active_source: ActiveSource,
    columns: Vec<ColumnDefinition>,
    editing_cell: Option<CellRef>,
    column_draft: ColumnDraft,
    transcript: Transcript,
    ask_state: AskState,
}

impl WorkspaceSession {
    /// Start on the `main` view. Fails if `main` has no records.
    pub fn new(store: RecordStore, settings: WorkspaceSettings) -> Result<Self, WorkspaceError> {
        let columns = settings.rules.infer_columns(&DatasetKey::Main, store.main())?;
        Ok(Self {
            store,
            settings,
            active_view: ViewId::main(),
            active_source: ActiveSource::Main,
            columns,
            editing_cell: None,
            column_draft: ColumnDraft::default(),
            transcript: Transcript::default(),
            ask_state: AskState::Idle,
        })
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn active_view(&self) -> &ViewId {
        &self.active_view
    }

    pub fn active_source(&self) -> &ActiveSource {
        &self.active_source
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn editing_cell(&self) -> Option<&CellRef> {
        self.editing_cell.as_ref()
    }

    pub fn column_draft(&self) -> &ColumnDraft {
        &self.column_draft
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn ask_state(&self) -> AskState {
        self.ask_state
    }

    /// Whether a question is outstanding; new questions are refused meanwhile
    pub fn is_awaiting(&self) -> bool {
        self.ask_state == AskState::Awaiting
    }

    /// `main`, then configured views, then any seeded view not configured
    pub fn views(&self) -> Vec<ViewId> {
        let mut views = vec![ViewId::main()];
        let configured = self.settings.views.iter().map(|v| &v.id);
        for view in configured.chain(self.store.secondary_views()) {
            if !views.contains(view) {
                views.push(view.clone());
            }
        }
        views
    }

    pub fn view_label(&self, view: &ViewId) -> String {
        self.settings
            .view(view)
            .map(|v| v.label.clone())
            .unwrap_or_else(|| view.to_string())
    }

    fn resolve_source(&self, view: &ViewId) -> Result<ActiveSource, WorkspaceError> {
        if view.is_main() {
            return Ok(ActiveSource::Main);
        }
        if self.store.secondary(view).is_some() {
            return Ok(ActiveSource::Dedicated(view.clone()));
        }
        let Some(definition) = self.settings.view(view) else {
            return Err(WorkspaceError::UnknownView(view.clone()));
        };
        if self.store.shared().is_some() {
            return Ok(ActiveSource::Shared);
        }
        Ok(ActiveSource::FilteredMain(definition.filter.clone()))
    }

    fn source_records(&self, source: &ActiveSource) -> &[Record] {
        self.store.dataset(&source.owner()).unwrap_or_default()
    }

    /// Rows of the active view after fallback and filtering
    pub fn visible_rows(&self) -> Vec<&Record> {
        let records = self.source_records(&self.active_source);
        match &self.active_source {
            ActiveSource::FilteredMain(Some(filter)) => {
                records.iter().filter(|r| filter.matches(r)).collect()
            }
            ActiveSource::FilteredMain(None) => Vec::new(),
            _ => records.iter().collect(),
        }
    }

    /// Switch the active view and re-infer its schema.
    ///
    /// Resets the open cell edit and the add-column draft, and announces the
    /// switch in the transcript.
    pub fn select_view(&mut self, view: ViewId) -> Result<&[ColumnDefinition], WorkspaceError> {
        let source = self.resolve_source(&view)?;
        let columns = self
            .settings
            .rules
            .infer_columns(&source.owner(), self.source_records(&source))?;

        self.active_view = view;
        self.active_source = source;
        self.columns = columns;
        self.editing_cell = None;
        self.column_draft = ColumnDraft::default();

        let count = self.visible_rows().len();
        let label = self.view_label(&self.active_view);
        info!(
            view = %self.active_view,
            source = ?self.active_source,
            rows = count,
            "view selected"
        );
        let count = count.to_string();
        let text = MessageTemplates::render(
            &self.settings.messages.view_switched,
            &[("label", label.as_str()), ("count", count.as_str())],
        );
        self.transcript.push(ChatRole::Ai, text);
        Ok(&self.columns)
    }

    fn column(&self, key: &str) -> Result<&ColumnDefinition, WorkspaceError> {
        self.columns
            .iter()
            .find(|c| c.key == key)
            .ok_or_else(|| WorkspaceError::UnknownColumn(key.to_string()))
    }

    fn check_editable(&self, row_id: &str, key: &str) -> Result<ColumnType, WorkspaceError> {
        if key == ID_FIELD {
            return Err(WorkspaceError::ImmutableId);
        }
        let column_type = self.column(key)?.column_type;
        let owner = self.active_source.owner();
        if self.store.find(&owner, row_id).is_none() {
            return Err(WorkspaceError::UnknownRow {
                dataset: owner,
                row: row_id.to_string(),
            });
        }
        Ok(column_type)
    }

    /// Open a cell for editing
    pub fn begin_edit(&mut self, row_id: &str, key: &str) -> Result<(), WorkspaceError> {
        self.check_editable(row_id, key)?;
        self.editing_cell = Some(CellRef {
            row_id: row_id.to_string(),
            key: key.to_string(),
        });
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.editing_cell = None;
    }

    /// Store `raw` into one cell of the active dataset and return the stored
    /// value. Number columns are coerced leniently; see [`ColumnType::coerce`].
    pub fn edit_cell(
        &mut self,
        row_id: &str,
        key: &str,
        raw: &str,
    ) -> Result<FieldValue, WorkspaceError> {
        let column_type = self.check_editable(row_id, key)?;
        let value = FieldValue::Text(column_type.coerce(raw));
        self.store
            .update_field(&self.active_source.owner(), row_id, key, value.clone())?;

        if self
            .editing_cell
            .as_ref()
            .is_some_and(|c| c.row_id == row_id && c.key == key)
        {
            self.editing_cell = None;
        }
        debug!(row = row_id, key, value = %value, "cell edited");
        Ok(value)
    }

    /// Append a column and back-fill its field on every record of every
    /// dataset, visible or not. Duplicate labels are accepted.
    pub fn add_column(
        &mut self,
        label: &str,
        column_type: ColumnType,
    ) -> Result<ColumnDefinition, WorkspaceError> {
        let key = label.trim();
        if key.is_empty() {
            return Err(WorkspaceError::EmptyLabel);
        }
        if key == ID_FIELD {
            return Err(WorkspaceError::ImmutableId);
        }
        let column = ColumnDefinition::new(key, column_type);
        let touched = self.store.backfill(key, &column_type.default_value());
        self.columns.push(column.clone());
        info!(column = key, r#type = %column_type, touched, "column added");

        let type_name = column_type.to_string();
        let text = MessageTemplates::render(
            &self.settings.messages.column_added,
            &[("label", key), ("type", type_name.as_str())],
        );
        self.transcript.push(ChatRole::Ai, text);
        Ok(column)
    }

    pub fn set_column_draft(&mut self, label: &str, column_type: ColumnType) {
        self.column_draft = ColumnDraft {
            label: label.to_string(),
            column_type,
        };
    }

    /// Add the drafted column. The draft is kept if it is rejected.
    pub fn commit_column_draft(&mut self) -> Result<ColumnDefinition, WorkspaceError> {
        let ColumnDraft { label, column_type } = self.column_draft.clone();
        let column = self.add_column(&label, column_type)?;
        self.column_draft = ColumnDraft::default();
        Ok(column)
    }

    /// Hide a column. Record data is left in place. Returns whether a column
    /// was removed; `id` is never removed.
    pub fn delete_column(&mut self, key: &str) -> bool {
        if key == ID_FIELD {
            debug!("ignoring request to delete the id column");
            return false;
        }
        let before = self.columns.len();
        self.columns.retain(|c| c.key != key);
        if self.editing_cell.as_ref().is_some_and(|c| c.key == key) {
            self.editing_cell = None;
        }
        before != self.columns.len()
    }

    /// Append a record with a fresh id and default values to the active dataset
    pub fn add_record(&mut self) -> Result<RecordId, WorkspaceError> {
        let id = RecordId::generate();
        let mut record = Record::with_id(&id);
        for column in &self.columns {
            record.insert_if_absent(&column.key, column.column_type.default_value());
        }
        let owner = self.active_source.owner();
        self.store.insert(&owner, record)?;
        debug!(%id, dataset = %owner, "record added");
        Ok(id)
    }

    /// Remove a record from the active dataset. The last record of a dataset
    /// cannot be deleted.
    pub fn delete_record(&mut self, row_id: &str) -> Result<Record, WorkspaceError> {
        let owner = self.active_source.owner();
        let removed = self.store.remove(&owner, row_id)?;
        if self.editing_cell.as_ref().is_some_and(|c| c.row_id == row_id) {
            self.editing_cell = None;
        }
        debug!(row = row_id, dataset = %owner, "record deleted");
        Ok(removed)
    }

    /// Drop the chat history
    pub fn clear_chat(&mut self) {
        self.transcript.clear();
    }

    /// Record the question and snapshot the request for it.
    ///
    /// Refuses blank questions and a second question while one is awaiting;
    /// in both cases nothing is appended.
    pub fn begin_ask(
        &mut self,
        question: &str,
        business_context: Option<&BusinessContext>,
    ) -> Result<PendingAsk, WorkspaceError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(WorkspaceError::EmptyQuestion);
        }
        if self.is_awaiting() {
            return Err(WorkspaceError::AskInFlight);
        }

        let rows = self.visible_rows();
        let snapshot = ContextSnapshot {
            scenario_name: &self.settings.scenario_name,
            view: &self.active_view,
            columns: &self.columns,
            rows: &rows,
            business_context,
        };
        let request = assistant::build_request(&snapshot, self.transcript.messages(), question);

        self.transcript.push(ChatRole::User, question);
        self.ask_state = AskState::Awaiting;
        Ok(PendingAsk::new(question.to_string(), request))
    }

    /// Append the AI's answer, or the fixed notice if the call failed or
    /// came back blank, and return to idle.
    pub fn complete_ask(&mut self, outcome: Result<String, ProviderError>) -> &ChatMessage {
        let text = match outcome {
            Ok(answer) if !answer.trim().is_empty() => answer,
            Ok(_) => {
                debug!("AI returned an empty answer");
                self.settings.messages.empty_answer.clone()
            }
            Err(e) => {
                warn!(error = %e, "AI request failed");
                self.settings.messages.ai_failure.clone()
            }
        };
        self.ask_state = AskState::Idle;
        self.transcript.push(ChatRole::Ai, text)
    }

    /// Ask the AI about the active view. Provider failures end up in the
    /// transcript, never in the returned error.
    pub async fn ask<P>(
        &mut self,
        provider: &P,
        question: &str,
        business_context: Option<&BusinessContext>,
    ) -> Result<&ChatMessage, WorkspaceError>
    where
        P: CompletionProvider + ?Sized,
    {
        let pending = self.begin_ask(question, business_context)?;
        let outcome = pending.resolve(provider).await;
        Ok(self.complete_ask(outcome))
    }
}
