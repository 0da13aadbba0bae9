//! Integration tests driving a full workspace session from seed and config files

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use showroom::config::Config;
use showroom::core::{ChatRole, ColumnDefinition, ColumnType, DatasetKey, FieldValue, ViewId};
use showroom::error::{ProviderError, WorkspaceError};
use showroom::providers::{AiRequest, CompletionProvider};
use showroom::services::{RecordStore, SeedData, WorkspaceSession, WorkspaceSettings};
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

const SEED: &str = r#"{
    "main": [
        {"id": "1", "编号": 1, "任务名称": "夜间巡检", "情况": "在岗玩手机"},
        {"id": "2", "编号": 2, "任务名称": "销售拜访", "情况": "无"}
    ],
    "secondary": {
        "gtm": [{"id": "g1", "客户": "华东制造", "预算": 120000}]
    }
}"#;

fn write_temp(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn open_session(config: &Config) -> WorkspaceSession {
    let seed_file = write_temp(".json", SEED);
    let seed = SeedData::from_path(seed_file.path()).unwrap();
    let store = RecordStore::new(seed).unwrap();
    WorkspaceSession::new(store, WorkspaceSettings::from_config(config)).unwrap()
}

fn default_session() -> WorkspaceSession {
    open_session(&Config::embedded().unwrap())
}

/// Answers every question with a fixed text and counts the calls
struct ScriptedProvider {
    reply: Result<String, u16>,
    calls: Mutex<Vec<AiRequest>>,
}

impl ScriptedProvider {
    fn new(reply: Result<&str, u16>) -> Self {
        Self {
            reply: reply.map(str::to_string),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: &AiRequest) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(request.clone());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(ProviderError::Status {
                status: *status,
                body: String::new(),
            }),
        }
    }
}

#[test]
fn test_main_view_schema_and_rows() {
    let session = default_session();
    let keys: Vec<&str> = session.columns().iter().map(|c| c.key.as_str()).collect();
    assert_eq!(keys, vec!["id", "编号", "任务名称", "情况"]);
    assert_eq!(session.visible_rows().len(), 2);
    assert_eq!(session.views()[0], ViewId::main());
}

#[test]
fn test_switch_views_and_back() {
    let mut session = default_session();

    session.select_view(ViewId::new("gtm")).unwrap();
    assert_eq!(
        session.columns().to_vec(),
        vec![
            ColumnDefinition::new("id", ColumnType::Text),
            ColumnDefinition::new("客户", ColumnType::Text),
            ColumnDefinition::new("预算", ColumnType::Number),
        ]
    );

    session.select_view(ViewId::new("patrol")).unwrap();
    let ids: Vec<&str> = session.visible_rows().iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec!["1"]);

    session.select_view(ViewId::main()).unwrap();
    assert_eq!(session.visible_rows().len(), 2);
    assert_eq!(session.transcript().len(), 3);
    assert!(session.transcript().messages().iter().all(|m| m.role == ChatRole::Ai));
}

#[test]
fn test_edit_in_filtered_view_writes_main() {
    let mut session = default_session();
    session.select_view(ViewId::new("patrol")).unwrap();

    session.edit_cell("1", "情况", "离岗").unwrap();
    let row = session.store().find(&DatasetKey::Main, "1").unwrap();
    assert_eq!(row.get("情况"), Some(&FieldValue::from("离岗")));
}

#[test]
fn test_edit_in_dedicated_view_leaves_main_alone() {
    let mut session = default_session();
    session.select_view(ViewId::new("gtm")).unwrap();

    assert_eq!(session.edit_cell("g1", "预算", "¥90,000").unwrap(), FieldValue::from("90000"));
    assert!(matches!(
        session.edit_cell("1", "预算", "1"),
        Err(WorkspaceError::UnknownRow { .. })
    ));
    let main_row = session.store().find(&DatasetKey::Main, "1").unwrap();
    assert!(!main_row.contains("预算"));
}

#[test]
fn test_added_column_survives_view_switches() {
    let mut session = default_session();
    session.select_view(ViewId::new("gtm")).unwrap();
    session.add_column("负责人", ColumnType::Text).unwrap();

    for (_, records) in session.store().datasets() {
        for record in records {
            assert_eq!(record.get("负责人"), Some(&FieldValue::from("")));
        }
    }

    session.select_view(ViewId::main()).unwrap();
    assert!(session.columns().iter().any(|c| c.key == "负责人"));
}

#[test]
fn test_record_lifecycle_in_secondary_view() {
    let mut session = default_session();
    session.select_view(ViewId::new("gtm")).unwrap();

    let id = session.add_record().unwrap();
    let owner = DatasetKey::Secondary(ViewId::new("gtm"));
    assert_eq!(
        session.store().find(&owner, id.as_str()).unwrap().get("预算"),
        Some(&FieldValue::from("0"))
    );
    assert_eq!(session.visible_rows().len(), 2);

    session.delete_record(id.as_str()).unwrap();
    assert_eq!(session.visible_rows().len(), 1);
    assert!(session.delete_record(id.as_str()).is_err());
}

#[test]
fn test_emptying_main_is_refused_and_views_keep_working() {
    let mut session = default_session();
    session.delete_record("2").unwrap();
    assert_eq!(
        session.delete_record("1").unwrap_err(),
        WorkspaceError::LastRecord(DatasetKey::Main)
    );

    session.select_view(ViewId::new("gtm")).unwrap();
    session.select_view(ViewId::new("patrol")).unwrap();
    assert_eq!(session.visible_rows().len(), 1);
    session.select_view(ViewId::main()).unwrap();
    assert_eq!(session.columns()[0], ColumnDefinition::new("id", ColumnType::Text));
}

#[tokio::test]
async fn test_ask_round_trip_grows_transcript_by_two() {
    let mut session = default_session();
    let provider = ScriptedProvider::new(Ok("1 号记录存在违规行为"));

    let before = session.transcript().len();
    session.ask(&provider, "哪些记录有违规？", None).await.unwrap();
    assert_eq!(session.transcript().len(), before + 2);

    let calls = provider.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].instruction.contains("在岗玩手机"));
    assert!(calls[0].instruction.contains("Active view: main"));
}

#[tokio::test]
async fn test_ask_failure_uses_configured_notice() {
    let config_file = write_temp(
        ".json5",
        r#"{ messages: {
                view_switched: "now {label}",
                column_added: "added {label}",
                empty_answer: "no answer",
                ai_failure: "ai is down" } }"#,
    );
    let config = Config::from_path(Some(&config_file.path().to_path_buf())).unwrap();
    let mut session = open_session(&config);
    let provider = ScriptedProvider::new(Err(500));

    let reply = session.ask(&provider, "总结", None).await.unwrap();
    assert_eq!(reply.text, "ai is down");
    assert_eq!(session.transcript().len(), 2);
    assert!(!session.is_awaiting());

    session.select_view(ViewId::new("gtm")).unwrap();
    assert_eq!(session.transcript().last().unwrap().text, "now 销售线索");
}

#[tokio::test]
async fn test_ask_only_sees_active_view_rows() {
    let mut session = default_session();
    session.select_view(ViewId::new("gtm")).unwrap();
    let provider = ScriptedProvider::new(Ok("ok"));

    session.ask(&provider, "预算多少？", None).await.unwrap();
    let calls = provider.calls.lock().unwrap();
    assert!(calls[0].instruction.contains("华东制造"));
    assert!(!calls[0].instruction.contains("在岗玩手机"));
    // the view-switch notice is part of the history
    assert_eq!(calls[0].history.len(), 1);
}

#[test]
fn test_rejected_operations_leave_transcript_untouched() {
    let mut session = default_session();
    assert_eq!(session.add_column("", ColumnType::Text), Err(WorkspaceError::EmptyLabel));
    assert!(session.select_view(ViewId::new("missing")).is_err());
    assert!(session.begin_ask("   ", None).is_err());
    assert!(session.transcript().is_empty());
}
