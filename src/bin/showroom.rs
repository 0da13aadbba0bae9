use clap::{Parser, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, error};

use showroom::config::{Config, EmbedConfig};
use showroom::core::{BusinessContext, ColumnType, ViewId};
use showroom::providers::{ChatRelay, GeminiClient, RecordRelay, ViolationReport};
use showroom::services::{RecordStore, SeedData, WorkspaceSession, WorkspaceSettings};

const DEMO_SEED: &str = include_str!("../../.config/seed.json");

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "AI-assisted data workspace for showroom demos",
    long_about = None
)]
struct Args {
    /// Enable file logging at the given level (overrides RUST_LOG)
    #[arg(long = "logging", value_enum)]
    logging: Option<LogLevel>,
    /// Path to a config file (overrides default config discovery)
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,
    /// Seed file with `main`, `secondary` and `shared` datasets; a demo seed is used when omitted
    #[arg(long = "seed", value_name = "PATH")]
    seed: Option<PathBuf>,
    /// Business context JSON passed to the AI with every question
    #[arg(long = "context", value_name = "PATH")]
    context: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LogLevel { Error, Warn, Info, Debug, Trace }

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

const HELP: &str = "\
commands:
  views                         list views
  view <id>                     switch the active view
  rows                          show the visible rows
  columns                       show the active columns
  edit <row> <column> <value>   set one cell
  add-column <type> <label>     add a column (text, number, select, image)
  drop-column <key>             hide a column
  add-row                       append an empty record
  delete-row <row>              remove a record
  ask <question>                ask the AI about the visible rows
  history                       show the chat transcript
  clear                         clear the chat transcript
  chat <message>                talk to the showroom chat relay
  report <row>                  forward a record to the automation webhook
  embeds                        show the embedded table and app links
  help                          show this text
  quit                          exit";

/// Everything the command loop needs besides the session
struct Surfaces {
    ai: GeminiClient,
    chat: ChatRelay,
    records: RecordRelay,
    business_context: Option<BusinessContext>,
    embeds: EmbedConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let level = args.logging.map(tracing::Level::from);
    showroom::logging::init_with(None, level)?;

    let config =
        Config::from_path(args.config.as_ref()).wrap_err("failed to load configuration")?;
    let seed = match &args.seed {
        Some(path) => SeedData::from_path(path)
            .wrap_err_with(|| format!("failed to read seed file {}", path.display()))?,
        None => SeedData::from_json_str(DEMO_SEED)?,
    };
    let business_context = match &args.context {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let context = serde_json::from_str::<BusinessContext>(&text)
                .wrap_err_with(|| format!("invalid business context {}", path.display()))?;
            Some(context)
        }
        None => None,
    };

    let store = RecordStore::new(seed)?;
    let mut session = WorkspaceSession::new(store, WorkspaceSettings::from_config(&config))?;
    let surfaces = Surfaces {
        ai: GeminiClient::from_config(&config.ai),
        chat: ChatRelay::from_config(&config.relay),
        records: RecordRelay::from_config(&config.relay),
        business_context,
        embeds: config.embeds.clone(),
    };

    println!("{} ({})", config.scenario_name, session.view_label(session.active_view()));
    println!("type `help` for commands");
    print_rows(&session);

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{}> ", session.active_view());
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let (command, rest) = input.split_once(char::is_whitespace).unwrap_or((input, ""));
        debug!(command, "command received");
        match run_command(&mut session, &surfaces, command, rest.trim()).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                error!("command `{command}` failed: {e}");
                println!("error: {e}");
            }
        }
    }
    Ok(())
}

/// Run one command. Returns `false` when the loop should stop.
async fn run_command(
    session: &mut WorkspaceSession,
    surfaces: &Surfaces,
    command: &str,
    rest: &str,
) -> Result<bool> {
    match command {
        "views" => {
            for view in session.views() {
                let marker = if &view == session.active_view() { "*" } else { " " };
                println!("{marker} {view}\t{}", session.view_label(&view));
            }
        }
        "view" => {
            session.select_view(ViewId::from_str(rest).map_err(|e| eyre!(e))?)?;
            print_last_message(session);
            print_rows(session);
        }
        "rows" => print_rows(session),
        "columns" => {
            for column in session.columns() {
                println!("{}\t{}", column.key, column.column_type);
            }
        }
        "edit" => {
            let mut parts = rest.splitn(3, char::is_whitespace);
            let (Some(row), Some(key)) = (parts.next(), parts.next()) else {
                println!("usage: edit <row> <column> <value>");
                return Ok(true);
            };
            let stored = session.edit_cell(row, key, parts.next().unwrap_or(""))?;
            println!("{row}.{key} = {stored}");
        }
        "add-column" => {
            let Some((ty, label)) = rest.split_once(char::is_whitespace) else {
                println!("usage: add-column <type> <label>");
                return Ok(true);
            };
            let column_type = ColumnType::from_str(ty)?;
            session.set_column_draft(label, column_type);
            session.commit_column_draft()?;
            print_last_message(session);
        }
        "drop-column" => {
            if !session.delete_column(rest) {
                println!("no removable column `{rest}`");
            }
        }
        "add-row" => {
            let id = session.add_record()?;
            println!("added {id}");
        }
        "delete-row" => {
            session.delete_record(rest)?;
            println!("deleted {rest}");
        }
        "ask" => {
            let reply = session
                .ask(&surfaces.ai, rest, surfaces.business_context.as_ref())
                .await?;
            println!("AI: {}", reply.text);
        }
        "history" => {
            for message in session.transcript().messages() {
                let at = message.created_at.format("%H:%M:%S");
                println!("[{at}] {}: {}", message.role, message.text);
            }
        }
        "clear" => session.clear_chat(),
        "chat" => println!("{}", surfaces.chat.ask(rest).await),
        "report" => {
            let owner = session.active_source().owner();
            let Some(record) = session.store().find(&owner, rest).cloned() else {
                println!("no row `{rest}` in {owner}");
                return Ok(true);
            };
            let report = ViolationReport::new(session.active_view().clone(), record);
            let outcome = surfaces.records.forward(&report).await;
            println!("{}", if outcome.is_success() { "forwarded" } else { "not forwarded" });
        }
        "embeds" => {
            let links = [
                ("table", &surfaces.embeds.table_url),
                ("app", &surfaces.embeds.app_url),
            ];
            for (name, url) in links {
                println!("{name}\t{}", url.as_deref().unwrap_or("(not configured)"));
            }
        }
        "help" => println!("{HELP}"),
        "quit" | "exit" => return Ok(false),
        other => println!("unknown command `{other}`, try `help`"),
    }
    Ok(true)
}

fn print_last_message(session: &WorkspaceSession) {
    if let Some(message) = session.transcript().last() {
        println!("AI: {}", message.text);
    }
}

fn print_rows(session: &WorkspaceSession) {
    let columns = session.columns();
    let header: Vec<&str> = columns.iter().map(|c| c.label.as_str()).collect();
    println!("{}", header.join("\t"));
    for row in session.visible_rows() {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| row.get(&c.key).map(ToString::to_string).unwrap_or_default())
            .collect();
        println!("{}", cells.join("\t"));
    }
}
