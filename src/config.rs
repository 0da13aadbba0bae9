use std::{env, path::PathBuf};

use directories::BaseDirs;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{InferenceRule, Record, ViewId};

const CONFIG: &str = include_str!("../.config/config.json5");

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
    pub static ref CONFIG_FOLDER: Option<PathBuf> =
        env::var(format!("{}_CONFIG", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
}

/// Generative-AI endpoint settings
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AiConfig {
    /// Base URL of a `generateContent`-compatible API, without the model path
    pub endpoint: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is not set
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl AiConfig {
    /// The configured key, falling back to the named environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                self.api_key_env
                    .as_deref()
                    .and_then(|name| env::var(name).ok())
                    .filter(|k| !k.trim().is_empty())
            })
    }
}

/// Predicate used when a secondary view has no data of its own: the first
/// present field of `fields` must contain `needle` (case-insensitive).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ViewFilter {
    pub fields: Vec<String>,
    pub needle: String,
}

impl ViewFilter {
    pub fn matches(&self, record: &Record) -> bool {
        let needle = self.needle.to_lowercase();
        self.fields
            .iter()
            .find_map(|field| record.get(field))
            .map(|value| value.to_string().to_lowercase().contains(&needle))
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ViewDefinition {
    pub id: ViewId,
    pub label: String,
    #[serde(default)]
    pub filter: Option<ViewFilter>,
}

/// Fixed chat texts. `{label}`, `{count}` and `{type}` are substituted.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MessageTemplates {
    pub view_switched: String,
    pub column_added: String,
    pub empty_answer: String,
    pub ai_failure: String,
}

impl MessageTemplates {
    pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
        vars.iter().fold(template.to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{}}}", name), value)
        })
    }
}

/// A keyword rule of the local chat fallback
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FallbackRule {
    pub keywords: Vec<String>,
    pub reply: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FallbackConfig {
    #[serde(default)]
    pub rules: Vec<FallbackRule>,
    pub default: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub chat_url: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    pub fallback: FallbackConfig,
}

/// Third-party surfaces embedded next to the workspace. Opaque to this crate.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EmbedConfig {
    #[serde(default)]
    pub table_url: Option<String>,
    #[serde(default)]
    pub app_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub scenario_name: String,
    pub ai: AiConfig,
    #[serde(default)]
    pub views: Vec<ViewDefinition>,
    #[serde(default)]
    pub inference_rules: Vec<InferenceRule>,
    pub messages: MessageTemplates,
    pub relay: RelayConfig,
    #[serde(default)]
    pub embeds: EmbedConfig,
}

impl Config {
    /// The built-in defaults only
    pub fn embedded() -> Result<Self, json5::Error> {
        json5::from_str(CONFIG)
    }

    /// Layer embedded defaults, a user file and `SHOWROOM__*` environment
    /// variables, in that order of precedence.
    ///
    /// An explicit `config_path` must exist; the default user file is optional.
    pub fn from_path(config_path: Option<&PathBuf>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(CONFIG, config::FileFormat::Json5));

        builder = match config_path {
            Some(p) => builder.add_source(
                config::File::from(expand_tilde(p))
                    .format(config::FileFormat::Json5)
                    .required(true),
            ),
            None => builder.add_source(
                config::File::from(default_user_config_path())
                    .format(config::FileFormat::Json5)
                    .required(false),
            ),
        };

        builder = builder.add_source(
            config::Environment::with_prefix(&PROJECT_NAME)
                .separator("__")
                .try_parsing(true),
        );

        let cfg: Self = builder.build()?.try_deserialize()?;
        debug!(
            scenario = %cfg.scenario_name,
            views = cfg.views.len(),
            "configuration loaded"
        );
        Ok(cfg)
    }
}

fn expand_tilde(path: &PathBuf) -> PathBuf {
    if let Some(s) = path.to_str() {
        if s.starts_with("~") {
            if let Some(base) = BaseDirs::new() {
                return PathBuf::from(s.replacen("~", base.home_dir().to_str().unwrap_or(""), 1));
            }
        }
    }
    path.clone()
}

fn default_user_config_path() -> PathBuf {
    if let Some(dir) = CONFIG_FOLDER.clone() {
        return dir.join("config.json5");
    }
    if let Some(base) = BaseDirs::new() {
        return base.home_dir().join(".showroom-config.json5");
    }
    PathBuf::from(".showroom-config.json5")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use std::io::Write;

    use super::*;
    use crate::core::ColumnType;

    #[test]
    fn test_embedded_defaults_parse() {
        let cfg = Config::embedded().unwrap();
        assert!(!cfg.scenario_name.is_empty());
        assert!(cfg.views.len() <= 4);
        assert!(cfg.views.iter().any(|v| v.filter.is_some()));
    }

    #[test]
    fn test_user_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json5").tempfile().unwrap();
        writeln!(
            file,
            r#"{{ scenario_name: "Factory", ai: {{ model: "custom-model" }},
                 inference_rules: [{{ contains: ["工时"], type: "number" }}] }}"#
        )
        .unwrap();

        let cfg = Config::from_path(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.scenario_name, "Factory");
        assert_eq!(cfg.ai.model, "custom-model");
        assert!(!cfg.ai.endpoint.is_empty());
        assert_eq!(cfg.inference_rules[0].column_type, ColumnType::Number);
    }

    #[test]
    fn test_environment_overrides_files() {
        let mut file = tempfile::Builder::new().suffix(".json5").tempfile().unwrap();
        writeln!(file, r#"{{ messages: {{ empty_answer: "from file" }} }}"#).unwrap();

        // Only this test reads or writes this variable
        let var = format!("{}__MESSAGES__EMPTY_ANSWER", PROJECT_NAME.as_str());
        unsafe { env::set_var(&var, "from environment") };
        let cfg = Config::from_path(Some(&file.path().to_path_buf()));
        unsafe { env::remove_var(&var) };

        let cfg = cfg.unwrap();
        assert_eq!(var, "SHOWROOM__MESSAGES__EMPTY_ANSWER");
        assert_eq!(cfg.messages.empty_answer, "from environment");
        assert!(!cfg.messages.ai_failure.is_empty());
    }

    #[test]
    fn test_embed_links_are_optional() {
        assert_eq!(Config::embedded().unwrap().embeds.table_url, None);

        let mut file = tempfile::Builder::new().suffix(".json5").tempfile().unwrap();
        let link = "https://tables.example.com/t/1";
        writeln!(file, r#"{{ embeds: {{ table_url: "{link}" }} }}"#).unwrap();
        let cfg = Config::from_path(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.embeds.table_url.as_deref(), Some(link));
        assert_eq!(cfg.embeds.app_url, None);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = PathBuf::from("/definitely/not/here.json5");
        assert!(Config::from_path(Some(&path)).is_err());
    }

    #[test]
    fn test_render_template() {
        let vars = [("label", "负责人"), ("type", "text")];
        let text = MessageTemplates::render("Added {label} ({type})", &vars);
        assert_eq!(text, "Added 负责人 (text)");
    }

    #[test]
    fn test_view_filter_uses_first_present_field() {
        let filter = ViewFilter {
            fields: vec!["任务".into(), "地点".into()],
            needle: "巡检".into(),
        };
        let by_task: Record = serde_json::from_str(r#"{"id":"1","任务":"夜间巡检"}"#).unwrap();
        let by_place: Record = serde_json::from_str(r#"{"id":"2","地点":"巡检通道"}"#).unwrap();
        let neither: Record = serde_json::from_str(r#"{"id":"3","情况":"巡检"}"#).unwrap();

        assert!(filter.matches(&by_task));
        assert!(filter.matches(&by_place));
        assert!(!filter.matches(&neither));
    }

    #[test]
    fn test_resolve_api_key_prefers_explicit_key() {
        let ai = AiConfig {
            endpoint: "http://localhost".into(),
            model: "m".into(),
            api_key: Some("k".into()),
            api_key_env: Some("SHOWROOM_TEST_UNSET_KEY".into()),
        };
        assert_eq!(ai.resolve_api_key().as_deref(), Some("k"));

        let blank = AiConfig { api_key: Some(" ".into()), ..ai };
        assert_eq!(blank.resolve_api_key(), None);
    }
}
