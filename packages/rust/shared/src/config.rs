//! Application configuration for toolscope.
//!
//! User config lives at `~/.toolscope/toolscope.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::contract;
use crate::error::{Result, ToolScopeError};
use crate::types::{Maturity, Role};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "toolscope.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".toolscope";

/// Default status sheet database file name (inside the config dir).
const STATUS_DB_FILE_NAME: &str = "status.db";

// ---------------------------------------------------------------------------
// Config structs (matching toolscope.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Survey platform connection.
    #[serde(default)]
    pub survey: SurveyConfig,

    /// Form ids per source.
    #[serde(default)]
    pub forms: FormsConfig,

    /// Field-name overrides.
    #[serde(default)]
    pub fields: FieldsConfig,

    /// Local copy of the status sheet.
    #[serde(default)]
    pub status_sheet: StatusSheetConfig,

    /// Known coordinator display names.
    #[serde(default)]
    pub coordinators: Vec<CoordinatorEntry>,
}

/// `[survey]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    /// Base URL of the survey platform.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API token (never store the token itself).
    #[serde(default = "default_api_token_env")]
    pub api_token_env: String,

    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Deadline for a whole source fetch, after which it counts as unavailable.
    #[serde(default = "default_source_deadline")]
    pub source_deadline_secs: u64,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token_env: default_api_token_env(),
            request_timeout_secs: default_request_timeout(),
            source_deadline_secs: default_source_deadline(),
        }
    }
}

fn default_base_url() -> String {
    "https://kf.kobotoolbox.org".into()
}
fn default_api_token_env() -> String {
    "TOOLSCOPE_SURVEY_TOKEN".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_source_deadline() -> u64 {
    45
}

/// `[forms]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormsConfig {
    /// Tool registration feed (builds the tool directory).
    #[serde(default)]
    pub registration: String,

    /// Coordinator reassignment feed.
    #[serde(default)]
    pub reassignment: String,

    #[serde(default)]
    pub innovator: FormPair,

    #[serde(default)]
    pub domain_expert: FormPair,

    #[serde(default)]
    pub direct_user: FormPair,

    #[serde(default)]
    pub indirect_user: FormPair,
}

impl FormsConfig {
    fn pair(&self, role: Role) -> &FormPair {
        match role {
            Role::Innovator => &self.innovator,
            Role::DomainExpert => &self.domain_expert,
            Role::DirectUser => &self.direct_user,
            Role::IndirectUser => &self.indirect_user,
        }
    }
}

/// Form ids of one role, per maturity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormPair {
    #[serde(default)]
    pub early: String,
    #[serde(default)]
    pub advanced: String,
}

impl FormPair {
    pub fn get(&self, maturity: Maturity) -> &str {
        match maturity {
            Maturity::Early => &self.early,
            Maturity::Advanced => &self.advanced,
        }
    }
}

/// `[fields]` section. Every entry falls back to the built-in contract tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub innovator: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_expert: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_user: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indirect_user: Option<Vec<String>>,

    #[serde(default)]
    pub registration: RegistrationFields,

    #[serde(default)]
    pub reassignment: ReassignmentFields,
}

impl FieldsConfig {
    fn id_override(&self, role: Role) -> Option<&Vec<String>> {
        match role {
            Role::Innovator => self.innovator.as_ref(),
            Role::DomainExpert => self.domain_expert.as_ref(),
            Role::DirectUser => self.direct_user.as_ref(),
            Role::IndirectUser => self.indirect_user.as_ref(),
        }
    }
}

/// Field names of the tool registration feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationFields {
    #[serde(default = "default_registration_id_fields")]
    pub id: Vec<String>,
    #[serde(default = "default_registration_name")]
    pub name: String,
    #[serde(default = "default_registration_maturity")]
    pub maturity: String,
    #[serde(default = "default_registration_coordinator")]
    pub coordinator_email: String,
    #[serde(default = "default_submission_time")]
    pub submitted_at: String,
}

impl Default for RegistrationFields {
    fn default() -> Self {
        Self {
            id: default_registration_id_fields(),
            name: default_registration_name(),
            maturity: default_registration_maturity(),
            coordinator_email: default_registration_coordinator(),
            submitted_at: default_submission_time(),
        }
    }
}

fn default_registration_id_fields() -> Vec<String> {
    to_owned_list(contract::REGISTRATION_ID_FIELDS)
}
fn default_registration_name() -> String {
    contract::REGISTRATION_NAME_FIELD.into()
}
fn default_registration_maturity() -> String {
    contract::REGISTRATION_MATURITY_FIELD.into()
}
fn default_registration_coordinator() -> String {
    contract::REGISTRATION_COORDINATOR_FIELD.into()
}
fn default_submission_time() -> String {
    contract::SUBMISSION_TIME_FIELD.into()
}

/// Field names of the reassignment feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentFields {
    #[serde(default = "default_reassignment_id_fields")]
    pub id: Vec<String>,
    #[serde(default = "default_reassignment_email")]
    pub new_coordinator_email: String,
    #[serde(default = "default_submission_time")]
    pub submitted_at: String,
}

impl Default for ReassignmentFields {
    fn default() -> Self {
        Self {
            id: default_reassignment_id_fields(),
            new_coordinator_email: default_reassignment_email(),
            submitted_at: default_submission_time(),
        }
    }
}

fn default_reassignment_id_fields() -> Vec<String> {
    to_owned_list(contract::REASSIGNMENT_ID_FIELDS)
}
fn default_reassignment_email() -> String {
    contract::REASSIGNMENT_EMAIL_FIELD.into()
}

fn to_owned_list(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| (*f).to_string()).collect()
}

/// `[status_sheet]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSheetConfig {
    /// Database path; defaults to `~/.toolscope/status.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

/// `[[coordinators]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorEntry {
    pub email: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Runtime config (derived once from AppConfig)
// ---------------------------------------------------------------------------

/// Immutable routing and correlation tables handed to the engine.
#[derive(Debug, Clone)]
pub struct SourceCatalog {
    forms: BTreeMap<Role, FormPair>,
    id_fields: BTreeMap<Role, Vec<String>>,
    /// Registration feed form id.
    pub registration_form: String,
    /// Reassignment feed form id.
    pub reassignment_form: String,
    pub registration_fields: RegistrationFields,
    pub reassignment_fields: ReassignmentFields,
}

impl SourceCatalog {
    /// The form id of `role` for `maturity` (may be empty when unconfigured).
    pub fn form_id(&self, role: Role, maturity: Maturity) -> &str {
        self.forms
            .get(&role)
            .map(|pair| pair.get(maturity))
            .unwrap_or("")
    }

    /// Ordered identifier candidates for `role`.
    pub fn id_fields(&self, role: Role) -> &[String] {
        self.id_fields.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl From<&AppConfig> for SourceCatalog {
    fn from(config: &AppConfig) -> Self {
        let forms = Role::ALL
            .iter()
            .map(|role| (*role, config.forms.pair(*role).clone()))
            .collect();

        let id_fields = Role::ALL
            .iter()
            .map(|role| {
                let fields = config
                    .fields
                    .id_override(*role)
                    .cloned()
                    .unwrap_or_else(|| to_owned_list(contract::id_fields(*role)));
                (*role, fields)
            })
            .collect();

        Self {
            forms,
            id_fields,
            registration_form: config.forms.registration.clone(),
            reassignment_form: config.forms.reassignment.clone(),
            registration_fields: config.fields.registration.clone(),
            reassignment_fields: config.fields.reassignment.clone(),
        }
    }
}

/// Runtime fetch configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Survey platform base URL.
    pub base_url: String,
    /// API token, if one is set in the environment.
    pub api_token: Option<String>,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Per-source deadline applied by the concurrent fetcher.
    pub source_deadline: Duration,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        let api_token = std::env::var(&config.survey.api_token_env)
            .ok()
            .filter(|t| !t.is_empty());
        Self {
            base_url: config.survey.base_url.clone(),
            api_token,
            request_timeout: Duration::from_secs(config.survey.request_timeout_secs),
            source_deadline: Duration::from_secs(config.survey.source_deadline_secs),
        }
    }
}

impl AppConfig {
    /// Known coordinator display names keyed by email.
    pub fn coordinator_names(&self) -> BTreeMap<String, String> {
        self.coordinators
            .iter()
            .map(|c| (c.email.trim().to_string(), c.name.clone()))
            .collect()
    }

    /// Resolved path of the status sheet database.
    pub fn status_db_path(&self) -> Result<PathBuf> {
        match &self.status_sheet.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(config_dir()?.join(STATUS_DB_FILE_NAME)),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.toolscope/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ToolScopeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.toolscope/toolscope.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ToolScopeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ToolScopeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ToolScopeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ToolScopeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ToolScopeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the survey API token env var is set and non-empty.
pub fn validate_survey_token(config: &AppConfig) -> Result<()> {
    let var_name = &config.survey.api_token_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(ToolScopeError::config(format!(
            "survey API token not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("TOOLSCOPE_SURVEY_TOKEN"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.survey.request_timeout_secs, 30);
        assert_eq!(parsed.survey.source_deadline_secs, 45);
        assert_eq!(
            parsed.fields.registration.id,
            vec!["group_tool/tool_id", "tool_id"]
        );
    }

    #[test]
    fn config_with_forms_and_coordinators() {
        let toml_str = r#"
[forms]
registration = "aReg"
reassignment = "aMove"

[forms.direct_user]
early = "aDirEarly"
advanced = "aDirAdv"

[fields]
innovator = ["custom/tool_id"]

[[coordinators]]
email = "jane.doe@example.org"
name = "Jane D."
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        let catalog = SourceCatalog::from(&config);

        assert_eq!(catalog.registration_form, "aReg");
        assert_eq!(catalog.form_id(Role::DirectUser, Maturity::Early), "aDirEarly");
        assert_eq!(catalog.form_id(Role::DirectUser, Maturity::Advanced), "aDirAdv");
        assert_eq!(catalog.form_id(Role::Innovator, Maturity::Early), "");
        assert_eq!(catalog.id_fields(Role::Innovator), ["custom/tool_id"]);
        assert_eq!(
            catalog.id_fields(Role::DirectUser).first().map(String::as_str),
            Some(contract::DIRECT_USER_ID_FIELDS[0])
        );
        assert_eq!(
            config.coordinator_names().get("jane.doe@example.org"),
            Some(&"Jane D.".to_string())
        );
    }

    #[test]
    fn fetch_config_from_app_config() {
        let mut app = AppConfig::default();
        app.survey.api_token_env = "TS_TEST_NONEXISTENT_TOKEN_12345".into();
        let fetch = FetchConfig::from(&app);
        assert_eq!(fetch.request_timeout, Duration::from_secs(30));
        assert_eq!(fetch.source_deadline, Duration::from_secs(45));
        assert!(fetch.api_token.is_none());
    }

    #[test]
    fn token_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.survey.api_token_env = "TS_TEST_NONEXISTENT_TOKEN_12345".into();
        let result = validate_survey_token(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("token not found"));
    }
}
