//! Core domain types for toolscope.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::contract;
use crate::error::{Result, ToolScopeError};

/// One survey response: an open-ended field name → value mapping.
///
/// Field order is canonical (sorted), so serialising the same record twice
/// always yields the same bytes.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Maturity / Role / ToolStatus
// ---------------------------------------------------------------------------

/// Evaluation track a tool is enrolled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Maturity {
    Early,
    Advanced,
}

impl Maturity {
    pub const ALL: [Maturity; 2] = [Maturity::Early, Maturity::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Early => "early",
            Self::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for Maturity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Maturity {
    type Err = ToolScopeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "early" => Ok(Self::Early),
            "advanced" => Ok(Self::Advanced),
            _ => Err(ToolScopeError::UnknownMaturity(s.to_string())),
        }
    }
}

/// Survey source category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Innovator,
    DomainExpert,
    DirectUser,
    IndirectUser,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Innovator,
        Role::DomainExpert,
        Role::DirectUser,
        Role::IndirectUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Innovator => "innovator",
            Self::DomainExpert => "domain_expert",
            Self::DirectUser => "direct_user",
            Self::IndirectUser => "indirect_user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether data collection for a tool is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToolStatus {
    #[default]
    Active,
    Stopped,
}

impl std::fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => f.write_str("Active"),
            Self::Stopped => f.write_str("Stopped"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tool
// ---------------------------------------------------------------------------

/// A tool under evaluation, as registered through the primary feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub id: String,
    pub name: String,
    /// Maturity label exactly as submitted; see [`Tool::maturity`].
    #[serde(rename = "maturity")]
    pub maturity_label: String,
    pub coordinator_email: String,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_submitted: Option<DateTime<Utc>>,
}

impl Tool {
    /// Parse the submitted maturity label.
    pub fn maturity(&self) -> Result<Maturity> {
        self.maturity_label.parse()
    }
}

// ---------------------------------------------------------------------------
// Form schema
// ---------------------------------------------------------------------------

/// The `content` block of a form definition document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    /// Ordered question items.
    #[serde(default)]
    pub survey: Vec<serde_json::Value>,
    /// Named choice lists (array of `{list_name, ...}` or an object keyed by list name).
    #[serde(default)]
    pub choices: serde_json::Value,
}

/// A selectable answer of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub name: String,
    pub label: String,
}

/// Normalized description of one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDescriptor {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub choices: Vec<Choice>,
}

// ---------------------------------------------------------------------------
// Evaluation summary
// ---------------------------------------------------------------------------

/// Submission tally for a whole role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTally {
    pub role: Role,
    pub submitted: bool,
    pub count: usize,
}

impl RoleTally {
    pub fn from_count(role: Role, count: usize) -> Self {
        Self {
            role,
            submitted: count > 0,
            count,
        }
    }
}

/// Submission tally for one domain expert category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTally {
    pub category: String,
    pub submitted: bool,
    pub count: usize,
}

/// Correlated end-user responses plus the schema to render them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndUserSection {
    pub records: Vec<RawRecord>,
    pub questions: Vec<QuestionDescriptor>,
}

/// Render-ready evaluation state of a single tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolEvaluationSummary {
    pub tool_id: String,
    pub tool_name: String,
    pub maturity: Maturity,
    pub status: ToolStatus,
    pub innovators: Vec<RoleTally>,
    pub domain_experts: Vec<CategoryTally>,
    pub direct_users: EndUserSection,
    pub indirect_users: EndUserSection,
}

impl ToolEvaluationSummary {
    /// SHA-256 hex digest of the canonical JSON form.
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| ToolScopeError::parse(format!("failed to serialize summary: {e}")))?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

// ---------------------------------------------------------------------------
// Coordinators
// ---------------------------------------------------------------------------

/// A coordinator change for one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignmentEvent {
    pub tool_id: String,
    pub new_coordinator_email: String,
    pub submitted_at: DateTime<Utc>,
}

/// Per-coordinator workload, derived from the current assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorRecord {
    pub email: String,
    pub display_name: String,
    pub total_tools: usize,
    pub completed_tools: usize,
    pub completed_tool_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// StatusRow
// ---------------------------------------------------------------------------

/// One row of the pre-computed status sheet. Values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusRow {
    pub tool_id: String,
    pub status: String,
    pub current_step: String,
    pub report_sent: String,
    pub direct_closed_at: String,
    pub indirect_closed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatusRow {
    /// Read a row from a tabular export keyed by the sheet's column headers.
    ///
    /// Missing columns read as empty strings; a missing tool id is rejected.
    pub fn from_sheet_record(record: &BTreeMap<String, serde_json::Value>) -> Result<Self> {
        let cell = |column: &str| -> String {
            match record.get(column) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            }
        };

        let tool_id = cell(contract::SHEET_TOOL_ID_COLUMN).trim().to_string();
        if tool_id.is_empty() {
            return Err(ToolScopeError::validation(format!(
                "status sheet row has no '{}' value",
                contract::SHEET_TOOL_ID_COLUMN
            )));
        }

        Ok(Self {
            tool_id,
            status: cell(contract::SHEET_STATUS_COLUMN),
            current_step: cell(contract::SHEET_CURRENT_STEP_COLUMN),
            report_sent: cell(contract::SHEET_REPORT_SENT_COLUMN),
            direct_closed_at: cell(contract::SHEET_DIRECT_CLOSED_COLUMN),
            indirect_closed_at: cell(contract::SHEET_INDIRECT_CLOSED_COLUMN),
            updated_at: None,
        })
    }
}
