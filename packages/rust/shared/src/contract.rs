//! Fixed upstream contracts of the survey platform and the status sheet.
//!
//! These tables mirror field names and literal values that the upstream forms
//! and the status automation emit. They must match byte for byte; changing one
//! silently breaks correlation or status classification.

use crate::types::{Maturity, Role};

/// Field names starting with this prefix are system fields, not questions.
pub const RESERVED_FIELD_PREFIX: &str = "_";

/// Submission timestamp attached by the platform to every response record.
pub const SUBMISSION_TIME_FIELD: &str = "_submission_time";

/// Coordinator value for tools nobody has been assigned to.
pub const UNASSIGNED_COORDINATOR: &str = "Unassigned";

// ---------------------------------------------------------------------------
// Identifier candidate fields
// ---------------------------------------------------------------------------

/// Innovator form: the tool id sits in the intro group on newer form versions.
pub const INNOVATOR_ID_FIELDS: &[&str] = &[
    "group_intro/tool_id",
    "tool_id",
    "group_innovator/tool_id",
];

/// Domain expert form.
pub const DOMAIN_EXPERT_ID_FIELDS: &[&str] = &[
    "group_expert/tool_id",
    "group_intro/tool_id",
    "tool_id",
];

/// Direct user form.
pub const DIRECT_USER_ID_FIELDS: &[&str] = &[
    "group_direct_user/tool_id",
    "group_user/tool_id",
    "group_intro/tool_id",
    "tool_id",
];

/// Indirect user form.
pub const INDIRECT_USER_ID_FIELDS: &[&str] = &[
    "group_indirect_user/tool_id",
    "group_beneficiary/tool_id",
    "group_intro/tool_id",
    "tool_id",
];

/// Ordered identifier candidates for a role's submissions.
pub fn id_fields(role: Role) -> &'static [&'static str] {
    match role {
        Role::Innovator => INNOVATOR_ID_FIELDS,
        Role::DomainExpert => DOMAIN_EXPERT_ID_FIELDS,
        Role::DirectUser => DIRECT_USER_ID_FIELDS,
        Role::IndirectUser => INDIRECT_USER_ID_FIELDS,
    }
}

/// Tool registration feed.
pub const REGISTRATION_ID_FIELDS: &[&str] = &["group_tool/tool_id", "tool_id"];
pub const REGISTRATION_NAME_FIELD: &str = "group_tool/tool_name";
pub const REGISTRATION_MATURITY_FIELD: &str = "group_tool/tool_maturity";
pub const REGISTRATION_COORDINATOR_FIELD: &str = "group_coordinator/coordinator_email";

/// Coordinator reassignment feed.
pub const REASSIGNMENT_ID_FIELDS: &[&str] = &["group_reassign/tool_id", "tool_id"];
pub const REASSIGNMENT_EMAIL_FIELD: &str = "group_reassign/new_coordinator_email";

// ---------------------------------------------------------------------------
// Domain expertise taxonomy
// ---------------------------------------------------------------------------

/// Free-text expertise codes on the early-stage domain expert form.
pub const EARLY_EXPERTISE_FIELD: &str = "group_expert/expertise_early";

/// Free-text expertise codes on the advanced domain expert form.
pub const ADVANCED_EXPERTISE_FIELD: &str = "group_expert/expertise_advanced";

/// Complete category list for early-stage tools, in display order.
pub const EARLY_CATEGORIES: &[&str] = &[
    "Gender Equality and Social Inclusion",
    "ICT",
    "Data Protection and Privacy",
    "Clinical Practice",
    "Public Health",
];

/// Complete category list for advanced tools, in display order.
pub const ADVANCED_CATEGORIES: &[&str] = &[
    "Gender Equality and Social Inclusion",
    "ICT",
    "Data Protection and Privacy",
    "Clinical Practice",
    "Public Health",
    "Health Economics",
    "Regulatory Affairs",
    "Implementation Science",
];

/// Expertise code → category, early-stage forms.
pub const EARLY_EXPERTISE_CODES: &[(&str, &str)] = &[
    ("gesi", "Gender Equality and Social Inclusion"),
    ("ict", "ICT"),
    ("dpp", "Data Protection and Privacy"),
    ("clinical", "Clinical Practice"),
    ("ph", "Public Health"),
];

/// Expertise code → category, advanced forms.
pub const ADVANCED_EXPERTISE_CODES: &[(&str, &str)] = &[
    ("gesi", "Gender Equality and Social Inclusion"),
    ("ict", "ICT"),
    ("dpp", "Data Protection and Privacy"),
    ("clinical", "Clinical Practice"),
    ("ph", "Public Health"),
    ("econ", "Health Economics"),
    ("reg", "Regulatory Affairs"),
    ("impl", "Implementation Science"),
];

/// The expertise field read for a maturity level.
pub fn expertise_field(maturity: Maturity) -> &'static str {
    match maturity {
        Maturity::Early => EARLY_EXPERTISE_FIELD,
        Maturity::Advanced => ADVANCED_EXPERTISE_FIELD,
    }
}

/// The full category taxonomy for a maturity level.
pub fn expertise_categories(maturity: Maturity) -> &'static [&'static str] {
    match maturity {
        Maturity::Early => EARLY_CATEGORIES,
        Maturity::Advanced => ADVANCED_CATEGORIES,
    }
}

/// Map a lower-cased expertise code to its category, if known.
pub fn expertise_category(maturity: Maturity, code: &str) -> Option<&'static str> {
    let table = match maturity {
        Maturity::Early => EARLY_EXPERTISE_CODES,
        Maturity::Advanced => ADVANCED_EXPERTISE_CODES,
    };
    table
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, category)| *category)
}

// ---------------------------------------------------------------------------
// Status sheet
// ---------------------------------------------------------------------------

pub const SHEET_TOOL_ID_COLUMN: &str = "Tool ID";
pub const SHEET_STATUS_COLUMN: &str = "Status";
pub const SHEET_CURRENT_STEP_COLUMN: &str = "Current Step";
pub const SHEET_REPORT_SENT_COLUMN: &str = "Report Sent";
pub const SHEET_DIRECT_CLOSED_COLUMN: &str = "Direct Users Survey Closed";
pub const SHEET_INDIRECT_CLOSED_COLUMN: &str = "Indirect Users Survey Closed";

/// Value of the status column once evaluation work is finished.
pub const STATUS_COMPLETED: &str = "Completed";

/// Value of the workflow-stage column after the report went out.
pub const STEP_REPORT_SENT: &str = "Report Sent";

/// Glyph the automation writes into the report-sent column.
pub const REPORT_SENT_MARK: &str = "\u{2713}";
