//! Shared types, error model, and configuration for toolscope.
//!
//! This crate is the foundation depended on by all other toolscope crates.
//! It provides:
//! - [`ToolScopeError`]: the unified error type
//! - Domain types ([`Tool`], [`ToolEvaluationSummary`], [`CoordinatorRecord`], ...)
//! - Configuration ([`AppConfig`], [`SourceCatalog`], [`FetchConfig`], config loading)
//! - [`contract`]: field names and literals fixed by the upstream forms

pub mod config;
pub mod contract;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CoordinatorEntry, FetchConfig, FieldsConfig, FormPair, FormsConfig,
    ReassignmentFields, RegistrationFields, SourceCatalog, StatusSheetConfig, SurveyConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_survey_token,
};
pub use error::{Result, ToolScopeError};
pub use types::{
    CategoryTally, Choice, CoordinatorRecord, EndUserSection, FormDefinition, Maturity,
    QuestionDescriptor, RawRecord, ReassignmentEvent, Role, RoleTally, StatusRow, Tool,
    ToolEvaluationSummary, ToolStatus,
};
