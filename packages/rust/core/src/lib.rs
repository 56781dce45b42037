//! Evaluation correlation engine for toolscope.
//!
//! This crate turns raw survey submissions into per-tool evaluation
//! summaries (`Evaluator::aggregate`) and per-coordinator workload
//! (`Evaluator::coordinator_roster`). The pure building blocks (identifier
//! resolution, routing, expertise decoding, schema extraction, status
//! classification) are exposed for direct use and testing.

pub mod aggregate;
pub mod assignment;
pub mod directory;
pub mod expertise;
pub mod identity;
pub mod routing;
pub mod schema;
pub mod status;

pub use aggregate::Evaluator;
pub use assignment::{
    Roster, build_roster, completion_map, display_name_from_email, event_from_record, reconstruct,
};
pub use directory::ToolDirectory;
pub use identity::{correlate, resolve_id};
pub use routing::{SourceRoute, route_sources};
pub use schema::extract_questions;
pub use status::classify;
