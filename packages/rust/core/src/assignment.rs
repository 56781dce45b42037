//! Coordinator assignment reconstruction and workload roster.
//!
//! The current coordinator of a tool is not stored anywhere. It is the
//! registration's coordinator with every reassignment event replayed on top,
//! oldest first, last write wins. The roster then folds per-tool completion
//! into one record per current coordinator.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use toolscope_shared::{
    CoordinatorRecord, Maturity, RawRecord, ReassignmentEvent, ReassignmentFields, Role,
    SourceCatalog, contract,
};
use toolscope_survey::{FetchResult, fetch_all};

use crate::aggregate::Evaluator;
use crate::directory::ToolDirectory;
use crate::identity::{field_text, field_timestamp, matching, resolve_id};

/// Current assignments plus the per-coordinator workload derived from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    /// Tool id → current coordinator email.
    pub assignments: BTreeMap<String, String>,
    /// One record per coordinator, ordered by email.
    pub coordinators: Vec<CoordinatorRecord>,
}

/// Read a reassignment event; `None` when a required field is missing.
pub fn event_from_record(
    record: &RawRecord,
    fields: &ReassignmentFields,
) -> Option<ReassignmentEvent> {
    let tool_id = resolve_id(record, &fields.id);
    let email = field_text(record, &fields.new_coordinator_email);
    let submitted_at = field_timestamp(record, &fields.submitted_at);

    match (tool_id.is_empty(), email, submitted_at) {
        (false, Some(new_coordinator_email), Some(submitted_at)) => Some(ReassignmentEvent {
            tool_id,
            new_coordinator_email,
            submitted_at,
        }),
        _ => {
            warn!(%tool_id, "skipping incomplete reassignment record");
            None
        }
    }
}

/// Replay `events` over the registered coordinators.
///
/// Tools without a registered coordinator start as
/// [`contract::UNASSIGNED_COORDINATOR`]. Events are applied in
/// `(submitted_at, tool_id, email)` order so that the result does not depend
/// on input order. Events for unregistered tools are ignored.
pub fn reconstruct(
    directory: &ToolDirectory,
    events: &[ReassignmentEvent],
) -> BTreeMap<String, String> {
    let mut assignments: BTreeMap<String, String> = directory
        .tools()
        .map(|tool| {
            let email = tool.coordinator_email.trim();
            let email = if email.is_empty() {
                contract::UNASSIGNED_COORDINATOR
            } else {
                email
            };
            (tool.id.clone(), email.to_string())
        })
        .collect();

    let mut ordered: Vec<&ReassignmentEvent> = events.iter().collect();
    ordered.sort_by(|a, b| {
        (a.submitted_at, &a.tool_id, &a.new_coordinator_email).cmp(&(
            b.submitted_at,
            &b.tool_id,
            &b.new_coordinator_email,
        ))
    });

    for event in ordered {
        match assignments.get_mut(&event.tool_id) {
            Some(current) => current.clone_from(&event.new_coordinator_email),
            None => debug!(tool_id = %event.tool_id, "reassignment for unregistered tool"),
        }
    }

    assignments
}

/// Whether each tool has at least one direct user and one indirect user
/// submission on the forms of its maturity.
///
/// Tools whose maturity does not parse are never complete.
pub fn completion_map(
    directory: &ToolDirectory,
    collections: &BTreeMap<String, FetchResult>,
    catalog: &SourceCatalog,
) -> BTreeMap<String, bool> {
    let has_submission = |tool_id: &str, role: Role, maturity: Maturity| {
        let records = collections
            .get(catalog.form_id(role, maturity))
            .map(FetchResult::records)
            .unwrap_or(&[]);
        matching(records, tool_id, catalog.id_fields(role))
            .next()
            .is_some()
    };

    directory
        .tools()
        .map(|tool| {
            let complete = match tool.maturity() {
                Ok(maturity) => {
                    has_submission(&tool.id, Role::DirectUser, maturity)
                        && has_submission(&tool.id, Role::IndirectUser, maturity)
                }
                Err(_) => false,
            };
            (tool.id.clone(), complete)
        })
        .collect()
}

/// Fold assignments and completion into one record per coordinator.
///
/// Display names come from `known_names` when present, otherwise from the
/// email address.
pub fn build_roster(
    directory: &ToolDirectory,
    assignments: &BTreeMap<String, String>,
    completion: &BTreeMap<String, bool>,
    known_names: &BTreeMap<String, String>,
) -> Vec<CoordinatorRecord> {
    let mut roster: BTreeMap<&str, CoordinatorRecord> = BTreeMap::new();

    for tool in directory.tools() {
        let email = assignments
            .get(&tool.id)
            .map(String::as_str)
            .unwrap_or(contract::UNASSIGNED_COORDINATOR);

        let record = roster.entry(email).or_insert_with(|| CoordinatorRecord {
            email: email.to_string(),
            display_name: known_names
                .get(email)
                .cloned()
                .unwrap_or_else(|| display_name_from_email(email)),
            total_tools: 0,
            completed_tools: 0,
            completed_tool_ids: Vec::new(),
        });

        record.total_tools += 1;
        if completion.get(&tool.id).copied().unwrap_or(false) {
            record.completed_tools += 1;
            record.completed_tool_ids.push(tool.id.clone());
        }
    }

    roster.into_values().collect()
}

/// Derive a display name from an email's local part.
///
/// Tokens split on `.` and `_` are title-cased and the last token moves to
/// the front: `jane.doe@x.org` becomes `Doe Jane`.
pub fn display_name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut tokens: Vec<String> = local
        .split(['.', '_'])
        .filter(|t| !t.is_empty())
        .map(title_case)
        .collect();

    if tokens.is_empty() {
        return email.to_string();
    }
    tokens.rotate_right(1);
    tokens.join(" ")
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

impl Evaluator {
    /// Reconstruct current assignments and build the coordinator roster.
    ///
    /// The reassignment feed and the end-user forms of both maturity levels
    /// are fetched concurrently. A failed reassignment feed means no events;
    /// a failed end-user form means no completions on it.
    #[instrument(skip_all, fields(tools = directory.len()))]
    pub async fn coordinator_roster(
        &self,
        directory: &ToolDirectory,
        known_names: &BTreeMap<String, String>,
    ) -> Roster {
        let catalog = self.catalog();
        let mut form_ids = vec![catalog.reassignment_form.clone()];
        for maturity in Maturity::ALL {
            form_ids.push(catalog.form_id(Role::DirectUser, maturity).to_string());
            form_ids.push(catalog.form_id(Role::IndirectUser, maturity).to_string());
        }

        let collections = fetch_all(self.client(), &form_ids, self.deadline()).await;

        let events: Vec<ReassignmentEvent> = collections
            .get(&catalog.reassignment_form)
            .map(FetchResult::records)
            .unwrap_or(&[])
            .iter()
            .filter_map(|record| event_from_record(record, &catalog.reassignment_fields))
            .collect();

        let assignments = reconstruct(directory, &events);
        let completion = completion_map(directory, &collections, catalog);
        let coordinators = build_roster(directory, &assignments, &completion, known_names);

        info!(
            events = events.len(),
            coordinators = coordinators.len(),
            "coordinator roster built"
        );
        Roster {
            assignments,
            coordinators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use toolscope_shared::{AppConfig, FetchConfig, RegistrationFields};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(value: serde_json::Value) -> RawRecord {
        value.as_object().cloned().expect("object")
    }

    fn directory() -> ToolDirectory {
        let records = vec![
            record(serde_json::json!({
                "tool_id": "T-1",
                "group_tool/tool_maturity": "early",
                "group_coordinator/coordinator_email": "jane.doe@example.org"
            })),
            record(serde_json::json!({
                "tool_id": "T-2",
                "group_tool/tool_maturity": "advanced",
                "group_coordinator/coordinator_email": "jane.doe@example.org"
            })),
            record(serde_json::json!({
                "tool_id": "T-3",
                "group_tool/tool_maturity": "pilot"
            })),
        ];
        ToolDirectory::from_records(&records, &RegistrationFields::default())
    }

    fn event(tool_id: &str, email: &str, hour: u32) -> ReassignmentEvent {
        ReassignmentEvent {
            tool_id: tool_id.into(),
            new_coordinator_email: email.into(),
            submitted_at: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn replay_is_last_write_wins() {
        let events = vec![
            event("T-1", "late@example.org", 12),
            event("T-1", "early@example.org", 9),
            event("T-3", "first.owner@example.org", 10),
            event("T-9", "ghost@example.org", 11),
        ];

        let assignments = reconstruct(&directory(), &events);

        assert_eq!(assignments["T-1"], "late@example.org");
        assert_eq!(assignments["T-2"], "jane.doe@example.org");
        assert_eq!(assignments["T-3"], "first.owner@example.org");
        assert!(!assignments.contains_key("T-9"));
    }

    #[test]
    fn replay_is_order_independent() {
        let events = vec![
            event("T-1", "a@example.org", 9),
            event("T-1", "b@example.org", 9),
            event("T-2", "c@example.org", 8),
            event("T-1", "d@example.org", 7),
            event("T-2", "c@example.org", 8),
        ];
        let directory = directory();
        let expected = reconstruct(&directory, &events);

        let mut reversed = events.clone();
        reversed.reverse();
        let mut rotated = events.clone();
        rotated.rotate_left(2);

        assert_eq!(reconstruct(&directory, &reversed), expected);
        assert_eq!(reconstruct(&directory, &rotated), expected);
        assert_eq!(expected["T-1"], "b@example.org");
    }

    #[test]
    fn unassigned_sentinel() {
        let assignments = reconstruct(&directory(), &[]);
        assert_eq!(assignments["T-3"], contract::UNASSIGNED_COORDINATOR);
    }

    #[test]
    fn incomplete_events_are_skipped() {
        let fields = ReassignmentFields::default();

        let ok = record(serde_json::json!({
            "group_reassign/tool_id": "T-1",
            "group_reassign/new_coordinator_email": "x@example.org",
            "_submission_time": "2024-05-01T10:00:00"
        }));
        let parsed = event_from_record(&ok, &fields).expect("event");
        assert_eq!(parsed.tool_id, "T-1");
        assert_eq!(parsed.new_coordinator_email, "x@example.org");

        let no_time = record(serde_json::json!({
            "tool_id": "T-1",
            "group_reassign/new_coordinator_email": "x@example.org",
            "_submission_time": "sometime"
        }));
        assert!(event_from_record(&no_time, &fields).is_none());

        let no_email = record(serde_json::json!({
            "tool_id": "T-1",
            "_submission_time": "2024-05-01T10:00:00"
        }));
        assert!(event_from_record(&no_email, &fields).is_none());
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name_from_email("jane.doe@example.org"), "Doe Jane");
        assert_eq!(display_name_from_email("mary_ann.SMITH@x.org"), "Smith Mary Ann");
        assert_eq!(display_name_from_email("admin@x.org"), "Admin");
        assert_eq!(display_name_from_email("Unassigned"), "Unassigned");
        assert_eq!(display_name_from_email("@x.org"), "@x.org");
    }

    #[test]
    fn roster_counts_completed_tools() {
        let directory = directory();
        let assignments = reconstruct(&directory, &[event("T-3", "jane.doe@example.org", 1)]);
        let completion = BTreeMap::from([
            ("T-1".to_string(), true),
            ("T-2".to_string(), false),
            ("T-3".to_string(), true),
        ]);
        let names = BTreeMap::from([("jane.doe@example.org".to_string(), "Jane D.".to_string())]);

        let roster = build_roster(&directory, &assignments, &completion, &names);

        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].display_name, "Jane D.");
        assert_eq!(roster[0].total_tools, 3);
        assert_eq!(roster[0].completed_tools, 2);
        assert_eq!(roster[0].completed_tool_ids, ["T-1", "T-3"]);
    }

    fn live_evaluator(server: &MockServer) -> Evaluator {
        let mut config = AppConfig::default();
        config.forms.reassignment = "aMove".into();
        config.forms.direct_user.early = "aDirE".into();
        config.forms.direct_user.advanced = "aDirA".into();
        config.forms.indirect_user.early = "aIndE".into();
        config.forms.indirect_user.advanced = "aIndA".into();

        let fetch = FetchConfig {
            base_url: server.uri(),
            api_token: None,
            request_timeout: Duration::from_secs(10),
            source_deadline: Duration::from_secs(10),
        };
        Evaluator::new(&fetch, SourceCatalog::from(&config)).expect("evaluator")
    }

    #[tokio::test]
    async fn roster_from_live_sources() {
        let server = MockServer::start().await;

        let mount = |form_id: &'static str, results: serde_json::Value| {
            Mock::given(method("GET"))
                .and(path(format!("/api/v2/assets/{form_id}/data/")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({"results": results})),
                )
        };

        mount(
            "aMove",
            serde_json::json!([
                {"tool_id": "T-2", "group_reassign/new_coordinator_email": "sam.lee@example.org",
                 "_submission_time": "2024-03-01T08:00:00"},
                {"tool_id": "T-2"}
            ]),
        )
        .mount(&server)
        .await;
        mount("aDirE", serde_json::json!([{"tool_id": "T-1"}]))
            .mount(&server)
            .await;
        mount("aIndE", serde_json::json!([{"tool_id": "T-1"}]))
            .mount(&server)
            .await;
        mount("aDirA", serde_json::json!([{"tool_id": "T-2"}]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/assets/aIndA/data/"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let roster = live_evaluator(&server)
            .coordinator_roster(&directory(), &BTreeMap::new())
            .await;

        assert_eq!(roster.assignments["T-2"], "sam.lee@example.org");

        let emails: Vec<_> = roster.coordinators.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(
            emails,
            ["Unassigned", "jane.doe@example.org", "sam.lee@example.org"]
        );

        let jane = &roster.coordinators[1];
        assert_eq!(jane.display_name, "Doe Jane");
        assert_eq!(jane.completed_tool_ids, ["T-1"]);

        let sam = &roster.coordinators[2];
        assert_eq!(sam.total_tools, 1);
        assert_eq!(sam.completed_tools, 0);
    }

    #[tokio::test]
    async fn failed_reassignment_feed_keeps_registered_coordinators() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/assets/aMove/data/"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        for form_id in ["aDirE", "aIndE"] {
            Mock::given(method("GET"))
                .and(path(format!("/api/v2/assets/{form_id}/data/")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({"results": [{"tool_id": "T-1"}]})),
                )
                .mount(&server)
                .await;
        }

        let roster = live_evaluator(&server)
            .coordinator_roster(&directory(), &BTreeMap::new())
            .await;

        assert_eq!(roster.assignments["T-1"], "jane.doe@example.org");
        assert_eq!(roster.assignments["T-2"], "jane.doe@example.org");
        assert_eq!(roster.assignments["T-3"], contract::UNASSIGNED_COORDINATOR);

        let emails: Vec<_> = roster.coordinators.iter().map(|c| c.email.as_str()).collect();
        assert_eq!(emails, ["Unassigned", "jane.doe@example.org"]);

        let jane = &roster.coordinators[1];
        assert_eq!(jane.total_tools, 2);
        assert_eq!(jane.completed_tool_ids, ["T-1"]);
    }
}
