//! The tool population, built from the registration feed.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use toolscope_shared::{RawRecord, RegistrationFields, Tool, ToolStatus};

use crate::identity::{field_text, field_timestamp, resolve_id};

/// All registered tools, keyed and iterated by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolDirectory {
    tools: BTreeMap<String, Tool>,
}

impl ToolDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the directory from registration submissions.
    ///
    /// Records without a tool id are skipped. When a tool was registered more
    /// than once, the latest submission wins.
    pub fn from_records(records: &[RawRecord], fields: &RegistrationFields) -> Self {
        let mut directory = Self::new();
        let mut skipped = 0usize;

        for record in records {
            let id = resolve_id(record, &fields.id);
            if id.is_empty() {
                skipped += 1;
                continue;
            }

            directory.insert(Tool {
                name: field_text(record, &fields.name).unwrap_or_default(),
                maturity_label: field_text(record, &fields.maturity).unwrap_or_default(),
                coordinator_email: field_text(record, &fields.coordinator_email)
                    .unwrap_or_default(),
                status: ToolStatus::Active,
                date_submitted: field_timestamp(record, &fields.submitted_at),
                id,
            });
        }

        if skipped > 0 {
            warn!(skipped, "registration records without a tool id");
        }
        debug!(tools = directory.len(), "tool directory built");
        directory
    }

    /// Add a tool, keeping whichever registration of its id is newer.
    ///
    /// A registration with a timestamp beats one without; between two
    /// undated registrations the later insert wins.
    pub fn insert(&mut self, tool: Tool) {
        match self.tools.get(&tool.id) {
            Some(existing) if existing.date_submitted > tool.date_submitted => {}
            _ => {
                self.tools.insert(tool.id.clone(), tool);
            }
        }
    }

    pub fn get(&self, tool_id: &str) -> Option<&Tool> {
        self.tools.get(tool_id.trim())
    }

    /// Tools in id order.
    pub fn tools(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Overwrite coordinators with the reconstructed assignments.
    pub fn apply_assignments(&mut self, assignments: &BTreeMap<String, String>) {
        for (tool_id, email) in assignments {
            if let Some(tool) = self.tools.get_mut(tool_id) {
                tool.coordinator_email = email.clone();
            }
        }
    }

    /// Overwrite the displayed status of one tool.
    pub fn apply_status(&mut self, tool_id: &str, status: ToolStatus) {
        if let Some(tool) = self.tools.get_mut(tool_id) {
            tool.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(value: serde_json::Value) -> RawRecord {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn builds_tools_from_registrations() {
        let records = vec![
            registration(serde_json::json!({
                "group_tool/tool_id": "T-2",
                "group_tool/tool_name": "SafeBirth",
                "group_tool/tool_maturity": "advanced",
                "group_coordinator/coordinator_email": "a.b@example.org",
                "_submission_time": "2024-02-01T09:00:00"
            })),
            registration(serde_json::json!({
                "tool_id": "T-1",
                "group_tool/tool_name": "MamaCare",
                "group_tool/tool_maturity": "Early"
            })),
            registration(serde_json::json!({"group_tool/tool_name": "No id"})),
        ];

        let directory = ToolDirectory::from_records(&records, &RegistrationFields::default());

        assert_eq!(directory.len(), 2);
        let ids: Vec<_> = directory.tools().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["T-1", "T-2"]);

        let t2 = directory.get("T-2").unwrap();
        assert_eq!(t2.name, "SafeBirth");
        assert_eq!(t2.coordinator_email, "a.b@example.org");
        assert!(t2.date_submitted.is_some());
        assert_eq!(t2.status, ToolStatus::Active);

        let t1 = directory.get(" T-1 ").unwrap();
        assert_eq!(t1.maturity_label, "Early");
        assert_eq!(t1.coordinator_email, "");
    }

    #[test]
    fn latest_registration_wins() {
        let fields = RegistrationFields::default();
        let older = registration(serde_json::json!({
            "tool_id": "T-1",
            "group_tool/tool_name": "Old name",
            "_submission_time": "2024-01-01T00:00:00"
        }));
        let newer = registration(serde_json::json!({
            "tool_id": "T-1",
            "group_tool/tool_name": "New name",
            "_submission_time": "2024-06-01T00:00:00"
        }));

        let forward = ToolDirectory::from_records(&[older.clone(), newer.clone()], &fields);
        let backward = ToolDirectory::from_records(&[newer, older], &fields);

        assert_eq!(forward.get("T-1").unwrap().name, "New name");
        assert_eq!(forward, backward);
    }

    #[test]
    fn overrides_apply_to_known_tools_only() {
        let records = vec![registration(serde_json::json!({
            "tool_id": "T-1",
            "group_coordinator/coordinator_email": "first@example.org"
        }))];
        let mut directory = ToolDirectory::from_records(&records, &RegistrationFields::default());

        let assignments = BTreeMap::from([
            ("T-1".to_string(), "second@example.org".to_string()),
            ("T-9".to_string(), "ghost@example.org".to_string()),
        ]);
        directory.apply_assignments(&assignments);
        directory.apply_status("T-1", ToolStatus::Stopped);
        directory.apply_status("T-9", ToolStatus::Stopped);

        let tool = directory.get("T-1").unwrap();
        assert_eq!(tool.coordinator_email, "second@example.org");
        assert_eq!(tool.status, ToolStatus::Stopped);
        assert!(directory.get("T-9").is_none());
    }
}
