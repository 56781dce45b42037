//! Per-tool evaluation aggregation.
//!
//! [`Evaluator::aggregate`] routes a tool's sources by maturity, fetches every
//! source and both end-user form definitions concurrently, correlates each
//! collection against the tool id and assembles one
//! [`ToolEvaluationSummary`]. The status sheet lookup runs alongside the fetch
//! fan-out.
//!
//! Only an unknown tool and an unknown maturity fail the call. A source that
//! is unavailable, malformed or late contributes an empty collection.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use toolscope_shared::{
    EndUserSection, FetchConfig, FormDefinition, QuestionDescriptor, Result, Role, RoleTally,
    SourceCatalog, StatusRow, ToolEvaluationSummary, ToolScopeError, ToolStatus,
};
use toolscope_storage::Storage;
use toolscope_survey::{FetchResult, SurveyClient, fetch_all, fetch_forms};

use crate::directory::ToolDirectory;
use crate::identity::correlate;
use crate::routing::route_sources;
use crate::{expertise, schema, status};

/// Aggregation engine bound to one survey platform and source catalog.
pub struct Evaluator {
    client: SurveyClient,
    catalog: SourceCatalog,
    deadline: Duration,
    status_sheet: Option<Storage>,
}

impl Evaluator {
    pub fn new(config: &FetchConfig, catalog: SourceCatalog) -> Result<Self> {
        Ok(Self {
            client: SurveyClient::new(config)?,
            catalog,
            deadline: config.source_deadline,
            status_sheet: None,
        })
    }

    /// Attach the local status sheet used to classify tools.
    pub fn with_status_sheet(mut self, storage: Storage) -> Self {
        self.status_sheet = Some(storage);
        self
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub(crate) fn client(&self) -> &SurveyClient {
        &self.client
    }

    pub(crate) fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Fetch the registration feed and build the tool directory.
    ///
    /// Unlike evaluation sources, a failed registration feed is an error:
    /// without it there is nothing to aggregate.
    #[instrument(skip_all)]
    pub async fn load_directory(&self) -> Result<ToolDirectory> {
        let form_id = self.catalog.registration_form.trim();
        if form_id.is_empty() {
            return Err(ToolScopeError::config(
                "no registration form configured under [forms].registration",
            ));
        }

        let mut results = fetch_all(&self.client, [form_id], self.deadline).await;
        let records = match results.remove(form_id) {
            Some(FetchResult::Ok(records)) => records,
            Some(FetchResult::Empty) | None => Vec::new(),
            Some(FetchResult::Err(e)) => return Err(e),
        };

        let directory = ToolDirectory::from_records(&records, &self.catalog.registration_fields);
        info!(tools = directory.len(), "tool directory loaded");
        Ok(directory)
    }

    /// Build the evaluation summary of `tool_id`.
    #[instrument(skip_all, fields(tool_id = %tool_id))]
    pub async fn aggregate(
        &self,
        tool_id: &str,
        directory: &ToolDirectory,
    ) -> Result<ToolEvaluationSummary> {
        let tool = directory
            .get(tool_id)
            .ok_or_else(|| ToolScopeError::NotFound(format!("tool '{}'", tool_id.trim())))?;
        let route = route_sources(&self.catalog, &tool.maturity_label)?;

        let direct_form = route.form_id(Role::DirectUser);
        let indirect_form = route.form_id(Role::IndirectUser);

        let (collections, forms, status_row) = tokio::join!(
            fetch_all(&self.client, route.form_ids(), self.deadline),
            fetch_forms(&self.client, [direct_form, indirect_form], self.deadline),
            self.lookup_status(&tool.id),
        );

        let degraded = collections.values().filter(|r| r.is_err()).count();
        if degraded > 0 {
            warn!(degraded, "some sources contributed no records");
        }

        let records_of = |role: Role| {
            let form_id = route.form_id(role);
            let records = collections
                .get(form_id)
                .map(FetchResult::records)
                .unwrap_or(&[]);
            correlate(records, &tool.id, self.catalog.id_fields(role))
        };

        let innovator_records = records_of(Role::Innovator);
        let expert_records = records_of(Role::DomainExpert);
        let direct_records = records_of(Role::DirectUser);
        let indirect_records = records_of(Role::IndirectUser);

        let summary = ToolEvaluationSummary {
            tool_id: tool.id.clone(),
            tool_name: tool.name.clone(),
            maturity: route.maturity,
            status: status::classify(status_row.as_ref()),
            innovators: vec![RoleTally::from_count(Role::Innovator, innovator_records.len())],
            domain_experts: expertise::decode(&expert_records, route.maturity),
            direct_users: EndUserSection {
                records: direct_records,
                questions: questions_of(forms.get(direct_form).and_then(Option::as_ref)),
            },
            indirect_users: EndUserSection {
                records: indirect_records,
                questions: questions_of(forms.get(indirect_form).and_then(Option::as_ref)),
            },
        };

        info!(
            maturity = %summary.maturity,
            status = %summary.status,
            direct = summary.direct_users.records.len(),
            indirect = summary.indirect_users.records.len(),
            "evaluation aggregated"
        );
        Ok(summary)
    }

    /// Extract the question list of any form.
    #[instrument(skip_all, fields(form_id = %form_id))]
    pub async fn questions(&self, form_id: &str) -> Result<Vec<QuestionDescriptor>> {
        match self.client.fetch_form(form_id).await? {
            Some(form) => Ok(schema::extract_questions(&form)),
            None => Err(ToolScopeError::NotFound(format!("form '{form_id}'"))),
        }
    }

    /// Classified status of one tool from the status sheet.
    pub async fn status_of(&self, tool_id: &str) -> ToolStatus {
        status::classify(self.lookup_status(tool_id).await.as_ref())
    }

    /// Classify every tool of `directory` against the status sheet.
    #[instrument(skip_all)]
    pub async fn refresh_statuses(&self, directory: &mut ToolDirectory) -> Result<()> {
        let Some(storage) = &self.status_sheet else {
            return Ok(());
        };

        let rows: BTreeMap<String, StatusRow> = storage
            .list_status_rows()
            .await?
            .into_iter()
            .map(|row| (row.tool_id.clone(), row))
            .collect();

        let ids: Vec<String> = directory.tools().map(|t| t.id.clone()).collect();
        for id in ids {
            directory.apply_status(&id, status::classify(rows.get(&id)));
        }
        debug!(rows = rows.len(), "statuses refreshed");
        Ok(())
    }

    /// Status sheet row of `tool_id`; a failed lookup reads as no row.
    async fn lookup_status(&self, tool_id: &str) -> Option<StatusRow> {
        let storage = self.status_sheet.as_ref()?;
        match storage.get_status_row(tool_id).await {
            Ok(row) => row,
            Err(e) => {
                warn!(tool_id, error = %e, "status sheet lookup failed");
                None
            }
        }
    }
}

fn questions_of(form: Option<&FormDefinition>) -> Vec<QuestionDescriptor> {
    form.map(schema::extract_questions).unwrap_or_default()
}
