//! Concurrent fan-out over survey sources.
//!
//! Every distinct form id gets its own task. Tasks never depend on each other,
//! each one is bounded by the per-source deadline, and each result lands in
//! its own slot of a `BTreeMap`, so the merged output is ordered by form id no
//! matter which source settled first. Dropping the returned future aborts all
//! outstanding tasks.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use toolscope_shared::{FormDefinition, RawRecord, ToolScopeError};

use crate::client::SurveyClient;

/// Outcome of fetching one source.
#[derive(Debug)]
pub enum FetchResult {
    /// At least one record.
    Ok(Vec<RawRecord>),
    /// Not found, unconfigured, or an empty payload.
    Empty,
    /// Unavailable, timed out, or malformed. Callers treat this like `Empty`.
    Err(ToolScopeError),
}

impl FetchResult {
    /// The fetched records; empty for `Empty` and `Err`.
    pub fn records(&self) -> &[RawRecord] {
        match self {
            Self::Ok(records) => records,
            Self::Empty | Self::Err(_) => &[],
        }
    }

    /// Take the fetched records; empty for `Empty` and `Err`.
    pub fn into_records(self) -> Vec<RawRecord> {
        match self {
            Self::Ok(records) => records,
            Self::Empty | Self::Err(_) => Vec::new(),
        }
    }

    pub fn is_err(&self) -> bool {
        matches!(self, Self::Err(_))
    }
}

/// Fetch the submissions of every form in `form_ids` concurrently.
///
/// Duplicate ids are fetched once. Blank ids (unconfigured sources) resolve to
/// [`FetchResult::Empty`] without a request. A source that exceeds `deadline`
/// resolves to [`FetchResult::Err`] with [`ToolScopeError::SourceUnavailable`].
#[instrument(skip_all)]
pub async fn fetch_all<I, S>(
    client: &SurveyClient,
    form_ids: I,
    deadline: Duration,
) -> BTreeMap<String, FetchResult>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let (requested, blank) = split_form_ids(form_ids);

    info!(
        sources = requested.len(),
        deadline_ms = deadline.as_millis() as u64,
        "fetching survey sources"
    );

    let settled = fan_out(requested, deadline, |form_id| {
        let client = client.clone();
        async move { client.fetch_submissions(&form_id).await }
    })
    .await;

    let mut results: BTreeMap<String, FetchResult> = settled
        .into_iter()
        .map(|(form_id, outcome)| {
            let result = outcome.unwrap_or_else(|reason| {
                FetchResult::Err(ToolScopeError::unavailable(&form_id, reason))
            });
            match &result {
                FetchResult::Ok(records) => {
                    debug!(%form_id, records = records.len(), "source fetched")
                }
                FetchResult::Empty => debug!(%form_id, "source returned no records"),
                FetchResult::Err(e) if e.is_recoverable() => {
                    warn!(%form_id, error = %e, "source degraded to empty")
                }
                FetchResult::Err(e) => {
                    error!(%form_id, error = %e, "source misconfigured, treating as empty")
                }
            }
            (form_id, result)
        })
        .collect();

    for form_id in blank {
        debug!("source not configured, treating as empty");
        results.insert(form_id, FetchResult::Empty);
    }

    results
}

/// Fetch the definitions of every form in `form_ids` concurrently.
///
/// A definition that is missing, unreachable, malformed or late resolves to
/// `None`; callers render such a source without a question list.
#[instrument(skip_all)]
pub async fn fetch_forms<I, S>(
    client: &SurveyClient,
    form_ids: I,
    deadline: Duration,
) -> BTreeMap<String, Option<FormDefinition>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let (requested, blank) = split_form_ids(form_ids);

    let settled = fan_out(requested, deadline, |form_id| {
        let client = client.clone();
        async move { client.fetch_form(&form_id).await }
    })
    .await;

    let mut results: BTreeMap<String, Option<FormDefinition>> = settled
        .into_iter()
        .map(|(form_id, outcome)| {
            let form = match outcome {
                Ok(Ok(form)) => form,
                Ok(Err(e)) => {
                    warn!(%form_id, error = %e, "form definition unavailable");
                    None
                }
                Err(reason) => {
                    warn!(%form_id, %reason, "form definition unavailable");
                    None
                }
            };
            (form_id, form)
        })
        .collect();

    for form_id in blank {
        results.insert(form_id, None);
    }

    results
}

/// Deduplicate form ids, separating blank (unconfigured) ones.
fn split_form_ids<I, S>(form_ids: I) -> (BTreeSet<String>, BTreeSet<String>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    form_ids
        .into_iter()
        .map(|id| id.as_ref().to_string())
        .partition(|id| !id.trim().is_empty())
}

/// Run `job` once per form id, each in its own task under `deadline`.
///
/// Every requested id gets a slot: `Err(reason)` when its task timed out,
/// panicked, or was cancelled.
async fn fan_out<T, F, Fut>(
    form_ids: BTreeSet<String>,
    deadline: Duration,
    job: F,
) -> BTreeMap<String, Result<T, String>>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut tasks = JoinSet::new();

    for form_id in &form_ids {
        let work = job(form_id.clone());
        let form_id = form_id.clone();
        tasks.spawn(async move {
            let outcome = tokio::time::timeout(deadline, work)
                .await
                .map_err(|_| format!("no response within {deadline:?}"));
            (form_id, outcome)
        });
    }

    let mut settled = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((form_id, outcome)) => {
                settled.insert(form_id, outcome);
            }
            Err(e) => warn!(error = %e, "fetch task did not complete"),
        }
    }

    for form_id in form_ids {
        settled
            .entry(form_id)
            .or_insert_with(|| Err("fetch task did not complete".to_string()));
    }

    settled
}
