//! HTTP client for the survey platform's asset endpoints.
//!
//! Each form is an "asset". Two endpoints are consumed:
//! - `api/v2/assets/<form>/data/`: paginated response records (`results`, `next`)
//! - `api/v2/assets/<form>/`: the form definition (`content.survey`, `content.choices`)

use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use toolscope_shared::{FetchConfig, FormDefinition, RawRecord, Result, ToolScopeError};

use crate::fetch::FetchResult;

/// User-Agent string for survey requests.
const USER_AGENT: &str = concat!("toolscope/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

/// Upper bound on `next` links followed for one form.
const MAX_PAGES: usize = 200;

/// Typed client over the survey platform REST API.
///
/// Cloning is cheap: the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct SurveyClient {
    client: Client,
    base_url: Url,
}

/// One page of the submissions endpoint.
#[derive(Debug, Deserialize)]
struct SubmissionPage {
    #[serde(default)]
    results: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    next: Option<String>,
}

/// The form definition endpoint's document.
#[derive(Debug, Deserialize)]
struct FormDocument {
    #[serde(default)]
    content: FormDefinition,
}

impl SurveyClient {
    /// Build a client from the runtime fetch configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.base_url)?;

        let mut headers = header::HeaderMap::new();
        if let Some(token) = &config.api_token {
            let mut value = header::HeaderValue::from_str(&format!("Token {token}"))
                .map_err(|e| ToolScopeError::config(format!("invalid API token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ToolScopeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// The normalized base URL (always ends with `/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of the first submissions page of `form_id`.
    pub fn submissions_url(&self, form_id: &str) -> Result<Url> {
        self.asset_url(form_id, "data/")
    }

    /// URL of the definition document of `form_id`.
    pub fn form_url(&self, form_id: &str) -> Result<Url> {
        self.asset_url(form_id, "")
    }

    fn asset_url(&self, form_id: &str, suffix: &str) -> Result<Url> {
        validate_form_id(form_id)?;
        let mut url = self
            .base_url
            .join(&format!("api/v2/assets/{form_id}/{suffix}"))
            .map_err(|e| ToolScopeError::validation(format!("bad asset URL for {form_id}: {e}")))?;
        url.query_pairs_mut().append_pair("format", "json");
        Ok(url)
    }

    /// Fetch every submission of `form_id`, following pagination.
    ///
    /// Never fails: "not found" and empty payloads become [`FetchResult::Empty`],
    /// everything else that goes wrong becomes [`FetchResult::Err`].
    #[instrument(skip(self))]
    pub async fn fetch_submissions(&self, form_id: &str) -> FetchResult {
        match self.try_fetch_submissions(form_id).await {
            Ok(records) if records.is_empty() => FetchResult::Empty,
            Ok(records) => FetchResult::Ok(records),
            Err(e) => FetchResult::Err(e),
        }
    }

    async fn try_fetch_submissions(&self, form_id: &str) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();
        let mut next = Some(self.submissions_url(form_id)?);
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(ToolScopeError::malformed(
                    form_id,
                    format!("more than {MAX_PAGES} pages of results"),
                ));
            }

            let body = match self.get_body(form_id, url).await? {
                Some(body) => body,
                None if pages == 1 => break,
                None => {
                    return Err(ToolScopeError::unavailable(
                        form_id,
                        format!("page {pages} of results disappeared"),
                    ));
                }
            };
            let (page_records, next_link) = parse_page(form_id, &body)?;
            records.extend(page_records);

            next = match next_link {
                Some(link) => Some(self.next_page_url(form_id, &link)?),
                None => None,
            };
        }

        debug!(form_id, pages, records = records.len(), "submissions fetched");
        Ok(records)
    }

    /// Parse a `next` link, which must stay on the configured origin.
    fn next_page_url(&self, form_id: &str, link: &str) -> Result<Url> {
        let url = Url::parse(link).map_err(|e| {
            ToolScopeError::malformed(form_id, format!("bad `next` link '{link}': {e}"))
        })?;
        let home = self.base_url.origin();
        if url.origin() != home {
            return Err(ToolScopeError::malformed(
                form_id,
                format!(
                    "`next` link '{link}' leaves {}",
                    home.ascii_serialization()
                ),
            ));
        }
        Ok(url)
    }

    /// Fetch the definition of `form_id`. `Ok(None)` when the form does not exist.
    #[instrument(skip(self))]
    pub async fn fetch_form(&self, form_id: &str) -> Result<Option<FormDefinition>> {
        let url = self.form_url(form_id)?;
        match self.get_body(form_id, url).await? {
            Some(body) => parse_form(form_id, &body).map(Some),
            None => Ok(None),
        }
    }

    /// GET `url`. `None` for HTTP 404 or a blank body.
    async fn get_body(&self, form_id: &str, url: Url) -> Result<Option<Vec<u8>>> {
        debug!(%url, "requesting");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolScopeError::unavailable(form_id, e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ToolScopeError::unavailable(form_id, format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| {
                ToolScopeError::unavailable(form_id, format!("failed to read body: {e}"))
            })?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(body.to_vec()))
    }
}

/// Parse one submissions page into its records and `next` link.
fn parse_page(form_id: &str, body: &[u8]) -> Result<(Vec<RawRecord>, Option<String>)> {
    let page: SubmissionPage = serde_json::from_slice(body)
        .map_err(|e| ToolScopeError::malformed(form_id, e.to_string()))?;

    let records = page
        .results
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(ToolScopeError::malformed(
                form_id,
                format!("results[{i}] is not an object"),
            )),
        })
        .collect::<Result<Vec<_>>>()?;

    let next = page.next.filter(|link| !link.trim().is_empty());
    Ok((records, next))
}

fn parse_form(form_id: &str, body: &[u8]) -> Result<FormDefinition> {
    serde_json::from_slice::<FormDocument>(body)
        .map(|doc| doc.content)
        .map_err(|e| ToolScopeError::malformed(form_id, e.to_string()))
}

/// Form ids are path segments; reject anything that could escape the asset path.
fn validate_form_id(form_id: &str) -> Result<()> {
    let valid = !form_id.is_empty()
        && form_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ToolScopeError::validation(format!("invalid form id '{form_id}'")))
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ToolScopeError::config(format!("invalid survey base_url '{raw}': {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
