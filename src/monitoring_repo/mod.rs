// Cloud Monitoring time series via the REST API (reqwest).

pub mod query;
mod wire;

pub use query::{Aligner, SeriesQuery, SeriesView, build_filter};
pub use wire::{decode_page, map_error};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::credentials::TokenSource;
use crate::error::{ReportError, ReportResult};
use crate::models::Point;

/// One decoded series: labels plus (possibly empty, for HEADERS) points.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    pub metric_type: String,
    pub metric_labels: BTreeMap<String, String>,
    pub resource_type: String,
    pub resource_labels: BTreeMap<String, String>,
    pub points: Vec<Point>,
}

impl TimeSeries {
    pub fn resource_label(&self, key: &str) -> Option<&str> {
        self.resource_labels
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn metric_label(&self, key: &str) -> Option<&str> {
        self.metric_labels
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeriesPage {
    pub series: Vec<TimeSeries>,
    pub next_page_token: Option<String>,
}

/// Read-only access to a monitoring backend. The only seam the pipeline talks through.
#[async_trait]
pub trait MonitoringBackend: Send + Sync {
    async fn list_time_series(&self, project: &str, query: &SeriesQuery)
    -> ReportResult<SeriesPage>;
}

/// Follows `nextPageToken` until the listing is exhausted.
pub async fn list_all_pages(
    backend: &dyn MonitoringBackend,
    project: &str,
    query: &SeriesQuery,
) -> ReportResult<Vec<TimeSeries>> {
    let mut out = Vec::new();
    let mut page_query = query.with_page_token(None);
    loop {
        let page = backend.list_time_series(project, &page_query).await?;
        out.extend(page.series);
        match page.next_page_token {
            Some(token) => page_query = query.with_page_token(Some(token)),
            None => break,
        }
    }
    Ok(out)
}

pub const DEFAULT_ENDPOINT: &str = "https://monitoring.googleapis.com";

pub struct CloudMonitoringRepo {
    http: reqwest::Client,
    endpoint: String,
    tokens: Arc<dyn TokenSource>,
}

impl CloudMonitoringRepo {
    pub fn new(
        endpoint: &str,
        request_timeout: Duration,
        tokens: Arc<dyn TokenSource>,
    ) -> ReportResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(crate::version::user_agent())
            .build()
            .map_err(|e| ReportError::Backend {
                status: 0,
                message: format!("http client: {}", e),
            })?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn url(&self, project: &str) -> String {
        format!("{}/v3/projects/{}/timeSeries", self.endpoint, project)
    }
}

fn map_transport(e: reqwest::Error) -> ReportError {
    if e.is_timeout() {
        ReportError::Timeout(e.to_string())
    } else {
        ReportError::Backend {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl MonitoringBackend for CloudMonitoringRepo {
    #[instrument(skip(self, query), fields(repo = "monitoring", operation = "list_time_series", metric = %query.metric_type))]
    async fn list_time_series(
        &self,
        project: &str,
        query: &SeriesQuery,
    ) -> ReportResult<SeriesPage> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(self.url(project))
            .bearer_auth(token)
            .query(&query.to_params())
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport)?;
        if !status.is_success() {
            let err = map_error(status.as_u16(), &body, query);
            tracing::debug!(status = status.as_u16(), error = %err, "list_time_series failed");
            return Err(err);
        }
        let page = decode_page(&body)?;
        tracing::debug!(series_count = page.series.len(), "page received");
        Ok(page)
    }
}
