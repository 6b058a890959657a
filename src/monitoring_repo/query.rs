// ListTimeSeries request parameters.

use chrono::SecondsFormat;

use crate::models::{MetricKind, SeriesKind, Window};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aligner {
    /// Counts per step (counters).
    Delta,
    /// Highest value per step (gauges).
    Max,
    /// Raw points, no alignment.
    None,
}

impl Aligner {
    pub fn for_kind(kind: SeriesKind) -> Self {
        match kind {
            SeriesKind::Counter => Aligner::Delta,
            SeriesKind::Gauge => Aligner::Max,
        }
    }

    fn as_param(self) -> Option<&'static str> {
        match self {
            Aligner::Delta => Some("ALIGN_DELTA"),
            Aligner::Max => Some("ALIGN_MAX"),
            Aligner::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesView {
    Full,
    /// Labels only, no points. Used for enumeration.
    Headers,
}

/// One ListTimeSeries call (one page).
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesQuery {
    pub metric: MetricKind,
    pub metric_type: String,
    pub filter: String,
    pub window: Window,
    pub aligner: Aligner,
    pub view: SeriesView,
    pub page_size: u32,
    pub page_token: Option<String>,
}

impl SeriesQuery {
    /// Points-bearing query for `metric_type`, optionally restricted to one instance.
    pub fn full(
        metric: MetricKind,
        metric_type: &str,
        instance: Option<(&str, &str)>,
        window: Window,
        page_size: u32,
    ) -> Self {
        Self {
            metric,
            metric_type: metric_type.to_string(),
            filter: build_filter(metric_type, instance),
            window,
            aligner: Aligner::for_kind(metric.series_kind()),
            view: SeriesView::Full,
            page_size,
            page_token: None,
        }
    }

    /// Label-only query across the whole project.
    pub fn headers(metric: MetricKind, metric_type: &str, window: Window, page_size: u32) -> Self {
        Self {
            metric,
            metric_type: metric_type.to_string(),
            filter: build_filter(metric_type, None),
            window,
            aligner: Aligner::None,
            view: SeriesView::Headers,
            page_size,
            page_token: None,
        }
    }

    pub fn with_window(&self, window: Window) -> Self {
        Self {
            window,
            page_token: None,
            ..self.clone()
        }
    }

    pub fn with_page_token(&self, token: Option<String>) -> Self {
        Self {
            page_token: token,
            ..self.clone()
        }
    }

    /// URL query parameters for the REST call.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("filter", self.filter.clone()),
            (
                "interval.startTime",
                self.window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (
                "interval.endTime",
                self.window.end.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (
                "view",
                match self.view {
                    SeriesView::Full => "FULL".to_string(),
                    SeriesView::Headers => "HEADERS".to_string(),
                },
            ),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(aligner) = self.aligner.as_param() {
            params.push((
                "aggregation.alignmentPeriod",
                format!("{}s", self.window.step_secs),
            ));
            params.push(("aggregation.perSeriesAligner", aligner.to_string()));
        }
        if let Some(token) = &self.page_token {
            params.push(("pageToken", token.clone()));
        }
        params
    }
}

/// `metric.type = "..."`, plus an instance restriction when given as (label, value).
pub fn build_filter(metric_type: &str, instance: Option<(&str, &str)>) -> String {
    let mut filter = format!("metric.type = \"{}\"", escape(metric_type));
    if let Some((label, value)) = instance {
        filter.push_str(&format!(
            " AND resource.labels.{} = \"{}\"",
            label,
            escape(value)
        ));
    }
    filter
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
