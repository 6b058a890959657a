// Cloud Monitoring REST JSON: response decoding and error mapping.

use chrono::DateTime;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::{SeriesPage, SeriesQuery, TimeSeries};
use crate::error::{ReportError, ReportResult};
use crate::models::Point;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTimeSeriesResponse {
    #[serde(default)]
    time_series: Vec<RawTimeSeries>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTimeSeries {
    #[serde(default)]
    metric: RawLabelled,
    #[serde(default)]
    resource: RawLabelled,
    #[serde(default)]
    points: Vec<RawPoint>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLabelled {
    #[serde(rename = "type", default)]
    type_: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawPoint {
    interval: RawInterval,
    value: RawValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInterval {
    end_time: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawValue {
    #[serde(default)]
    int64_value: Option<Int64>,
    #[serde(default)]
    double_value: Option<f64>,
    #[serde(default)]
    bool_value: Option<bool>,
}

/// proto3 JSON encodes int64 as a string; accept a bare number too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Int64 {
    Str(String),
    Num(i64),
}

impl RawValue {
    fn as_f64(&self) -> ReportResult<f64> {
        if let Some(v) = self.double_value {
            return Ok(v);
        }
        match &self.int64_value {
            Some(Int64::Num(n)) => Ok(*n as f64),
            Some(Int64::Str(s)) => s
                .parse::<i64>()
                .map(|n| n as f64)
                .map_err(|e| ReportError::Decode(format!("int64Value {:?}: {}", s, e))),
            None => Ok(match self.bool_value {
                Some(true) => 1.0,
                _ => 0.0,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Decodes one ListTimeSeries page. Points come back sorted by timestamp.
pub fn decode_page(body: &str) -> ReportResult<SeriesPage> {
    let raw: ListTimeSeriesResponse =
        serde_json::from_str(body).map_err(|e| ReportError::Decode(e.to_string()))?;
    let mut series = Vec::with_capacity(raw.time_series.len());
    for ts in raw.time_series {
        let mut points = Vec::with_capacity(ts.points.len());
        for p in &ts.points {
            let timestamp = DateTime::parse_from_rfc3339(&p.interval.end_time)
                .map_err(|e| ReportError::Decode(format!("point time {:?}: {}", p.interval.end_time, e)))?
                .timestamp();
            points.push(Point {
                timestamp,
                value: p.value.as_f64()?,
            });
        }
        points.sort_by_key(|p| p.timestamp);
        series.push(TimeSeries {
            metric_type: ts.metric.type_,
            metric_labels: ts.metric.labels,
            resource_type: ts.resource.type_,
            resource_labels: ts.resource.labels,
            points,
        });
    }
    Ok(SeriesPage {
        series,
        next_page_token: raw.next_page_token.filter(|t| !t.is_empty()),
    })
}

/// Maps a non-success HTTP response to the error taxonomy.
pub fn map_error(status: u16, body: &str, query: &SeriesQuery) -> ReportError {
    let (api_status, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => (env.error.status, env.error.message),
        Err(_) => (String::new(), body.to_string()),
    };

    if status == 429 || api_status == "RESOURCE_EXHAUSTED" || reports_size_limit(&message) {
        return ReportError::QuotaExceeded {
            metric: query.metric_type.clone(),
            duration_secs: query.window.duration_secs(),
            step_secs: query.window.step_secs,
        };
    }
    match (status, api_status.as_str()) {
        (401, _) | (403, _) | (_, "UNAUTHENTICATED") | (_, "PERMISSION_DENIED") => {
            ReportError::Authorization(message)
        }
        (404, _) | (_, "NOT_FOUND") => ReportError::NotFound(message),
        (408, _) | (504, _) | (_, "DEADLINE_EXCEEDED") => ReportError::Timeout(message),
        _ => ReportError::Backend { status, message },
    }
}

/// The API rejects oversize responses with INVALID_ARGUMENT and a message to this effect.
fn reports_size_limit(message: &str) -> bool {
    let m = message.to_ascii_lowercase();
    m.contains("exceeds") && (m.contains("limit") || m.contains("maximum"))
}
