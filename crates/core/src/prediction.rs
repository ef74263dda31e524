//! Latest forecast series and its summary statistics.
//!
//! The store is filled either by a backend refresh or by the payload
//! returned from a CSV upload. A refresh that fails or comes back empty
//! is replaced by the built-in demo forecast, so the dashboard always
//! has a series to draw once the first refresh has completed.

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    error::{TransportError, UploadError},
    fallback::{with_fallback, Resolved},
    http::HttpClient,
    models::{ForecastPoint, ForecastSeries, ForecastStats, Weather},
    preview::{UploadFile, CSV_MEDIA_TYPE},
};

const LATEST_PATH: &str = "/predict/latest";
const UPLOAD_PATH: &str = "/upload";
const UPLOAD_FIELD: &str = "file";

static DEMO_SERIES: Lazy<ForecastSeries> = Lazy::new(|| {
    [
        (14, 45.0, 85.0, Weather::Sunny, Some(48.0)),
        (15, 52.0, 80.0, Weather::Cloudy, Some(50.0)),
        (16, 68.0, 75.0, Weather::Rainy, Some(60.0)),
        (17, 70.0, 78.0, Weather::Rainy, None),
        (18, 40.0, 90.0, Weather::Sunny, None),
        (19, 42.0, 88.0, Weather::Sunny, None),
        (20, 48.0, 85.0, Weather::Cloudy, None),
    ]
    .into_iter()
    .map(|(day, covers, confidence, weather, actual)| {
        let date = NaiveDate::from_ymd_opt(2023, 12, day).expect("invalid demo date");
        ForecastPoint::new(date, covers, confidence, Some(weather), actual)
    })
    .collect()
});

/// The fixed seven-day forecast shown when the backend has nothing.
pub fn demo_series() -> ForecastSeries {
    DEMO_SERIES.clone()
}

/// Statistics paired with [`demo_series`].
pub fn demo_stats() -> ForecastStats {
    ForecastStats {
        mean_covers: 50.0,
        trend_per_day: 1.2,
        seasonality_detected: true,
    }
}

/// `GET /predict/latest` reply. Both fields may be missing or null.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LatestPredictions {
    /// Forecast days, oldest first.
    #[serde(default)]
    pub predictions: Option<ForecastSeries>,
    /// Summary for the series.
    #[serde(default)]
    pub stats: Option<ForecastStats>,
}

/// `POST /upload` reply.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UploadResult {
    /// Backend status label, e.g. `"success"`.
    #[serde(default)]
    pub status: Option<String>,
    /// Forecast fitted on the uploaded history.
    #[serde(default)]
    pub predictions: Option<ForecastSeries>,
    /// Model summary for the fitted series.
    #[serde(default)]
    pub model_stats: Option<ForecastStats>,
}

impl HttpClient {
    /// Fetch the most recent forecast.
    pub async fn latest_predictions(&self) -> Result<LatestPredictions, TransportError> {
        self.get_json(LATEST_PATH).await
    }

    /// Send a CSV file as multipart field `file`.
    pub async fn upload_csv(&self, file: &UploadFile) -> Result<UploadResult, UploadError> {
        let bytes = file.read_bytes().await?;
        let part = Part::bytes(bytes)
            .file_name(file.name().to_string())
            .mime_str(CSV_MEDIA_TYPE)
            .map_err(TransportError::from)?;
        let form = Form::new().part(UPLOAD_FIELD, part);
        let result = self.post_multipart(UPLOAD_PATH, form).await?;
        Ok(result)
    }
}

/// Where the current series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionSource {
    /// Returned by `GET /predict/latest`.
    Remote,
    /// Built-in demo forecast.
    Fallback,
    /// Returned by a CSV upload.
    Upload,
}

impl PredictionSource {
    /// Short label for status lines.
    pub fn label(self) -> &'static str {
        match self {
            PredictionSource::Remote => "live",
            PredictionSource::Fallback => "demo",
            PredictionSource::Upload => "upload",
        }
    }
}

/// A series with its stats, as last applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    /// Forecast days in the order received.
    pub series: ForecastSeries,
    /// Summary statistics.
    pub stats: ForecastStats,
    /// Origin of the data.
    pub source: PredictionSource,
    /// When the data was applied.
    pub updated_at: DateTime<Local>,
}

/// Observable state of the store.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionState {
    /// Nothing requested yet.
    Empty,
    /// A refresh is in flight.
    Loading,
    /// Data is available.
    Loaded(Forecast),
}

/// Identifies one refresh; only the latest ticket's result is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket(u64);

#[derive(Debug, Default)]
struct Inner {
    forecast: Option<Forecast>,
    loading: bool,
    generation: u64,
}

/// Shared prediction state. Clones observe the same data.
#[derive(Debug, Clone, Default)]
pub struct PredictionStore {
    inner: Arc<RwLock<Inner>>,
}

impl PredictionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch and apply the latest forecast, substituting the demo forecast on failure.
    pub async fn refresh(&self, client: &HttpClient) -> PredictionState {
        let ticket = self.begin_refresh();
        let result = client.latest_predictions().await;
        self.complete_refresh(ticket, result);
        self.state()
    }

    /// Mark a refresh as started. Any earlier ticket becomes stale.
    pub fn begin_refresh(&self) -> RefreshTicket {
        let mut inner = self.inner.write();
        inner.generation += 1;
        inner.loading = true;
        RefreshTicket(inner.generation)
    }

    /// Apply a refresh result. Returns `false` when the ticket is stale.
    pub fn complete_refresh(
        &self,
        ticket: RefreshTicket,
        result: Result<LatestPredictions, TransportError>,
    ) -> bool {
        let mut inner = self.inner.write();
        if ticket.0 != inner.generation {
            debug!(
                ticket = ticket.0,
                current = inner.generation,
                "dropping stale refresh"
            );
            return false;
        }

        let resolved = with_fallback(
            result.map(|latest| {
                (
                    latest.predictions.unwrap_or_default(),
                    latest.stats.unwrap_or_default(),
                )
            }),
            |(series, _)| !series.is_empty(),
            || (demo_series(), demo_stats()),
        );
        let source = match &resolved {
            Resolved::Primary(_) => PredictionSource::Remote,
            Resolved::Fallback { .. } => PredictionSource::Fallback,
        };
        let (series, stats) = resolved.into_value();
        info!(points = series.len(), source = source.label(), "forecast refreshed");
        inner.loading = false;
        inner.forecast = Some(Forecast {
            series,
            stats,
            source,
            updated_at: Local::now(),
        });
        true
    }

    /// Replace the forecast with an upload's payload, if it carries one.
    ///
    /// An applied upload also invalidates any refresh still in flight.
    pub fn apply_upload_result(&self, payload: UploadResult) -> bool {
        let Some(series) = payload.predictions else {
            debug!(status = ?payload.status, "upload result carried no predictions");
            return false;
        };
        let mut inner = self.inner.write();
        inner.generation += 1;
        inner.loading = false;
        info!(points = series.len(), "forecast replaced from upload");
        inner.forecast = Some(Forecast {
            series,
            stats: payload.model_stats.unwrap_or_default(),
            source: PredictionSource::Upload,
            updated_at: Local::now(),
        });
        true
    }

    /// Current state.
    pub fn state(&self) -> PredictionState {
        let inner = self.inner.read();
        match (&inner.forecast, inner.loading) {
            (_, true) => PredictionState::Loading,
            (Some(forecast), false) => PredictionState::Loaded(forecast.clone()),
            (None, false) => PredictionState::Empty,
        }
    }

    /// Whether a refresh is in flight.
    pub fn is_loading(&self) -> bool {
        self.inner.read().loading
    }

    /// Last applied forecast, kept while a newer refresh is loading.
    pub fn forecast(&self) -> Option<Forecast> {
        self.inner.read().forecast.clone()
    }

    /// Last applied series, or empty before the first refresh.
    pub fn series(&self) -> ForecastSeries {
        self.inner
            .read()
            .forecast
            .as_ref()
            .map(|forecast| forecast.series.clone())
            .unwrap_or_default()
    }

    /// Last applied statistics.
    pub fn stats(&self) -> Option<ForecastStats> {
        self.inner
            .read()
            .forecast
            .as_ref()
            .map(|forecast| forecast.stats.clone())
    }

    /// Origin of the last applied series.
    pub fn source(&self) -> Option<PredictionSource> {
        self.inner.read().forecast.as_ref().map(|forecast| forecast.source)
    }

    /// The first day of the series, shown in the orb.
    pub fn next_point(&self) -> Option<ForecastPoint> {
        self.inner
            .read()
            .forecast
            .as_ref()
            .and_then(|forecast| forecast.series.first().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        http::test_support::{client, serve_once, unreachable_base_url},
        store::TokenStore,
    };
    use tempfile::tempdir;

    fn point(day: u32, covers: f64) -> ForecastPoint {
        let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        ForecastPoint::new(date, covers, 70.0, None, None)
    }

    #[test]
    fn demo_forecast_is_a_week() {
        let series = demo_series();
        assert_eq!(series.len(), 7);
        assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2023, 12, 14).unwrap());
        assert_eq!(series[0].predicted_covers, 45.0);
        assert_eq!(series[6].weather, Some(Weather::Cloudy));
        assert_eq!(series.iter().filter(|p| p.actual.is_some()).count(), 3);
        assert_eq!(demo_stats().mean_covers, 50.0);
    }

    #[tokio::test]
    async fn empty_backend_reply_uses_demo_forecast() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let tokens = TokenStore::new(dir.path().join("session.json"));
        let (base, handle) = serve_once("200 OK", r#"{"predictions":[],"stats":null}"#).await;
        let store = PredictionStore::new();

        let state = store.refresh(&client(&base, tokens)).await;
        let request = handle.await?;
        assert!(request.starts_with("GET /api/predict/latest "));

        let PredictionState::Loaded(forecast) = state else {
            panic!("expected loaded state");
        };
        assert_eq!(forecast.series.len(), 7);
        assert_eq!(forecast.stats.mean_covers, 50.0);
        assert_eq!(forecast.source, PredictionSource::Fallback);
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_backend_still_yields_a_series() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let tokens = TokenStore::new(dir.path().join("session.json"));
        let store = PredictionStore::new();
        assert_eq!(store.state(), PredictionState::Empty);

        store
            .refresh(&client(&unreachable_base_url().await, tokens))
            .await;
        assert!(!store.series().is_empty());
        assert_eq!(store.source(), Some(PredictionSource::Fallback));
        assert!(!store.is_loading());
        Ok(())
    }

    #[tokio::test]
    async fn remote_series_is_kept_verbatim() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let tokens = TokenStore::new(dir.path().join("session.json"));
        let (base, handle) = serve_once(
            "200 OK",
            r#"{"predictions":[
                {"date":"2024-01-03","predicted_covers":30,"confidence":60,"weather":"Sunny"},
                {"date":"2024-01-02","predicted_covers":35,"confidence":65,"weather":"Rainy"}
            ]}"#,
        )
        .await;
        let store = PredictionStore::new();

        store.refresh(&client(&base, tokens)).await;
        handle.await?;
        let series = store.series();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(store.stats(), Some(ForecastStats::default()));
        assert_eq!(store.source(), Some(PredictionSource::Remote));
        assert_eq!(store.next_point().map(|p| p.predicted_covers), Some(30.0));
        Ok(())
    }

    #[test]
    fn stale_refresh_is_dropped() {
        let store = PredictionStore::new();
        let first = store.begin_refresh();
        let second = store.begin_refresh();
        assert_eq!(store.state(), PredictionState::Loading);

        let fresh = LatestPredictions {
            predictions: Some(vec![point(1, 20.0)]),
            stats: None,
        };
        assert!(store.complete_refresh(second, Ok(fresh)));
        assert!(!store.complete_refresh(first, Err(TransportError::Timeout)));
        assert_eq!(store.series(), vec![point(1, 20.0)]);
        assert_eq!(store.source(), Some(PredictionSource::Remote));
    }

    #[test]
    fn upload_result_replaces_forecast() {
        let store = PredictionStore::new();
        let ticket = store.begin_refresh();
        let applied = store.apply_upload_result(UploadResult {
            status: Some("success".to_string()),
            predictions: Some(vec![point(5, 55.0), point(6, 57.0)]),
            model_stats: Some(ForecastStats {
                mean_covers: 52.0,
                trend_per_day: 0.8,
                seasonality_detected: false,
            }),
        });
        assert!(applied);
        assert!(!store.complete_refresh(ticket, Err(TransportError::Timeout)));

        let PredictionState::Loaded(forecast) = store.state() else {
            panic!("expected loaded state");
        };
        assert_eq!(forecast.series.len(), 2);
        assert_eq!(forecast.stats.mean_covers, 52.0);
        assert_eq!(forecast.source, PredictionSource::Upload);
    }

    #[test]
    fn upload_without_predictions_changes_nothing() {
        let store = PredictionStore::new();
        let ticket = store.begin_refresh();
        store.complete_refresh(ticket, Err(TransportError::Timeout));
        let before = store.series();

        let payload: UploadResult =
            serde_json::from_str(r#"{"status":"error","model_stats":{"mean_covers":1}}"#).unwrap();
        assert!(!store.apply_upload_result(payload));
        assert_eq!(store.series(), before);
        assert_eq!(store.source(), Some(PredictionSource::Fallback));
    }

    #[tokio::test]
    async fn upload_posts_multipart_file() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let tokens = TokenStore::new(dir.path().join("session.json"));
        tokens.set_token("jwt-9")?;
        let (base, handle) = serve_once(
            "200 OK",
            r#"{"status":"success","predictions":[{"date":"2024-01-08","predicted_covers":44,"confidence":81}],"model_stats":{"mean_covers":44}}"#,
        )
        .await;
        let file = UploadFile::from_bytes("history.csv", "text/csv", "date,covers\n2024-01-01,40\n");

        let result = client(&base, tokens).upload_csv(&file).await?;
        let request = handle.await?;
        assert!(request.starts_with("POST /api/upload "));
        assert!(request.contains("multipart/form-data"));
        assert!(request.contains(r#"name="file"; filename="history.csv""#));
        assert!(request.contains("2024-01-01,40"));
        assert!(request.contains("Bearer jwt-9"));

        let store = PredictionStore::new();
        assert!(store.apply_upload_result(result));
        assert_eq!(store.stats().map(|s| s.mean_covers), Some(44.0));
        Ok(())
    }
}
