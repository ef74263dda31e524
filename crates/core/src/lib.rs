#![warn(clippy::all, missing_docs)]

//! Core client logic for the Crystal Ball covers forecaster.
//!
//! This crate hosts the data models, configuration handling, the
//! backend HTTP wrapper, session persistence, CSV previewing and the
//! prediction state used by the terminal UI and any future frontends.

pub mod billing;
pub mod config;
pub mod error;
pub mod fallback;
pub mod http;
pub mod models;
pub mod prediction;
pub mod preview;
pub mod session;
pub mod store;

pub use crate::config::AppConfig;
pub use error::{
    AuthError, IntakeError, ReadError, StoreError, TransportError, UploadError, ValidationError,
};
pub use http::HttpClient;
pub use models::{ForecastPoint, ForecastSeries, ForecastStats, Identity, Session, Weather};
pub use prediction::{PredictionSource, PredictionState, PredictionStore};
pub use preview::{FilePreviewer, PreviewMode, PreviewTable, UploadFile};
pub use session::SessionStore;
pub use store::TokenStore;
