//! HTTP surface: the prediction page, form submission and CSV upload.

use std::fs;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use log::{error, info, warn};
use thiserror::Error;

use crate::config::AppConfig;
use crate::error::ModelError;
use crate::flow::{Event, Interaction, Outcome};
use crate::model::{ForestModel, Predictor};
use crate::records::PatientForm;
use crate::render::page;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bind error: {0}")]
    Bind(std::io::Error),
    #[error("server error: {0}")]
    Serve(std::io::Error),
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        error!("request failed: {self}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html("<h1>500</h1><p>Model prediction failed.</p>".to_string()),
        )
            .into_response()
    }
}

/// State shared by every request. Read-only after startup.
pub struct AppState {
    pub predictor: Predictor,
    pub stylesheet: String,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(predictor: Predictor, stylesheet: String, config: AppConfig) -> Self {
        Self {
            predictor,
            stylesheet,
            config,
        }
    }

    /// Load the model and stylesheet named by `config`.
    ///
    /// A missing model is fatal. A missing stylesheet only costs styling.
    pub fn load(config: AppConfig) -> Result<Self, ModelError> {
        let predictor = Predictor::from_model(ForestModel::load(&config.model_path)?);
        let stylesheet = match fs::read_to_string(&config.stylesheet_path) {
            Ok(css) => css,
            Err(e) => {
                warn!(
                    "stylesheet {:?} unavailable, rendering unstyled: {e}",
                    config.stylesheet_path
                );
                String::new()
            }
        };
        Ok(Self::new(predictor, stylesheet, config))
    }

    fn render(&self, form: &PatientForm, outcome: Option<&Outcome>) -> Html<String> {
        Html(page(&self.stylesheet, form, outcome))
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict))
        .route("/batch", post(batch))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>) -> Result<(), ServerError> {
    let address = state.config.address;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(ServerError::Bind)?;
    info!("serving stroke risk page on http://{address}");
    axum::serve(listener, router(state))
        .await
        .map_err(ServerError::Serve)
}

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    state.render(&PatientForm::default(), None)
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Form(form): Form<PatientForm>,
) -> Result<Html<String>, ServerError> {
    let outcome = Interaction::new(&state.predictor, state.config.strict_labels)
        .handle(Event::Submit(form.clone()))?;
    Ok(state.render(&form, Some(&outcome)))
}

async fn batch(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Html<String> {
    let outcome = match read_upload(&mut multipart).await {
        Ok(bytes) => {
            info!("received upload ({} bytes)", bytes.len());
            let shared = Arc::clone(&state);
            // parsing and scoring a whole table is CPU-bound
            tokio::task::spawn_blocking(move || {
                Interaction::new(&shared.predictor, shared.config.strict_labels)
                    .handle(Event::Upload(bytes))
            })
            .await
            .map_err(|e| e.to_string())
            .and_then(|handled| handled.map_err(|e| e.to_string()))
            .unwrap_or_else(Outcome::BatchFailed)
        }
        Err(message) => {
            warn!("upload rejected: {message}");
            Outcome::BatchFailed(message)
        }
    };
    state.render(&PatientForm::default(), Some(&outcome))
}

async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, String> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| e.body_text())?
    {
        if field.name() == Some("file") {
            let bytes = field.bytes().await.map_err(|e| e.body_text())?;
            if bytes.is_empty() {
                return Err("file kosong".to_string());
            }
            return Ok(bytes.to_vec());
        }
    }
    Err("tidak ada file yang diunggah".to_string())
}
