use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

mod classifier;
mod config;
mod error;
mod logging;
mod models;
mod normalize;
mod predictor;
mod projections;
mod registry;
mod store;


use config::Config;
use error::ApiError;
use models::{
    AboutSection, HomePage, ModelInfo, Page, PageContent, PredictInput, PredictionEvent,
    PredictionRequest, PredictionResponse, VisitEvent,
};
use predictor::{EmotionPredictor, OTHERS_LABEL};
use projections::MonitorReport;
use registry::ModelRegistry;
use store::EventStore;

const OTHERS_MESSAGE: &str =
    "The text does not belong to any of the predefined categories or contains emojis.";

/// Emotion classifier HTTP API
/// Every page navigation and prediction is appended to the event store
/// Models are loaded once at startup and shared read-only
#[derive(Clone)]
struct AppState {
    predictor: EmotionPredictor,
    store: Arc<EventStore>,
    default_threshold: f64,
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Error initializing logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "server exited");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let registry = ModelRegistry::load(&config.models)?;
    let store = EventStore::open(&config.storage.database_path)?;

    let state = AppState {
        predictor: EmotionPredictor::new(Arc::new(registry)),
        store: Arc::new(store),
        default_threshold: config.models.default_threshold,
    };

    let app = router(state);

    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/models", get(list_models))
        .route("/pages/:page", get(visit_page))
        .route("/predict", post(predict))
        .route("/events/visits", get(list_visits))
        .route("/events/predictions", get(list_predictions))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "Emotion Classifier API v0.1.0"
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    let registry = state.predictor.registry();
    let models = registry
        .labels()
        .into_iter()
        .map(|label| ModelInfo {
            label,
            classes: registry.model(label).classes().to_vec(),
        })
        .collect();

    Json(models)
}

/// Menu navigation
/// Records the visit before building the page, so a failed write fails the request
async fn visit_page(
    State(state): State<AppState>,
    Path(page): Path<String>,
) -> Result<Json<PageContent>, ApiError> {
    let page: Page = page.parse().map_err(ApiError::UnknownPage)?;

    let content = run_blocking(move || {
        state.store.record_visit(page.as_str(), Utc::now())?;

        Ok(match page {
            Page::Home => PageContent::Home(HomePage {
                title: "Emotion Detection in Text",
                models: state.predictor.registry().labels().to_vec(),
                default_threshold: state.default_threshold,
            }),
            Page::Monitor => PageContent::Monitor(MonitorReport::build(&state.store)?),
            Page::About => PageContent::About(about_sections()),
        })
    })
    .await?;

    Ok(Json(content))
}

/// Classify text and append the outcome to the prediction log
async fn predict(
    State(state): State<AppState>,
    Json(input): Json<PredictInput>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let request_id = uuid::Uuid::new_v4();
    let request = PredictionRequest {
        text: input.text,
        model: input.model,
        threshold: input.threshold.unwrap_or(state.default_threshold),
    };

    let result = run_blocking(move || {
        let result = state.predictor.predict(&request)?;
        state.store.record_prediction(
            &result.normalized_text,
            &result.label,
            result.confidence,
            Utc::now(),
        )?;
        Ok(result)
    })
    .await?;

    tracing::info!(
        %request_id,
        model = %result.model,
        label = %result.label,
        confidence = result.confidence,
        "prediction served"
    );

    let message = (result.label == OTHERS_LABEL).then(|| OTHERS_MESSAGE.to_string());
    Ok(Json(PredictionResponse {
        request_id,
        confidence_display: format!("{:.2}%", result.confidence),
        result,
        message,
    }))
}

/// List all visits (read-only)
async fn list_visits(State(state): State<AppState>) -> Result<Json<Vec<VisitEvent>>, ApiError> {
    let visits = run_blocking(move || Ok(state.store.list_visits()?)).await?;
    Ok(Json(visits))
}

/// List all predictions (read-only)
async fn list_predictions(
    State(state): State<AppState>,
) -> Result<Json<Vec<PredictionEvent>>, ApiError> {
    let predictions = run_blocking(move || Ok(state.store.list_predictions()?)).await?;
    Ok(Json(predictions))
}

/// SQLite I/O and inference block, so they run on the blocking pool
async fn run_blocking<F, T>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await?
}

fn about_sections() -> Vec<AboutSection> {
    vec![
        AboutSection {
            heading: "Emotion Detection in Text",
            body: "Identifies the emotion expressed in short texts using one of six \
                   language-specific classifiers: Japanese, Korean, English, Filipino, \
                   Spanish, and Emoji.",
        },
        AboutSection {
            heading: "How It Works",
            body: "Input text has its emoji and emoticons rewritten as name tokens, then the \
                   selected model scores every emotion class. The top class is reported \
                   with its confidence; when that confidence is below the threshold the \
                   result is \"Others\".",
        },
        AboutSection {
            heading: "Confidence Score",
            body: "The confidence is the model's probability for the reported class, as a \
                   percentage. The full per-class distribution accompanies every confident \
                   prediction.",
        },
        AboutSection {
            heading: "Monitoring",
            body: "Every page visit and prediction is kept in an append-only log. The Monitor \
                   page lists both logs with per-page and per-emotion counts.",
        },
    ]
}
