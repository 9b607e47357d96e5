//! Gate Server — HTTP and CLI front-end for the strategy gate engine
//!
//! Usage:
//!   gate-server serve --port 3002            — Launch the HTTP service
//!   gate-server list                         — Print registered strategies
//!   gate-server eval --input requests.json   — Evaluate requests offline

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use gate_engine::{BackendMode, GateRequest, GateResult, IndicatorEngine, Registry, RegistryError};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));
const SERVICE_NAME: &str = "gate-server";
const TOKEN_HEADER: &str = "x-strategy-token";

#[derive(Parser)]
#[command(name = "gate-server")]
#[command(about = "Deterministic strategy gates over market feature snapshots", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Indicator backend: auto, wilder (talib), ta (pandas_ta). Falls back to STRATEGY_TA_BACKEND.
    #[arg(long, global = true)]
    ta_backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the gate HTTP service
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3002)]
        port: u16,
        /// Shared secret for the x-strategy-token header. Falls back to STRATEGY_AUTH_TOKEN.
        #[arg(long)]
        auth_token: Option<String>,
    },
    /// Print the public strategy registry as JSON
    List,
    /// Evaluate one request, or a JSON array of requests, from a file
    Eval {
        /// Path to the request JSON
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Clone)]
struct AppState {
    registry: Arc<Registry>,
    /// SHA-256 of the configured token; `None` disables auth
    token_digest: Option<Arc<Vec<u8>>>,
}

impl AppState {
    fn new(registry: Arc<Registry>, token: Option<&str>) -> Self {
        let token_digest = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| Arc::new(digest(t)));
        Self {
            registry,
            token_digest,
        }
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let Some(expected) = &self.token_digest else {
            return Ok(());
        };
        let supplied = headers
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();
        if digest(supplied) == **expected {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

fn digest(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}

/// HTTP failure rendered as `{"detail": ...}`
#[derive(Debug)]
enum ApiError {
    Unauthorized,
    Registry(RegistryError),
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError::Registry(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::Registry(err @ RegistryError::NotFound(_)) => (StatusCode::NOT_FOUND, err.to_string()),
            ApiError::Registry(err) => (StatusCode::BAD_REQUEST, err.to_string()),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,gate_engine=debug,gate_server=debug")
    } else {
        EnvFilter::new("info,gate_engine=info,gate_server=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

/// CLI flag first, then the environment
fn setting(flag: Option<String>, env_key: &str) -> Option<String> {
    flag.or_else(|| std::env::var(env_key).ok())
}

fn build_registry(ta_backend: Option<String>) -> anyhow::Result<Arc<Registry>> {
    let mode = BackendMode::parse(&setting(ta_backend, "STRATEGY_TA_BACKEND").unwrap_or_default());
    let indicators = Arc::new(IndicatorEngine::from_mode(mode));
    info!(mode = mode.label(), "Indicator backend mode");
    let registry = Registry::builtin(indicators)?;
    Ok(Arc::new(registry))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let registry = build_registry(cli.ta_backend)?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            auth_token,
        } => {
            let token = setting(auth_token, "STRATEGY_AUTH_TOKEN");
            cmd_serve(registry, &host, port, token.as_deref()).await?;
        }
        Commands::List => {
            println!("{}", serde_json::to_string_pretty(&registry.list_public())?);
        }
        Commands::Eval { input } => {
            cmd_eval(&registry, &input)?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command — Axum web server
// ============================================================================

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api_health))
        .route("/v1/strategies", get(api_list_strategies))
        .route("/v1/strategies/run", post(api_run_strategy))
        .with_state(state)
        .layer(cors)
}

async fn cmd_serve(registry: Arc<Registry>, host: &str, port: u16, token: Option<&str>) -> anyhow::Result<()> {
    info!("Gate Server v{} starting...", APP_VERSION);

    let state = AppState::new(registry, token);
    if state.token_digest.is_none() {
        warn!("No auth token configured, every request is accepted");
    }
    let app = build_router(state);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Gate Server v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /health               - Health check");
    println!("  GET  /v1/strategies        - Registered strategies");
    println!("  POST /v1/strategies/run    - Evaluate one gate request");
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn api_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": APP_VERSION,
    }))
}

async fn api_list_strategies(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    state.authorize(&headers)?;
    Ok(Json(json!({ "items": state.registry.list_public() })))
}

async fn api_run_strategy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GateRequest>,
) -> Result<Json<GateResult>, ApiError> {
    state.authorize(&headers)?;
    let result = state.registry.evaluate(&request)?;
    Ok(Json(result))
}

// ============================================================================
// Eval command — offline batch evaluation
// ============================================================================

fn cmd_eval(registry: &Registry, input: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let document: Value = serde_json::from_str(&raw).with_context(|| format!("parsing {}", input.display()))?;

    let output = match document {
        Value::Array(items) => {
            info!(count = items.len(), "Evaluating request batch");
            let results: Vec<Value> = items
                .into_iter()
                .enumerate()
                .map(|(index, item)| eval_one(registry, item).unwrap_or_else(|err| {
                    warn!(index, error = %err, "Request failed");
                    json!({ "detail": err.to_string() })
                }))
                .collect();
            Value::Array(results)
        }
        single => eval_one(registry, single)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn eval_one(registry: &Registry, item: Value) -> anyhow::Result<Value> {
    let request: GateRequest = serde_json::from_value(item).context("invalid gate request")?;
    let result = registry.evaluate(&request)?;
    Ok(serde_json::to_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::builtin(Arc::new(IndicatorEngine::from_mode(BackendMode::Auto))).unwrap())
    }

    fn app(token: Option<&str>) -> Router {
        build_router(AppState::new(registry(), token))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn run_request(body: Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/v1/strategies/run")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header(TOKEN_HEADER, token);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn regime_body(strategy_type: &str) -> Value {
        json!({
            "strategyType": strategy_type,
            "config": {},
            "featureSnapshot": {"historyContext": {"reg": {"state": "trend_up", "conf": 70}, "ema": {"stk": "bull"}}},
            "context": {"signal": "up", "symbol": "BTCUSDT"},
            "trace": {"runId": "r-1"},
        })
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app(Some("secret")), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("ok"));
        assert_eq!(body["service"], json!(SERVICE_NAME));
    }

    #[tokio::test]
    async fn test_list_strategies() {
        let request = Request::builder().uri("/v1/strategies").body(Body::empty()).unwrap();
        let (status, body) = send(app(None), request).await;
        assert_eq!(status, StatusCode::OK);
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 7);
        assert_eq!(items[0]["type"], json!("regime_gate"));
        assert!(items[0].get("handler").is_none());
    }

    #[tokio::test]
    async fn test_run_strategy_stamps_meta() {
        let (status, body) = send(app(None), run_request(regime_body("regime_gate"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allow"], json!(true));
        assert_eq!(body["score"], json!(70.0));
        assert_eq!(body["meta"]["engine"], json!("rust"));
        assert_eq!(body["meta"]["strategyType"], json!("regime_gate"));
        assert_eq!(body["meta"]["strategyVersion"], json!("1.0.0"));
    }

    #[tokio::test]
    async fn test_unknown_strategy_is_404() {
        let (status, body) = send(app(None), run_request(regime_body("nope"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], json!("strategy_not_found:nope"));
    }

    #[tokio::test]
    async fn test_blank_strategy_type_is_400() {
        let (status, body) = send(app(None), run_request(regime_body(" "), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], json!("strategy_type_required"));
    }

    #[tokio::test]
    async fn test_token_is_enforced_when_configured() {
        let (status, body) = send(app(Some("secret")), run_request(regime_body("regime_gate"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], json!("unauthorized"));

        let (status, _) = send(app(Some("secret")), run_request(regime_body("regime_gate"), Some("wrong"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(app(Some("secret")), run_request(regime_body("regime_gate"), Some(" secret "))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn test_blank_token_disables_auth() {
        let state = AppState::new(registry(), Some("   "));
        assert!(state.token_digest.is_none());
        assert!(state.authorize(&HeaderMap::new()).is_ok());
    }

    #[test]
    fn test_eval_one_reports_unknown_type() {
        let registry = registry();
        let err = eval_one(&registry, regime_body("nope")).unwrap_err();
        assert_eq!(err.to_string(), "strategy_not_found:nope");

        let value = eval_one(&registry, regime_body("regime_gate")).unwrap();
        assert_eq!(value["tags"], json!(["regime_ok"]));
    }
}
