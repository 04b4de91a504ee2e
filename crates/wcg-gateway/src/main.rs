mod auth;
mod config;
mod dispatch;
mod error;
mod session;
mod state;

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;

use wcg_crypto::file_store::{FileIdentityStore, FilePreKeyStore, FileRemoteIdentityStore, FileSessionStore};
use wcg_protocol::discovery::{ServerInfo, WELL_KNOWN_PATH};

use state::GatewayState;

const SERVER_NAME: &str = "wcg-gateway";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    tracing::info!("wcg-gateway starting");

    let args = config::parse_args();
    std::fs::create_dir_all(&args.storage_dir).expect("failed to create storage dir");

    let state = Arc::new(
        GatewayState::load_or_init(
            Arc::new(FileIdentityStore::new(args.storage_dir.clone())),
            Arc::new(FileRemoteIdentityStore::new(args.storage_dir.clone())),
            Arc::new(FileSessionStore::new(args.storage_dir.clone())),
            Arc::new(FilePreKeyStore::new(args.storage_dir.clone())),
        )
        .await
        .expect("failed to load or initialize gateway identity"),
    );

    tracing::info!(identity = %state.identity.public_key_hex(), "identity ready");

    let app = Router::new()
        .route(WELL_KNOWN_PATH, get(discovery))
        .route("/ws", get(websocket_upgrade))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&args.listen_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {e}", args.listen_addr));

    tracing::info!(addr = %args.listen_addr, "wcg-gateway ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server loop failed");

    tracing::info!("wcg-gateway stopped");
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

async fn discovery(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let bundle_bytes = match bincode::serialize(&state.pre_key_bundle) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize pre-key bundle");
            return axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    Json(ServerInfo::new(SERVER_NAME, SERVER_VERSION, &bundle_bytes)).into_response()
}

async fn websocket_upgrade(
    State(state): State<Arc<GatewayState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::handle_connection(state, socket))
}
