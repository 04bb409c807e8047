//! HTTP surface: the interactions endpoint and a health check.

use std::sync::Arc;

use anthrax_records::{SheetBackend, StaffPolicy};
use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::TcpListener;

use crate::interactions::{Dispatcher, Interaction};
use crate::verify::{SIGNATURE_HEADER, SignatureError, SignatureVerifier, TIMESTAMP_HEADER};

pub struct AppState<B, P> {
    pub dispatcher: Arc<Dispatcher<B, P>>,
    pub verifier: Arc<SignatureVerifier>,
}

impl<B, P> Clone for AppState<B, P> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            verifier: Arc::clone(&self.verifier),
        }
    }
}

pub fn router<B, P>(state: AppState<B, P>) -> Router
where
    B: SheetBackend + 'static,
    P: StaffPolicy + 'static,
{
    Router::new()
        .route("/healthz", get(healthz))
        .route("/interactions", post(interactions::<B, P>))
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<B, P, F>(listener: TcpListener, state: AppState<B, P>, shutdown: F) -> std::io::Result<()>
where
    B: SheetBackend + 'static,
    P: StaffPolicy + 'static,
    F: std::future::Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("interactions endpoint listening on http://{addr}/interactions");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn healthz() -> &'static str {
    "ok"
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(SignatureError::MissingHeader(name))
}

async fn interactions<B, P>(
    State(state): State<AppState<B, P>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    B: SheetBackend + 'static,
    P: StaffPolicy + 'static,
{
    let verified = header(&headers, SIGNATURE_HEADER).and_then(|signature| {
        let timestamp = header(&headers, TIMESTAMP_HEADER)?;
        state.verifier.verify(signature, timestamp, &body)
    });
    if let Err(err) = verified {
        tracing::debug!("rejecting interaction: {err}");
        return (StatusCode::UNAUTHORIZED, "invalid request signature").into_response();
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(err) => {
            tracing::warn!("malformed interaction payload: {err}");
            return (StatusCode::BAD_REQUEST, "malformed interaction").into_response();
        }
    };

    Json(state.dispatcher.dispatch(&interaction).await).into_response()
}
