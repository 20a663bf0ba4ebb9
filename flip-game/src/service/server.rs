use super::{RevealBody, ServiceError, ServiceInfo};
use crate::commitment::{RoundCommitment, RoundReveal};
use crate::error::{Result, WagerError};
use crate::outcome::RoundOracle;
use crate::settlement::{PayoutReceipt, PayoutRequest, Settlement, SettlementAuthority};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use flip_core::storage::PayoutRecord;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

type AppState = Arc<SettlementAuthority>;

struct ApiError(WagerError);

impl From<WagerError> for ApiError {
    fn from(err: WagerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            WagerError::InsufficientPlatformFunds { .. } => StatusCode::SERVICE_UNAVAILABLE,
            WagerError::PayoutSubmission { .. } => StatusCode::BAD_GATEWAY,
            WagerError::PayoutNotFound(_) => StatusCode::NOT_FOUND,
            WagerError::NotAWinner(_)
            | WagerError::StakeProof(_)
            | WagerError::Round(_)
            | WagerError::InvalidCommitment
            | WagerError::InputRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Settlement request failed: {}", self.0);
        } else {
            tracing::info!("Settlement request refused ({}): {}", status, self.0);
        }

        (status, Json(ServiceError::from(&self.0))).into_response()
    }
}

/// Routes over one authority
pub fn router(authority: Arc<SettlementAuthority>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/payouts", post(payout_handler))
        .route("/payouts/{id}", get(payout_status_handler))
        .route("/rounds", post(open_round_handler))
        .route("/rounds/{id}/reveal", post(reveal_round_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(authority)
}

/// Serve `authority` on `listener` until `shutdown` resolves
pub async fn serve<F>(
    listener: TcpListener,
    authority: Arc<SettlementAuthority>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(
            "Settlement service for {} listening on http://{}",
            authority.platform_address(),
            addr
        );
    }

    axum::serve(listener, router(authority))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| WagerError::internal(format!("settlement service stopped: {}", e)))
}

async fn health_handler(State(authority): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        status: "ok".to_string(),
        platform: authority.platform_address(),
    })
}

async fn payout_handler(
    State(authority): State<AppState>,
    Json(request): Json<PayoutRequest>,
) -> std::result::Result<Json<PayoutReceipt>, ApiError> {
    Ok(Json(authority.payout(request).await?))
}

async fn payout_status_handler(
    State(authority): State<AppState>,
    Path(payout_id): Path<Uuid>,
) -> std::result::Result<Json<PayoutRecord>, ApiError> {
    Ok(Json(authority.payout_status(payout_id).await?))
}

async fn open_round_handler(
    State(authority): State<AppState>,
) -> std::result::Result<Json<RoundCommitment>, ApiError> {
    Ok(Json(authority.open_round().await?))
}

async fn reveal_round_handler(
    State(authority): State<AppState>,
    Path(round_id): Path<Uuid>,
    Json(body): Json<RevealBody>,
) -> std::result::Result<Json<RoundReveal>, ApiError> {
    let reveal = authority
        .reveal_round(round_id, &body.stake_signature, &body.client_seed)
        .await?;
    Ok(Json(reveal))
}
