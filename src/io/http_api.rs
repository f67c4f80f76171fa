//! Check-in HTTP API
//!
//! Routes:
//! - POST /checkin - evaluate a check-in attempt, JSON in and out
//! - GET /metrics - Prometheus text format
//! - GET /health - liveness probe
//!
//! A decision (accepted or rejected) is always a 200; only undecodable
//! requests get a 400. Scanned payloads are never logged.

use crate::domain::types::{
    ActivityWindow, CheckInAttempt, Decision, GeoPoint, RejectionReason,
};
use crate::infra::metrics::Metrics;
use crate::io::prometheus::format_prometheus_metrics;
use crate::services::eligibility::CheckInGate;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Full, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 16 * 1024;

const MALFORMED_BODY: &str = r#"{"error":"malformed_request"}"#;

/// POST /checkin request body
#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub payload: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Server clock is used when absent
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub window: ActivityWindow,
}

impl CheckInRequest {
    fn into_attempt(self, now: DateTime<Utc>) -> (CheckInAttempt, ActivityWindow) {
        let attempt = CheckInAttempt::new(
            self.payload,
            GeoPoint::new(self.latitude, self.longitude),
            self.timestamp.unwrap_or(now),
        );
        (attempt, self.window)
    }
}

/// POST /checkin response body
#[derive(Debug, Serialize)]
pub struct CheckInResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl From<Decision> for CheckInResponse {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accepted => Self { accepted: true, reason: None, message: None },
            Decision::Rejected(reason) => {
                Self { accepted: false, reason: Some(reason), message: Some(reason.message()) }
            }
        }
    }
}

/// Shared state for all connections
pub struct ApiState {
    pub gate: CheckInGate,
    pub metrics: Arc<Metrics>,
    pub site_id: String,
}

/// Decode a check-in body, run the decision, and log/count the outcome
///
/// Returns the status code and JSON body to send back.
pub fn handle_checkin(state: &ApiState, body: &[u8], now: DateTime<Utc>) -> (StatusCode, String) {
    let request: CheckInRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            state.metrics.record_malformed();
            warn!(error = %e, "checkin_malformed_request");
            return (StatusCode::BAD_REQUEST, MALFORMED_BODY.to_string());
        }
    };

    let (attempt, window) = request.into_attempt(now);

    let start = Instant::now();
    let decision = state.gate.evaluate(&attempt, &window);
    let latency_us = start.elapsed().as_micros() as u64;
    state.metrics.record_decision(decision, latency_us);

    log_decision(state, &attempt, &window, decision, latency_us);

    let response = CheckInResponse::from(decision);
    match serde_json::to_string(&response) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "checkin_response_encode_error");
            (StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"internal"}"#.to_string())
        }
    }
}

fn log_decision(
    state: &ApiState,
    attempt: &CheckInAttempt,
    window: &ActivityWindow,
    decision: Decision,
    latency_us: u64,
) {
    match decision {
        Decision::Accepted => {
            info!(latency_us = %latency_us, at = %attempt.timestamp, "checkin_accepted");
        }
        Decision::Rejected(RejectionReason::OutOfZone) => {
            match state.gate.geofence().nearest_zone(attempt.location) {
                Some((zone, dist_km)) => info!(
                    reason = %RejectionReason::OutOfZone,
                    nearest_zone = %zone.name,
                    distance_km = format!("{:.3}", dist_km),
                    radius_km = %zone.radius_km,
                    "checkin_rejected"
                ),
                None => info!(
                    reason = %RejectionReason::OutOfZone,
                    valid_location = %attempt.location.is_valid(),
                    "checkin_rejected"
                ),
            }
        }
        Decision::Rejected(RejectionReason::OutsideTimeWindow) => info!(
            reason = %RejectionReason::OutsideTimeWindow,
            at = %attempt.timestamp,
            window_start = %window.start,
            window_end = %window.end,
            "checkin_rejected"
        ),
        Decision::Rejected(reason) => info!(reason = %reason, "checkin_rejected"),
    }
}

fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .expect("static response should not fail")
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<ApiState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (&method, path.as_str()) {
        (&Method::POST, "/checkin") => {
            let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    state.metrics.record_malformed();
                    warn!(error = %e, "checkin_body_read_error");
                    return Ok(json_response(StatusCode::BAD_REQUEST, MALFORMED_BODY.to_string()));
                }
            };
            let (status, body) = handle_checkin(&state, &body, Utc::now());
            Ok(json_response(status, body))
        }
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(&state.metrics, &state.site_id);
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail"))
        }
        (&Method::GET, "/health") => Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("ok")))
            .expect("static response should not fail")),
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .expect("static response should not fail")),
    }
}

/// Bind `addr` and serve until shutdown
pub async fn start_api_server(
    addr: &str,
    state: Arc<ApiState>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, site = %state.site_id, "checkin_api_started");
    serve(listener, state, shutdown).await
}

/// Accept loop over an already bound listener
pub async fn serve(
    listener: TcpListener,
    state: Arc<ApiState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "checkin_api_connection");
                        let io = TokioIo::new(stream);
                        let state = state.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let state = state.clone();
                                async move { handle_request(req, state).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "checkin_api_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "checkin_api_accept_error");
                    }
                }
            }
            changed = shutdown.changed() => {
                // A dropped sender also means shutdown
                if changed.is_err() || *shutdown.borrow() {
                    info!("checkin_api_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
