//! # Device-Proof Middleware
//!
//! Staff devices sign every sensitive request with their enrolled Ed25519
//! key. The proof travels in four headers:
//!
//! | Header | Content |
//! |--------|---------|
//! | `X-Device-Key` | Device id, looked up in the registry |
//! | `X-Device-Timestamp` | Unix seconds, decimal |
//! | `X-Device-Nonce` | Single-use token id |
//! | `X-Device-Proof` | Base64 signature over the canonical message |
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. all four headers present (401 `DEVICE_PROOF_MISSING`)
//! 2. header values well-formed (401 `DEVICE_PROOF_INVALID`)
//! 3. timestamp within the skew window (401 `DEVICE_PROOF_SKEW`)
//! 4. device enrolled and enabled (403 `DEVICE_DISABLED`)
//! 5. `X-Tenant-Id`, when sent, matches the device's tenant (401)
//! 6. nonce not seen before (409 `DEVICE_PROOF_REPLAY`)
//! 7. signature verifies (401 `DEVICE_PROOF_INVALID`)
//!
//! The nonce is consumed before the signature is even decoded, so a
//! captured nonce buys exactly one verification attempt whatever the proof
//! looks like. Every `DEVICE_PROOF_INVALID` response carries the same
//! detail; the concrete reason only reaches the logs. Registry and
//! replay-store failures fail closed with 503.
//!
//! Signed values (timestamp, nonce, proof) are taken byte-for-byte from the
//! headers. A timestamp must be plain decimal and a nonce must not carry
//! surrounding whitespace, so each proof has a single valid encoding.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use lt_core::{CanonicalMessage, DeviceId, Jti, TenantId, Timestamp};
use lt_crypto::{verify_with_key, DeviceSignature};

use super::{header_raw, header_str, route_id, tenant_header};
use crate::error::AppError;
use crate::state::AppState;
use crate::telemetry::{AuditEvent, DEVICE_PROOF_FAILED};

/// Device id header.
pub const DEVICE_KEY_HEADER: &str = "x-device-key";
/// Signing timestamp header.
pub const DEVICE_TIMESTAMP_HEADER: &str = "x-device-timestamp";
/// Signature header.
pub const DEVICE_PROOF_HEADER: &str = "x-device-proof";
/// Nonce header.
pub const DEVICE_NONCE_HEADER: &str = "x-device-nonce";

/// The device that signed the current request. Present in request
/// extensions once the proof has been accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedDevice {
    /// Tenant the device is enrolled under.
    pub tenant_id: TenantId,
    /// Device id.
    pub device_id: DeviceId,
}

impl<S: Send + Sync> FromRequestParts<S> for VerifiedDevice {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedDevice>()
            .cloned()
            .ok_or_else(|| AppError::Internal("device proof guard is not installed".into()))
    }
}

struct ProofHeaders<'a> {
    device_key: &'a str,
    timestamp: &'a str,
    nonce: &'a str,
    proof: &'a str,
}

impl<'a> ProofHeaders<'a> {
    fn read(headers: &'a HeaderMap) -> Result<Self, AppError> {
        let device_key = header_str(headers, DEVICE_KEY_HEADER);
        let timestamp = header_raw(headers, DEVICE_TIMESTAMP_HEADER);
        let nonce = header_raw(headers, DEVICE_NONCE_HEADER);
        let proof = header_raw(headers, DEVICE_PROOF_HEADER);
        match (device_key, timestamp, nonce, proof) {
            (Some(device_key), Some(timestamp), Some(nonce), Some(proof)) => Ok(Self {
                device_key,
                timestamp,
                nonce,
                proof,
            }),
            _ => {
                let missing: Vec<&str> = [
                    ("X-Device-Key", device_key),
                    ("X-Device-Timestamp", timestamp),
                    ("X-Device-Nonce", nonce),
                    ("X-Device-Proof", proof),
                ]
                .iter()
                .filter(|(_, v)| v.is_none())
                .map(|(name, _)| *name)
                .collect();
                Err(AppError::DeviceProofMissing(format!(
                    "missing {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

/// Verify the device proof and stash a [`VerifiedDevice`] for the handler.
pub async fn device_proof_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let route = route_id(&request);
    let now = state.clock.now();
    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();

    match verify_proof(&state, &method, &path, request.headers(), now).await {
        Ok(device) => {
            tracing::debug!(
                route = %route,
                tenant_id = %device.tenant_id,
                device_id = %device.device_id,
                "device proof accepted"
            );
            request.extensions_mut().insert(device);
            next.run(request).await
        }
        Err(err) => {
            record_failure(&state, &route, request.headers(), now, &err);
            err.into_response()
        }
    }
}

fn record_failure(state: &AppState, route: &str, headers: &HeaderMap, now: Timestamp, err: &AppError) {
    let (_, code) = err.status_and_code();
    let device_id = header_str(headers, DEVICE_KEY_HEADER).and_then(|v| DeviceId::new(v).ok());
    let tenant_id = header_str(headers, super::TENANT_HEADER).and_then(|v| TenantId::new(v).ok());

    if !matches!(err, AppError::ServiceUnavailable(_) | AppError::Internal(_)) {
        state.metrics.increment(
            DEVICE_PROOF_FAILED,
            &[("route", route.to_string()), ("reason", code.to_string())],
        );
        tracing::warn!(
            route,
            device_id = device_id.as_ref().map(DeviceId::as_str),
            reason = code,
            detail = %err,
            "device proof rejected"
        );
    }
    state.audit.audit(
        AuditEvent::new("device_proof.rejected", route, now)
            .tenant(tenant_id.as_ref())
            .device(device_id.as_ref())
            .reason(code),
    );
}

async fn verify_proof(
    state: &AppState,
    method: &str,
    path: &str,
    headers: &HeaderMap,
    now: Timestamp,
) -> Result<VerifiedDevice, AppError> {
    let proof = ProofHeaders::read(headers)?;

    let device_id = DeviceId::new(proof.device_key)
        .map_err(|e| AppError::DeviceProofInvalid(format!("X-Device-Key: {e}")))?;
    let nonce = Jti::new(proof.nonce)
        .map_err(|e| AppError::DeviceProofInvalid(format!("X-Device-Nonce: {e}")))?;
    if nonce.as_str() != proof.nonce {
        return Err(AppError::DeviceProofInvalid(
            "X-Device-Nonce: surrounding whitespace".into(),
        ));
    }
    let signed_at = Timestamp::parse_epoch_secs(proof.timestamp)
        .map_err(|e| AppError::DeviceProofInvalid(format!("X-Device-Timestamp: {e}")))?;
    if signed_at.epoch_secs().to_string() != proof.timestamp {
        return Err(AppError::DeviceProofInvalid(
            "X-Device-Timestamp: not plain decimal seconds".into(),
        ));
    }

    let max_secs = state.config.device_skew_secs;
    let skew_secs = now.abs_diff_secs(&signed_at);
    if skew_secs > max_secs {
        return Err(AppError::DeviceProofSkew {
            skew_secs,
            max_secs,
        });
    }

    let record = state
        .devices
        .find(&device_id)
        .await
        .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?;
    let record = match record {
        Some(record) if record.enabled => record,
        _ => return Err(AppError::DeviceDisabled),
    };

    if let Some(claimed) = tenant_header(headers)
        .map_err(|e| AppError::DeviceProofInvalid(format!("X-Tenant-Id: {e}")))?
    {
        if claimed != record.tenant_id {
            return Err(AppError::DeviceProofInvalid(
                "device is not enrolled for this tenant".into(),
            ));
        }
    }

    let message = CanonicalMessage::try_build(method, path, proof.timestamp, nonce.as_str())
        .map_err(|e| AppError::DeviceProofInvalid(e.to_string()))?;

    let jti = nonce.namespaced(&["device-proof", device_id.as_str()]);
    let verdict = state
        .replay
        .consume(&record.tenant_id, &jti, state.config.device_nonce_ttl_secs(), now)
        .await
        .map_err(|e| {
            if e.is_unavailable() {
                AppError::ServiceUnavailable(e.to_string())
            } else {
                AppError::Internal(e.to_string())
            }
        })?;
    if !verdict.is_fresh() {
        return Err(AppError::DeviceProofReplay);
    }

    let signature = DeviceSignature::from_base64(proof.proof)
        .map_err(|e| AppError::DeviceProofInvalid(format!("X-Device-Proof: {e}")))?;
    if !verify_with_key(&record.public_key, &signature, &message) {
        return Err(AppError::DeviceProofInvalid(
            "signature verification failed".into(),
        ));
    }

    Ok(VerifiedDevice {
        tenant_id: record.tenant_id,
        device_id,
    })
}
