//! HTTP/1.1 request handling for the daemon API.

use super::responses::*;
use crate::orchestrator::{parse_hex_32, Orchestrator};
use crate::worker::{JobStatus, ProofWorker};
use pinvault_circuit::prover::PaymentWitness;
use pinvault_types::{PinVaultError, PinVaultResult};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;
use uuid::Uuid;

const MAX_BODY_BYTES: usize = 256 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn handle_request(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    orchestrator: Arc<Orchestrator>,
    worker: Arc<ProofWorker>,
    started_at: Instant,
) -> PinVaultResult<()> {
    let mut reader = BufReader::new(&mut stream);
    let mut request_line = String::new();

    match tokio::time::timeout(READ_TIMEOUT, reader.read_line(&mut request_line)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            return send_error_response(
                &mut stream,
                400,
                "BAD_REQUEST",
                &format!("Failed to read request: {e}"),
            )
            .await;
        }
        Err(_) => {
            return send_error_response(&mut stream, 408, "TIMEOUT", "Request timeout").await;
        }
    }

    let parts: Vec<&str> = request_line.trim().split_whitespace().collect();
    if parts.len() < 2 {
        return send_error_response(&mut stream, 400, "BAD_REQUEST", "Invalid request line").await;
    }
    let method = parts[0].to_string();
    let path = parts[1].to_string();
    debug!(%method, %path, %peer_addr, "api request");

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        match tokio::time::timeout(READ_TIMEOUT, reader.read_line(&mut line)).await {
            Ok(Ok(_)) => {
                let line = line.trim();
                if line.is_empty() {
                    break;
                }
                if let Some(value) = line
                    .strip_prefix("Content-Length:")
                    .or_else(|| line.strip_prefix("content-length:"))
                {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
            Ok(Err(e)) => {
                return send_error_response(
                    &mut stream,
                    400,
                    "BAD_REQUEST",
                    &format!("Failed to read headers: {e}"),
                )
                .await;
            }
            Err(_) => {
                return send_error_response(&mut stream, 408, "TIMEOUT", "Header read timeout")
                    .await;
            }
        }
    }

    let body = if method == "POST" {
        if content_length > MAX_BODY_BYTES {
            return send_error_response(
                &mut stream,
                413,
                "PAYLOAD_TOO_LARGE",
                "Request body too large",
            )
            .await;
        }
        let mut body = vec![0u8; content_length];
        match tokio::time::timeout(READ_TIMEOUT, reader.read_exact(&mut body)).await {
            Ok(Ok(_)) => {}
            _ => {
                return send_error_response(&mut stream, 400, "BAD_REQUEST", "Truncated body")
                    .await;
            }
        }
        String::from_utf8_lossy(&body).into_owned()
    } else {
        String::new()
    };

    match (method.as_str(), path.as_str()) {
        ("POST", "/register-pin") => register_pin(&mut stream, &orchestrator, &body).await,
        ("POST", "/verify-payment") => verify_payment(&mut stream, &orchestrator, &body).await,
        ("POST", "/prove-payment") => {
            prove_payment(&mut stream, &orchestrator, &worker, &body).await
        }
        ("GET", path) if path.starts_with("/proof-status/") => {
            proof_status(&mut stream, &worker, path.trim_start_matches("/proof-status/")).await
        }
        ("GET", "/health") => serve_health(&mut stream, started_at).await,
        ("GET", "/status") => serve_status(&mut stream, &orchestrator, &worker, started_at).await,
        (method, path) => {
            send_error_response(
                &mut stream,
                404,
                "NOT_FOUND",
                &format!("Endpoint not found: {method} {path}"),
            )
            .await
        }
    }
}

async fn register_pin(
    stream: &mut TcpStream,
    orchestrator: &Arc<Orchestrator>,
    body: &str,
) -> PinVaultResult<()> {
    let request: RegisterPinRequest = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(e) => {
            return send_error_response(stream, 400, "BAD_REQUEST", &format!("Invalid JSON: {e}"))
                .await;
        }
    };

    match orchestrator
        .register_pin(&request.customer_id, &request.pin_hash, &request.salt)
        .await
    {
        Ok(_) => {
            send_json(stream, 200, &RegisterPinResponse { status: "success".into(), error: None })
                .await
        }
        Err(err) => {
            send_json(
                stream,
                400,
                &RegisterPinResponse { status: "error".into(), error: Some(err.to_string()) },
            )
            .await
        }
    }
}

async fn verify_payment(
    stream: &mut TcpStream,
    orchestrator: &Arc<Orchestrator>,
    body: &str,
) -> PinVaultResult<()> {
    let request: VerifyPaymentRequest = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(e) => {
            return send_error_response(stream, 400, "BAD_REQUEST", &format!("Invalid JSON: {e}"))
                .await;
        }
    };

    let outcome = orchestrator
        .verify_payment(
            &request.proof,
            &request.public_signals,
            request.amount,
            &request.merchant_id,
            &request.customer_id,
        )
        .await;

    send_json(
        stream,
        200,
        &VerifyPaymentResponse {
            verified: outcome.settled,
            message: outcome.reason,
            tx_id: outcome.tx_id,
        },
    )
    .await
}

async fn prove_payment(
    stream: &mut TcpStream,
    orchestrator: &Arc<Orchestrator>,
    worker: &Arc<ProofWorker>,
    body: &str,
) -> PinVaultResult<()> {
    let request: ProvePaymentRequest = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(e) => {
            return send_error_response(stream, 400, "BAD_REQUEST", &format!("Invalid JSON: {e}"))
                .await;
        }
    };

    let witness = match build_witness(orchestrator, &request).await {
        Ok(witness) => witness,
        Err(err) => {
            return send_error_response(stream, 400, "BAD_REQUEST", &err.to_string()).await;
        }
    };

    let job_id = worker.submit(witness).await;
    send_json(stream, 202, &ProvePaymentResponse { job_id: job_id.to_string() }).await
}

async fn build_witness(
    orchestrator: &Arc<Orchestrator>,
    request: &ProvePaymentRequest,
) -> PinVaultResult<PaymentWitness> {
    let pin = parse_hex_32(&request.pin, "pin")?;
    let salt = parse_hex_32(&request.salt, "salt")?;
    let nonce = parse_hex_32(&request.nonce, "nonce")?;

    match &request.customer_id {
        Some(customer_id) => {
            let commitment = orchestrator.registered_commitment(customer_id).await?;
            Ok(PaymentWitness::against(pin, salt, nonce, request.amount, commitment))
        }
        None => Ok(PaymentWitness::new(pin, salt, nonce, request.amount)),
    }
}

async fn proof_status(
    stream: &mut TcpStream,
    worker: &Arc<ProofWorker>,
    job_id: &str,
) -> PinVaultResult<()> {
    let Ok(job_id) = Uuid::parse_str(job_id) else {
        return send_error_response(stream, 400, "BAD_REQUEST", "Invalid job id").await;
    };

    // Terminal results are handed out exactly once; claiming them here
    // keeps the job map from growing without bound.
    match worker.claim(&job_id).await {
        None => send_error_response(stream, 404, "NOT_FOUND", "Unknown job id").await,
        Some(JobStatus::Pending) => {
            send_json(
                stream,
                200,
                &ProofStatusResponse {
                    status: "pending".into(),
                    proof: None,
                    public_signals: None,
                    error: None,
                },
            )
            .await
        }
        Some(JobStatus::Completed { proof, public_signals }) => {
            send_json(
                stream,
                200,
                &ProofStatusResponse {
                    status: "completed".into(),
                    proof: Some(proof),
                    public_signals: Some(public_signals),
                    error: None,
                },
            )
            .await
        }
        Some(JobStatus::Failed { error }) => {
            send_json(
                stream,
                200,
                &ProofStatusResponse {
                    status: "failed".into(),
                    proof: None,
                    public_signals: None,
                    error: Some(error),
                },
            )
            .await
        }
    }
}

async fn serve_health(stream: &mut TcpStream, started_at: Instant) -> PinVaultResult<()> {
    send_json(
        stream,
        200,
        &HealthResponse {
            healthy: true,
            status: "running".into(),
            uptime_secs: started_at.elapsed().as_secs(),
        },
    )
    .await
}

async fn serve_status(
    stream: &mut TcpStream,
    orchestrator: &Arc<Orchestrator>,
    worker: &Arc<ProofWorker>,
    started_at: Instant,
) -> PinVaultResult<()> {
    send_json(
        stream,
        200,
        &StatusResponse {
            registered_customers: orchestrator.registered_count().await,
            settled_payments: orchestrator.settled_count().await,
            pending_proof_jobs: worker.pending_count().await,
            vk_hash: orchestrator.vk_hash().to_string(),
            uptime_secs: started_at.elapsed().as_secs(),
        },
    )
    .await
}

async fn send_json<T: Serialize>(
    stream: &mut TcpStream,
    status: u16,
    body: &T,
) -> PinVaultResult<()> {
    let body = serde_json::to_string(body)
        .map_err(|e| PinVaultError::Serialization(format!("response: {e}")))?;
    send_response(stream, status, "application/json", &body).await
}

pub async fn send_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &str,
) -> PinVaultResult<()> {
    let status_text = match status {
        200 => "OK",
        202 => "Accepted",
        400 => "Bad Request",
        404 => "Not Found",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    };

    let response = format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: {}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        status_text,
        content_type,
        body.len(),
        body
    );

    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| PinVaultError::Network(format!("Failed to send response: {e}")))?;
    Ok(())
}

pub async fn send_error_response(
    stream: &mut TcpStream,
    status: u16,
    code: &str,
    message: &str,
) -> PinVaultResult<()> {
    let body = serde_json::json!({
        "error": {
            "code": code,
            "message": message,
            "status": status
        }
    });
    send_response(stream, status, "application/json", &body.to_string()).await
}
