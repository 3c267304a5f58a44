use super::handlers::handle_request;
use crate::orchestrator::Orchestrator;
use crate::worker::ProofWorker;
use pinvault_types::{PinVaultError, PinVaultResult};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

pub struct ApiServer {
    addr: SocketAddr,
    running: Arc<RwLock<bool>>,
    shutdown: watch::Sender<bool>,
    orchestrator: Arc<Orchestrator>,
    worker: Arc<ProofWorker>,
    started_at: Instant,
}

impl ApiServer {
    pub fn new(addr: SocketAddr, orchestrator: Arc<Orchestrator>, worker: Arc<ProofWorker>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            addr,
            running: Arc::new(RwLock::new(false)),
            shutdown,
            orchestrator,
            worker,
            started_at: Instant::now(),
        }
    }

    /// Bind and start serving. Returns the actual bound address, which
    /// differs from the configured one when port 0 was requested.
    pub async fn start(&self) -> PinVaultResult<SocketAddr> {
        if *self.running.read().await {
            return Err(PinVaultError::Internal("API server already running".into()));
        }

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| PinVaultError::Network(format!("Failed to bind API server: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| PinVaultError::Network(format!("Failed to read bound address: {e}")))?;

        info!("API server listening on http://{}", local_addr);
        *self.running.write().await = true;
        let _ = self.shutdown.send(false);
        let mut shutdown_rx = self.shutdown.subscribe();

        let orchestrator = self.orchestrator.clone();
        let worker = self.worker.clone();
        let started_at = self.started_at;

        tokio::spawn(async move {
            loop {
                // Breaking out drops the listener, so no connection is
                // accepted after shutdown is signalled.
                let accepted = tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    accepted = listener.accept() => accepted,
                };

                match accepted {
                    Ok((stream, addr)) => {
                        debug!("API request from {}", addr);
                        let orchestrator = orchestrator.clone();
                        let worker = worker.clone();

                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_request(stream, addr, orchestrator, worker, started_at)
                                    .await
                            {
                                if !e.to_string().contains("connection reset")
                                    && !e.to_string().contains("broken pipe")
                                {
                                    warn!("API request error from {}: {}", addr, e);
                                }
                            }
                        });
                    }
                    Err(e) => {
                        error!("API accept error: {}", e);
                    }
                }
            }
        });

        Ok(local_addr)
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
        let _ = self.shutdown.send(true);
        info!("API server stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DaemonConfig;
    use pinvault_circuit::fixtures;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn started_server() -> (ApiServer, SocketAddr) {
        let orchestrator = Arc::new(Orchestrator::new(
            fixtures::prepared_vk(),
            "test-vk-hash".into(),
            &DaemonConfig::default(),
        ));
        let worker = Arc::new(ProofWorker::new(Arc::new(fixtures::proving_key().clone())));

        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let server = ApiServer::new(addr, orchestrator, worker);
        let bound = server.start().await.unwrap();
        (server, bound)
    }

    async fn roundtrip(addr: SocketAddr, request: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (_server, addr) = started_server().await;
        let response = roundtrip(
            addr,
            "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("\"healthy\":true"));
    }

    #[tokio::test]
    async fn test_register_pin_endpoint() {
        let (_server, addr) = started_server().await;
        let body = serde_json::json!({
            "customerId": "cust_1",
            "pinHash": hex::encode([0xAAu8; 32]),
            "salt": hex::encode([0xBBu8; 32]),
        })
        .to_string();
        let request = format!(
            "POST /register-pin HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );

        let response = roundtrip(addr, &request).await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("\"status\":\"success\""));
    }

    #[tokio::test]
    async fn test_unknown_endpoint_is_404() {
        let (_server, addr) = started_server().await;
        let response = roundtrip(
            addr,
            "GET /nope HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 404"));
    }

    #[tokio::test]
    async fn test_stop_refuses_new_connections() {
        let (server, addr) = started_server().await;
        assert!(tokio::net::TcpStream::connect(addr).await.is_ok());

        server.stop().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!server.is_running().await);
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_proof_status_is_consumed_once_finished() {
        let (_server, addr) = started_server().await;
        let body = serde_json::json!({
            "pin": hex::encode([0x11u8; 32]),
            "salt": hex::encode([0x22u8; 32]),
            "nonce": hex::encode([0x33u8; 32]),
            "amount": 250u64,
        })
        .to_string();
        let request = format!(
            "POST /prove-payment HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );

        let response = roundtrip(addr, &request).await;
        assert!(response.starts_with("HTTP/1.1 202"));
        let accepted: serde_json::Value =
            serde_json::from_str(response.split("\r\n\r\n").nth(1).unwrap()).unwrap();
        let job_id = accepted["jobId"].as_str().unwrap().to_string();

        let status_request = format!(
            "GET /proof-status/{job_id} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
        );
        let mut finished = None;
        for _ in 0..600 {
            let response = roundtrip(addr, &status_request).await;
            if response.contains("\"status\":\"pending\"") {
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
            finished = Some(response);
            break;
        }
        let finished = finished.expect("proof job did not finish");
        assert!(finished.contains("\"status\":\"completed\""));
        assert!(finished.contains("\"proof\":"));

        // The terminal result was claimed by the successful poll, so the
        // job no longer exists server-side.
        let response = roundtrip(addr, &status_request).await;
        assert!(response.starts_with("HTTP/1.1 404"));
    }
}
