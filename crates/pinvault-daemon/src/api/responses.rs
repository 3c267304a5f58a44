use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPinRequest {
    pub customer_id: String,
    pub pin_hash: String,
    pub salt: String,
}

#[derive(Serialize)]
pub struct RegisterPinResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub proof: String,
    pub public_signals: Vec<String>,
    pub amount: u64,
    pub merchant_id: String,
    pub customer_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub verified: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvePaymentRequest {
    pub pin: String,
    pub salt: String,
    pub nonce: String,
    pub amount: u64,
    /// When set, the proof is generated against this customer's
    /// registered commitment and fails early on a wrong PIN.
    #[serde(default)]
    pub customer_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvePaymentResponse {
    pub job_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofStatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_signals: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub status: String,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub registered_customers: usize,
    pub settled_payments: usize,
    pub pending_proof_jobs: usize,
    pub vk_hash: String,
    pub uptime_secs: u64,
}
