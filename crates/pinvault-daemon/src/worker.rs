//! Background proof generation.
//!
//! Groth16 proving is CPU-bound and can take seconds on larger
//! circuits, so it never runs on the request path. Callers submit a
//! witness, get a job id back immediately, and poll for the result.
//! A timed-out or abandoned job just leaves its result unclaimed;
//! proving has no side effects until the caller settles the proof.

use ark_bn254::Bn254;
use ark_groth16::ProvingKey;
use pinvault_circuit::prover::{
    generate_payment_proof, proof_to_hex, signals_to_hex, PaymentWitness,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub enum JobStatus {
    Pending,
    Completed { proof: String, public_signals: Vec<String> },
    Failed { error: String },
}

pub struct ProofWorker {
    proving_key: Arc<ProvingKey<Bn254>>,
    jobs: Arc<RwLock<HashMap<Uuid, JobStatus>>>,
}

impl ProofWorker {
    pub fn new(proving_key: Arc<ProvingKey<Bn254>>) -> Self {
        Self { proving_key, jobs: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Queue one proof generation. Returns immediately with the job id;
    /// the witness moves into the blocking task and is zeroized when
    /// proving finishes.
    pub async fn submit(&self, witness: PaymentWitness) -> Uuid {
        let job_id = Uuid::new_v4();
        self.jobs.write().await.insert(job_id, JobStatus::Pending);

        let proving_key = Arc::clone(&self.proving_key);
        let jobs = Arc::clone(&self.jobs);
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                let (proof, signals) = generate_payment_proof(&proving_key, &witness)?;
                let proof_hex = proof_to_hex(&proof)?;
                Ok::<_, pinvault_types::PinVaultError>((proof_hex, signals_to_hex(&signals)))
            })
            .await;

            let status = match result {
                Ok(Ok((proof, public_signals))) => {
                    info!(%job_id, "proof generated");
                    JobStatus::Completed { proof, public_signals }
                }
                Ok(Err(err)) => {
                    info!(%job_id, error = %err, "proof generation rejected");
                    JobStatus::Failed { error: err.to_string() }
                }
                Err(join_err) => {
                    error!(%job_id, error = %join_err, "proof task panicked");
                    JobStatus::Failed { error: "proof generation aborted".into() }
                }
            };
            jobs.write().await.insert(job_id, status);
        });

        job_id
    }

    /// Look up a job. Completed and failed results stay until claimed.
    pub async fn status(&self, job_id: &Uuid) -> Option<JobStatus> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Remove a finished job, returning its final status. Pending jobs
    /// are left in place.
    pub async fn claim(&self, job_id: &Uuid) -> Option<JobStatus> {
        let mut jobs = self.jobs.write().await;
        match jobs.get(job_id) {
            Some(JobStatus::Pending) => Some(JobStatus::Pending),
            Some(_) => jobs.remove(job_id),
            None => None,
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|s| matches!(s, JobStatus::Pending))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinvault_circuit::fixtures;
    use pinvault_circuit::poseidon::pin_commitment;
    use pinvault_circuit::prover::proof_from_hex;
    use pinvault_circuit::verifier;
    use std::time::Duration;

    fn worker() -> ProofWorker {
        ProofWorker::new(Arc::new(fixtures::proving_key().clone()))
    }

    async fn wait_for_completion(worker: &ProofWorker, job_id: &Uuid) -> JobStatus {
        for _ in 0..600 {
            match worker.status(job_id).await {
                Some(JobStatus::Pending) => tokio::time::sleep(Duration::from_millis(50)).await,
                Some(status) => return status,
                None => panic!("job disappeared"),
            }
        }
        panic!("job did not finish");
    }

    #[tokio::test]
    async fn test_submit_and_poll() {
        let worker = worker();
        let witness = PaymentWitness::new([1u8; 32], [2u8; 32], [3u8; 32], 120);
        let job_id = worker.submit(witness).await;

        let status = wait_for_completion(&worker, &job_id).await;
        let JobStatus::Completed { proof, public_signals } = status else {
            panic!("expected completion, got {status:?}");
        };

        // Result verifies against the same key
        let proof = proof_from_hex(&proof).unwrap();
        let signals =
            pinvault_circuit::prover::signals_from_hex(&public_signals).unwrap();
        assert!(verifier::verify(&fixtures::prepared_vk(), &signals, &proof));
    }

    #[tokio::test]
    async fn test_wrong_pin_job_fails() {
        let worker = worker();
        let registered = pin_commitment(&[0x11; 32], &[0x22; 32]);
        let witness =
            PaymentWitness::against([0x99; 32], [0x22; 32], [5u8; 32], 120, registered);
        let job_id = worker.submit(witness).await;

        let status = wait_for_completion(&worker, &job_id).await;
        assert!(matches!(status, JobStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_claim_removes_finished_job() {
        let worker = worker();
        let witness = PaymentWitness::new([1u8; 32], [2u8; 32], [6u8; 32], 120);
        let job_id = worker.submit(witness).await;

        wait_for_completion(&worker, &job_id).await;
        assert!(worker.claim(&job_id).await.is_some());
        assert!(worker.status(&job_id).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let worker = worker();
        assert!(worker.status(&Uuid::new_v4()).await.is_none());
    }
}
