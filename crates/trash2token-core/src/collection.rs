//! ============================================================================
//! Collection Service - Claim, verify and reward collection tasks
//! ============================================================================
//! pending --claim--> in_progress --accepted verification--> verified
//!
//! A rejected or failed verification never writes. An accepted one settles
//! the status change, audit record and reward in a single transaction.
//! ============================================================================

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::{ClaimOutcome, CollectedWaste, CollectionTask, Reward, TaskStatus, User, WasteDb};
use crate::types::{CollectionVerification, WorkflowError};
use crate::verification::{roll_reward, CollectionDecision, EncodedImage, Verifier};

/// Result of a completed verification attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CollectionOutcome {
    Verified {
        task: CollectionTask,
        reward: Reward,
        collected: CollectedWaste,
        result: CollectionVerification,
    },
    /// Model answered but the photo does not match the report; task unchanged
    LowConfidenceRejected {
        task: CollectionTask,
        result: CollectionVerification,
    },
}

impl CollectionOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Verified { reward, .. } => {
                format!("Verification successful! You earned {} tokens!", reward.amount)
            }
            Self::LowConfidenceRejected { .. } => {
                "Verification failed. The collected waste does not match the reported waste.".to_string()
            }
        }
    }
}

/// Claim a task. Needs no model, so it is usable without a verifier.
pub fn claim_task(db: &WasteDb, task_id: u64, collector: &User) -> Result<CollectionTask, WorkflowError> {
    match db.claim_task(task_id, collector.id)? {
        ClaimOutcome::Claimed(task) => Ok(task),
        ClaimOutcome::Unavailable(task) => {
            warn!(
                "Collector {} cannot claim task {} ({})",
                collector.id, task_id, task.status
            );
            Err(WorkflowError::TaskNotClaimable {
                task_id,
                status: task.status,
            })
        }
        ClaimOutcome::NotFound => Err(WorkflowError::TaskNotFound(task_id)),
    }
}

pub struct CollectionService {
    db: Arc<WasteDb>,
    verifier: Arc<Verifier>,
}

impl CollectionService {
    pub fn new(db: Arc<WasteDb>, verifier: Arc<Verifier>) -> Self {
        Self { db, verifier }
    }

    /// Start collection: pending -> in_progress for this collector.
    pub fn claim_task(&self, task_id: u64, collector: &User) -> Result<CollectionTask, WorkflowError> {
        claim_task(&self.db, task_id, collector)
    }

    /// Verify a collection photo for a task the collector holds.
    pub async fn verify_collection(
        &self,
        task_id: u64,
        collector: &User,
        image: &EncodedImage,
    ) -> Result<CollectionOutcome, WorkflowError> {
        let task = self.claimed_task(task_id, collector)?;

        let assessment = self
            .verifier
            .verify_collection(image, &task.waste_type, &task.amount)
            .await?;

        if assessment.decision != CollectionDecision::Accepted {
            info!("Task {} stays in progress: verification rejected", task_id);
            return Ok(CollectionOutcome::LowConfidenceRejected {
                task,
                result: assessment.result,
            });
        }

        let amount = roll_reward(&mut rand::thread_rng());
        let verification = serde_json::to_string(&assessment.result)
            .map_err(|e| WorkflowError::Storage(format!("Failed to serialize verification: {}", e)))?;

        let settlement = self
            .db
            .complete_verification(task_id, collector.id, &verification, amount)?;

        Ok(CollectionOutcome::Verified {
            task: settlement.task,
            reward: settlement.reward,
            collected: settlement.collected,
            result: assessment.result,
        })
    }

    /// The task, provided `collector` is the one holding it.
    fn claimed_task(&self, task_id: u64, collector: &User) -> Result<CollectionTask, WorkflowError> {
        let task = self
            .db
            .get_task(task_id)?
            .ok_or(WorkflowError::TaskNotFound(task_id))?;

        if task.status != TaskStatus::InProgress {
            return Err(WorkflowError::TaskNotInProgress {
                task_id,
                status: task.status,
            });
        }
        if task.collector_id != Some(collector.id) {
            return Err(WorkflowError::ClaimedByAnotherCollector(task_id));
        }
        Ok(task)
    }
}
