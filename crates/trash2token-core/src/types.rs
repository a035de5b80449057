//! ============================================================================
//! Core Types for Trash2Token
//! ============================================================================
//! Verification results as returned by the vision model. Field names are the
//! model's output contract and are serialized in camelCase.
//! ============================================================================

use serde::{Deserialize, Serialize};

/// Model assessment of a freshly reported waste photo.
/// Example: { "wasteType": "plastic", "quantity": "2kg", "confidence": 0.8, ... }
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportVerification {
    pub waste_type: String,
    /// Estimated quantity with unit
    pub quantity: String,
    /// 0.0 - 1.0
    pub confidence: f64,
    pub description: String,
    pub recommendation: String,
}

impl ReportVerification {
    /// Confidence rounded to a whole percentage for display
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence * 100.0).round() as u32
    }
}

/// Model assessment of a collection photo against the reported waste.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionVerification {
    pub waste_type_match: bool,
    pub quantity_match: bool,
    /// 0.0 - 1.0
    pub confidence: f64,
}

/// Errors surfaced by the reporting and collection workflows
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Task not found: {0}")]
    TaskNotFound(u64),

    #[error("Task {task_id} is {status} and cannot be claimed")]
    TaskNotClaimable { task_id: u64, status: crate::db::TaskStatus },

    #[error("Task {task_id} is {status}; only in-progress tasks can be verified")]
    TaskNotInProgress { task_id: u64, status: crate::db::TaskStatus },

    #[error("Task {0} is in progress by another collector")]
    ClaimedByAnotherCollector(u64),

    #[error(transparent)]
    Verification(#[from] crate::verification::VerificationError),

    #[error(transparent)]
    Image(#[from] crate::verification::ImageError),

    #[error("Please verify the waste before submitting")]
    VerificationRequired,

    #[error("Please specify the waste type and amount manually")]
    ManualFieldsRequired,

    #[error("Please pick a location with coordinates")]
    MissingCoordinates,

    #[error("Location must not be empty")]
    MissingLocation,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for WorkflowError {
    fn from(e: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", e))
    }
}

impl WorkflowError {
    /// Text for the user. Network and parse failures collapse to one retry prompt.
    pub fn user_message(&self) -> String {
        match self {
            Self::Verification(e) => e.user_message().to_string(),
            other => other.to_string(),
        }
    }
}
