//! ============================================================================
//! Database Types - Serializable records for redb storage
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Role attached to a user account.
/// Gates report generation and settings editing in callers; the core never
/// enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum UserRole {
    Reporter,
    Collector,
    Authority,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reporter => "Reporter",
            Self::Collector => "Collector",
            Self::Authority => "Authority",
            Self::Admin => "Admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reporter" => Ok(Self::Reporter),
            "collector" => Ok(Self::Collector),
            "authority" => Ok(Self::Authority),
            "admin" => Ok(Self::Admin),
            _ => Err(format!(
                "Unknown role '{}'. Valid values: reporter, collector, authority, admin",
                s
            )),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered user. Identity itself comes from the external provider;
/// this record only links the email to an id, a display name and a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub created_at: i64,
}

/// A waste sighting submitted by a reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: u64,
    pub reporter_id: u64,
    /// Human-readable address
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub waste_type: String,
    /// Unit-qualified amount, e.g. "5kg" or "3 bags"
    pub amount: String,
    pub description: String,
    pub recommendation: String,
    /// `sha256:<hex>` digest of the submitted photo
    pub image_reference: Option<String>,
    /// Model assessment as JSON text
    pub verification_payload: Option<String>,
    pub created_at: i64,
}

/// Fields needed to create a report. Ids and timestamps are assigned by the db.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub reporter_id: u64,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub waste_type: String,
    pub amount: String,
    pub description: String,
    pub recommendation: String,
    pub image_reference: Option<String>,
    pub verification_payload: Option<String>,
}

/// Lifecycle of a collection task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Verified,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Verified => "verified",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in-progress" | "inprogress" | "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "verified" => Ok(Self::Verified),
            _ => Err(format!(
                "Unknown status '{}'. Valid values: pending, in-progress, completed, verified",
                s
            )),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work item derived one-to-one from a report.
/// Location fields are copied from the report so task lists need no join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionTask {
    pub id: u64,
    pub report_id: u64,
    /// None until a collector claims the task
    pub collector_id: Option<u64>,
    pub status: TaskStatus,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub waste_type: String,
    pub amount: String,
    pub created_at: i64,
    /// Set when the collection is verified
    pub collection_date: Option<i64>,
}

/// Audit record of a verified collection. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedWaste {
    pub id: u64,
    pub report_id: u64,
    pub task_id: u64,
    pub collector_id: u64,
    pub collection_date: i64,
    pub status: TaskStatus,
    /// Model assessment that accepted the collection, as JSON text
    pub verification: String,
}

/// Reward ledger entry. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub id: u64,
    pub user_id: u64,
    pub amount: u32,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Reward,
    Report,
}

/// In-app notification shown in the header bell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub user_id: u64,
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    pub created_at: i64,
}

/// Result of a verification settlement: everything written in one transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settlement {
    pub task: CollectionTask,
    pub reward: Reward,
    pub collected: CollectedWaste,
}

/// Outcome of a conditional claim.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed(CollectionTask),
    /// Task exists but is no longer pending; carries the current state
    Unavailable(CollectionTask),
    NotFound,
}

/// Database statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub total_users: usize,
    pub total_reports: usize,
    pub total_tasks: usize,
    pub task_counts: HashMap<String, usize>,
    pub total_collected: usize,
    pub total_rewards: usize,
    pub tokens_issued: u64,
}
