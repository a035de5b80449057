// ============================================================================
// WasteDb - Embedded Database (redb)
// ============================================================================
// Persistent storage for users, reports, collection tasks, the reward ledger,
// collected-waste audit records and notifications.
// Default path: ~/.trash2token/trash2token.redb (override via T2T_DB_PATH)
// ============================================================================

pub mod types;

pub use types::{
    ClaimOutcome, CollectedWaste, CollectionTask, DbStats, NewReport, Notification,
    NotificationKind, Report, Reward, Settlement, TaskStatus, User, UserRole,
};

use anyhow::{anyhow, bail, Result};
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

type RecordTable = TableDefinition<'static, u64, &'static [u8]>;

// Table definitions
const USERS: RecordTable = TableDefinition::new("users");
const USER_EMAILS: TableDefinition<&str, u64> = TableDefinition::new("user_emails");
const REPORTS: RecordTable = TableDefinition::new("reports");
const TASKS: RecordTable = TableDefinition::new("tasks");
const COLLECTED: RecordTable = TableDefinition::new("collected_wastes");
const REWARDS: RecordTable = TableDefinition::new("rewards");
const NOTIFICATIONS: RecordTable = TableDefinition::new("notifications");
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Embedded database for Trash2Token
pub struct WasteDb {
    db: Database,
    path: Option<PathBuf>,
}

impl WasteDb {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses T2T_DB_PATH env var or ~/.trash2token/trash2token.redb
    pub fn open(path: Option<&str>) -> Result<Self> {
        let db_path = if let Some(p) = path {
            PathBuf::from(p)
        } else if let Ok(env_path) = std::env::var("T2T_DB_PATH") {
            PathBuf::from(env_path)
        } else {
            let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
            let data_dir = home.join(".trash2token");
            std::fs::create_dir_all(&data_dir)
                .map_err(|e| anyhow!("Failed to create .trash2token directory: {}", e))?;
            data_dir.join("trash2token.redb")
        };

        info!("Opening database at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open database: {}", e))?;

        Self::init(db, Some(db_path))
    }

    /// Open a throwaway database that lives only in memory.
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(|e| anyhow!("Failed to create in-memory database: {}", e))?;

        Self::init(db, None)
    }

    fn init(db: Database, path: Option<PathBuf>) -> Result<Self> {
        // Ensure tables exist by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            for table in [USERS, REPORTS, TASKS, COLLECTED, REWARDS, NOTIFICATIONS] {
                let _ = write_txn
                    .open_table(table)
                    .map_err(|e| anyhow!("Failed to create {} table: {}", table, e))?;
            }
            let _ = write_txn
                .open_table(USER_EMAILS)
                .map_err(|e| anyhow!("Failed to create user_emails table: {}", e))?;
            let _ = write_txn
                .open_table(SEQUENCES)
                .map_err(|e| anyhow!("Failed to create sequences table: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        info!("Database ready");

        Ok(Self { db, path })
    }

    /// Get the database file path (None for in-memory databases)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn begin_write(&self) -> Result<WriteTransaction> {
        self.db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))
    }

    fn get_record<T: DeserializeOwned>(&self, table: RecordTable, id: u64) -> Result<Option<T>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(table)
            .map_err(|e| anyhow!("Failed to open {} table: {}", table, e))?;

        match table.get(id).map_err(|e| anyhow!("Failed to get record {}: {}", id, e))? {
            Some(value) => {
                let record = bincode::deserialize(value.value())
                    .map_err(|e| anyhow!("Failed to deserialize record {}: {}", id, e))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn list_records<T: DeserializeOwned>(&self, table: RecordTable) -> Result<Vec<T>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(table)
            .map_err(|e| anyhow!("Failed to open {} table: {}", table, e))?;

        let mut results = Vec::new();
        let iter = table.iter()
            .map_err(|e| anyhow!("Failed to iterate records: {}", e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            let record = bincode::deserialize(value.value())
                .map_err(|e| anyhow!("Failed to deserialize record: {}", e))?;
            results.push(record);
        }
        Ok(results)
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    pub fn create_user(&self, email: &str, name: &str, role: UserRole) -> Result<User> {
        let email = normalize_email(email);
        if email.is_empty() {
            bail!("Email must not be empty");
        }

        let write_txn = self.begin_write()?;
        let user;
        {
            let mut emails = write_txn.open_table(USER_EMAILS)
                .map_err(|e| anyhow!("Failed to open user_emails table: {}", e))?;
            if emails.get(email.as_str())
                .map_err(|e| anyhow!("Failed to look up email: {}", e))?
                .is_some()
            {
                drop(emails);
                write_txn.abort().map_err(|e| anyhow!("Failed to abort: {}", e))?;
                bail!("User already exists: {}", email);
            }

            user = User {
                id: next_id(&write_txn, "users")?,
                email: email.clone(),
                name: name.to_string(),
                role,
                created_at: chrono::Utc::now().timestamp(),
            };
            emails.insert(email.as_str(), user.id)
                .map_err(|e| anyhow!("Failed to index email: {}", e))?;
            put_record(&write_txn, USERS, user.id, &user)?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        info!("Created user {} ({}, {})", user.id, user.email, user.role);
        Ok(user)
    }

    pub fn get_user(&self, user_id: u64) -> Result<Option<User>> {
        self.get_record(USERS, user_id)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email);

        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let emails = read_txn.open_table(USER_EMAILS)
            .map_err(|e| anyhow!("Failed to open user_emails table: {}", e))?;
        let user_id = emails.get(email.as_str())
            .map_err(|e| anyhow!("Failed to look up email: {}", e))?
            .map(|v| v.value());

        match user_id {
            Some(id) => self.get_user(id),
            None => Ok(None),
        }
    }

    /// Look up a user by email, registering a Reporter on first sight.
    pub fn get_or_create_user(&self, email: &str, name: Option<&str>) -> Result<User> {
        if let Some(user) = self.get_user_by_email(email)? {
            return Ok(user);
        }
        self.create_user(email, name.unwrap_or("Anonymous User"), UserRole::Reporter)
    }

    /// Settings update: display name and role.
    pub fn update_user_details(&self, user_id: u64, name: &str, role: UserRole) -> Result<User> {
        let mut user = self
            .get_user(user_id)?
            .ok_or_else(|| anyhow!("User not found: {}", user_id))?;

        user.name = name.to_string();
        user.role = role;

        let write_txn = self.begin_write()?;
        put_record(&write_txn, USERS, user.id, &user)?;
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Updated user {} details", user_id);
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.list_records(USERS)
    }

    // ========================================================================
    // Report Operations
    // ========================================================================

    /// Store a report together with its pending collection task.
    pub fn create_report(&self, new: NewReport) -> Result<(Report, CollectionTask)> {
        let now = chrono::Utc::now().timestamp();

        let write_txn = self.begin_write()?;
        let report = Report {
            id: next_id(&write_txn, "reports")?,
            reporter_id: new.reporter_id,
            location: new.location,
            latitude: new.latitude,
            longitude: new.longitude,
            waste_type: new.waste_type,
            amount: new.amount,
            description: new.description,
            recommendation: new.recommendation,
            image_reference: new.image_reference,
            verification_payload: new.verification_payload,
            created_at: now,
        };
        let task = CollectionTask {
            id: next_id(&write_txn, "tasks")?,
            report_id: report.id,
            collector_id: None,
            status: TaskStatus::Pending,
            location: report.location.clone(),
            latitude: report.latitude,
            longitude: report.longitude,
            waste_type: report.waste_type.clone(),
            amount: report.amount.clone(),
            created_at: now,
            collection_date: None,
        };
        put_record(&write_txn, REPORTS, report.id, &report)?;
        put_record(&write_txn, TASKS, task.id, &task)?;
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        info!("Created report {} with task {} at {}", report.id, task.id, report.location);
        Ok((report, task))
    }

    pub fn get_report(&self, report_id: u64) -> Result<Option<Report>> {
        self.get_record(REPORTS, report_id)
    }

    pub fn list_reports(&self) -> Result<Vec<Report>> {
        self.list_records(REPORTS)
    }

    /// Most recent reports first.
    pub fn recent_reports(&self, limit: usize) -> Result<Vec<Report>> {
        let mut reports = self.list_reports()?;
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        reports.truncate(limit);
        Ok(reports)
    }

    // ========================================================================
    // Task Operations
    // ========================================================================

    pub fn get_task(&self, task_id: u64) -> Result<Option<CollectionTask>> {
        self.get_record(TASKS, task_id)
    }

    pub fn list_tasks(&self, status_filter: Option<TaskStatus>) -> Result<Vec<CollectionTask>> {
        let tasks: Vec<CollectionTask> = self.list_records(TASKS)?;
        Ok(match status_filter {
            Some(filter) => tasks.into_iter().filter(|t| t.status == filter).collect(),
            None => tasks,
        })
    }

    /// Claim a pending task for a collector.
    /// Only transitions when the task is still pending at write time, so two
    /// collectors racing for one task cannot overwrite each other.
    pub fn claim_task(&self, task_id: u64, collector_id: u64) -> Result<ClaimOutcome> {
        let write_txn = self.begin_write()?;
        let current: Option<CollectionTask> = read_in_txn(&write_txn, TASKS, task_id)?;

        let mut task = match current {
            None => {
                write_txn.abort().map_err(|e| anyhow!("Failed to abort: {}", e))?;
                return Ok(ClaimOutcome::NotFound);
            }
            Some(task) if task.status != TaskStatus::Pending => {
                write_txn.abort().map_err(|e| anyhow!("Failed to abort: {}", e))?;
                debug!("Task {} not claimable, status {}", task_id, task.status);
                return Ok(ClaimOutcome::Unavailable(task));
            }
            Some(task) => task,
        };

        task.status = TaskStatus::InProgress;
        task.collector_id = Some(collector_id);
        put_record(&write_txn, TASKS, task.id, &task)?;
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        info!("Task {} claimed by collector {}", task_id, collector_id);
        Ok(ClaimOutcome::Claimed(task))
    }

    /// Unconditional status write for administrative edits.
    /// Returns None when the task does not exist.
    pub fn update_task_status(
        &self,
        task_id: u64,
        status: TaskStatus,
        collector_id: Option<u64>,
    ) -> Result<Option<CollectionTask>> {
        let mut task = match self.get_task(task_id)? {
            Some(task) => task,
            None => return Ok(None),
        };

        task.status = status;
        if collector_id.is_some() {
            task.collector_id = collector_id;
        }
        if status == TaskStatus::Verified || status == TaskStatus::Completed {
            task.collection_date.get_or_insert(chrono::Utc::now().timestamp());
        }

        let write_txn = self.begin_write()?;
        put_record(&write_txn, TASKS, task.id, &task)?;
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Updated task {} status to {}", task_id, status);
        Ok(Some(task))
    }

    // ========================================================================
    // Settlement
    // ========================================================================

    /// Mark a claimed task verified, append its audit record and credit the
    /// collector, all in one write transaction. Fails without writing anything
    /// unless the task is in progress and held by `collector_id`.
    pub fn complete_verification(
        &self,
        task_id: u64,
        collector_id: u64,
        verification: &str,
        amount: u32,
    ) -> Result<Settlement> {
        let write_txn = self.begin_write()?;
        let current: Option<CollectionTask> = read_in_txn(&write_txn, TASKS, task_id)?;

        let mut task = match current {
            Some(task)
                if task.status == TaskStatus::InProgress
                    && task.collector_id == Some(collector_id) =>
            {
                task
            }
            Some(task) => {
                write_txn.abort().map_err(|e| anyhow!("Failed to abort: {}", e))?;
                bail!(
                    "Task {} cannot be settled: status {}, collector {:?}",
                    task_id,
                    task.status,
                    task.collector_id
                );
            }
            None => {
                write_txn.abort().map_err(|e| anyhow!("Failed to abort: {}", e))?;
                bail!("Task not found: {}", task_id);
            }
        };

        let now = chrono::Utc::now().timestamp();
        task.status = TaskStatus::Verified;
        task.collection_date = Some(now);
        put_record(&write_txn, TASKS, task.id, &task)?;

        let collected = CollectedWaste {
            id: next_id(&write_txn, "collected_wastes")?,
            report_id: task.report_id,
            task_id: task.id,
            collector_id,
            collection_date: now,
            status: TaskStatus::Verified,
            verification: verification.to_string(),
        };
        put_record(&write_txn, COLLECTED, collected.id, &collected)?;

        let reward = insert_reward(&write_txn, collector_id, amount, now)?;
        write_txn.commit().map_err(|e| anyhow!("Failed to commit settlement: {}", e))?;

        info!(
            "Task {} verified for collector {}: {} tokens",
            task_id, collector_id, amount
        );
        Ok(Settlement { task, reward, collected })
    }

    // ========================================================================
    // Collected Waste Operations
    // ========================================================================

    /// Append an audit record outside the settlement path.
    pub fn save_collected_waste(
        &self,
        task_id: u64,
        collector_id: u64,
        verification: &str,
    ) -> Result<CollectedWaste> {
        let task = self
            .get_task(task_id)?
            .ok_or_else(|| anyhow!("Task not found: {}", task_id))?;

        let write_txn = self.begin_write()?;
        let collected = CollectedWaste {
            id: next_id(&write_txn, "collected_wastes")?,
            report_id: task.report_id,
            task_id,
            collector_id,
            collection_date: chrono::Utc::now().timestamp(),
            status: TaskStatus::Verified,
            verification: verification.to_string(),
        };
        put_record(&write_txn, COLLECTED, collected.id, &collected)?;
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Stored collected waste {} for task {}", collected.id, task_id);
        Ok(collected)
    }

    pub fn list_collected_waste(&self) -> Result<Vec<CollectedWaste>> {
        self.list_records(COLLECTED)
    }

    // ========================================================================
    // Reward Ledger
    // ========================================================================

    pub fn save_reward(&self, user_id: u64, amount: u32) -> Result<Reward> {
        let write_txn = self.begin_write()?;
        let reward = insert_reward(&write_txn, user_id, amount, chrono::Utc::now().timestamp())?;
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Stored reward {} for user {}", reward.id, user_id);
        Ok(reward)
    }

    pub fn rewards_for_user(&self, user_id: u64) -> Result<Vec<Reward>> {
        let rewards: Vec<Reward> = self.list_records(REWARDS)?;
        Ok(rewards.into_iter().filter(|r| r.user_id == user_id).collect())
    }

    /// Token balance: sum of every ledger entry for the user.
    pub fn user_balance(&self, user_id: u64) -> Result<u64> {
        Ok(self
            .rewards_for_user(user_id)?
            .iter()
            .map(|r| u64::from(r.amount))
            .sum())
    }

    // ========================================================================
    // Notification Operations
    // ========================================================================

    pub fn create_notification(
        &self,
        user_id: u64,
        kind: NotificationKind,
        message: &str,
    ) -> Result<Notification> {
        let write_txn = self.begin_write()?;
        let notification = insert_notification(
            &write_txn,
            user_id,
            kind,
            message,
            chrono::Utc::now().timestamp(),
        )?;
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;
        Ok(notification)
    }

    pub fn unread_notifications(&self, user_id: u64) -> Result<Vec<Notification>> {
        let notifications: Vec<Notification> = self.list_records(NOTIFICATIONS)?;
        Ok(notifications
            .into_iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .collect())
    }

    /// Returns false when the notification does not exist.
    pub fn mark_notification_read(&self, notification_id: u64) -> Result<bool> {
        let mut notification: Notification = match self.get_record(NOTIFICATIONS, notification_id)? {
            Some(n) => n,
            None => return Ok(false),
        };
        notification.is_read = true;

        let write_txn = self.begin_write()?;
        put_record(&write_txn, NOTIFICATIONS, notification.id, &notification)?;
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Marked notification {} read", notification_id);
        Ok(true)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn stats(&self) -> Result<DbStats> {
        let tasks = self.list_tasks(None)?;
        let rewards: Vec<Reward> = self.list_records(REWARDS)?;

        let mut task_counts = std::collections::HashMap::new();
        for task in &tasks {
            *task_counts.entry(task.status.to_string()).or_insert(0usize) += 1;
        }

        Ok(DbStats {
            total_users: self.list_users()?.len(),
            total_reports: self.list_reports()?.len(),
            total_tasks: tasks.len(),
            task_counts,
            total_collected: self.list_collected_waste()?.len(),
            total_rewards: rewards.len(),
            tokens_issued: rewards.iter().map(|r| u64::from(r.amount)).sum(),
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Allocate the next id of a sequence inside the caller's transaction.
fn next_id(txn: &WriteTransaction, sequence: &str) -> Result<u64> {
    let mut table = txn.open_table(SEQUENCES)
        .map_err(|e| anyhow!("Failed to open sequences table: {}", e))?;
    let current = table.get(sequence)
        .map_err(|e| anyhow!("Failed to read sequence {}: {}", sequence, e))?
        .map(|v| v.value())
        .unwrap_or(0);
    let next = current + 1;
    table.insert(sequence, next)
        .map_err(|e| anyhow!("Failed to advance sequence {}: {}", sequence, e))?;
    Ok(next)
}

fn put_record<T: Serialize>(txn: &WriteTransaction, table: RecordTable, id: u64, record: &T) -> Result<()> {
    let value = bincode::serialize(record)
        .map_err(|e| anyhow!("Failed to serialize record {}: {}", id, e))?;
    let mut table = txn.open_table(table)
        .map_err(|e| anyhow!("Failed to open {} table: {}", table, e))?;
    table.insert(id, value.as_slice())
        .map_err(|e| anyhow!("Failed to insert record {}: {}", id, e))?;
    Ok(())
}

fn read_in_txn<T: DeserializeOwned>(txn: &WriteTransaction, table: RecordTable, id: u64) -> Result<Option<T>> {
    let table = txn.open_table(table)
        .map_err(|e| anyhow!("Failed to open {} table: {}", table, e))?;
    let bytes = table.get(id)
        .map_err(|e| anyhow!("Failed to get record {}: {}", id, e))?
        .map(|v| v.value().to_vec());

    bytes
        .map(|b| bincode::deserialize(&b).map_err(|e| anyhow!("Failed to deserialize record {}: {}", id, e)))
        .transpose()
}

fn insert_reward(txn: &WriteTransaction, user_id: u64, amount: u32, now: i64) -> Result<Reward> {
    let reward = Reward {
        id: next_id(txn, "rewards")?,
        user_id,
        amount,
        created_at: now,
    };
    put_record(txn, REWARDS, reward.id, &reward)?;
    insert_notification(
        txn,
        user_id,
        NotificationKind::Reward,
        &format!("You earned {} tokens!", amount),
        now,
    )?;
    Ok(reward)
}

fn insert_notification(
    txn: &WriteTransaction,
    user_id: u64,
    kind: NotificationKind,
    message: &str,
    now: i64,
) -> Result<Notification> {
    let notification = Notification {
        id: next_id(txn, "notifications")?,
        user_id,
        kind,
        message: message.to_string(),
        is_read: false,
        created_at: now,
    };
    put_record(txn, NOTIFICATIONS, notification.id, &notification)?;
    Ok(notification)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report(reporter_id: u64) -> NewReport {
        NewReport {
            reporter_id,
            location: "12 Harbour Road, Lagos".to_string(),
            latitude: 6.4541,
            longitude: 3.3947,
            waste_type: "plastic".to_string(),
            amount: "5kg".to_string(),
            description: "Bottles by the kerb".to_string(),
            recommendation: "Recycle as PET".to_string(),
            image_reference: Some("sha256:abc".to_string()),
            verification_payload: None,
        }
    }

    #[test]
    fn test_create_report_creates_pending_task() {
        let db = WasteDb::open_in_memory().unwrap();
        let (report, task) = db.create_report(sample_report(1)).unwrap();

        assert_eq!(task.report_id, report.id);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.collector_id, None);
        assert_eq!(task.waste_type, "plastic");
        assert_eq!(db.get_report(report.id).unwrap(), Some(report));
        assert_eq!(db.list_tasks(Some(TaskStatus::Pending)).unwrap().len(), 1);
    }

    #[test]
    fn test_ids_are_sequential() {
        let db = WasteDb::open_in_memory().unwrap();
        let (first, _) = db.create_report(sample_report(1)).unwrap();
        let (second, _) = db.create_report(sample_report(1)).unwrap();
        assert_eq!(first.id + 1, second.id);
    }

    #[test]
    fn test_recent_reports_newest_first() {
        let db = WasteDb::open_in_memory().unwrap();
        for _ in 0..3 {
            db.create_report(sample_report(1)).unwrap();
        }
        let recent = db.recent_reports(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].id > recent[1].id);
    }

    #[test]
    fn test_claim_is_conditional() {
        let db = WasteDb::open_in_memory().unwrap();
        let (_, task) = db.create_report(sample_report(1)).unwrap();

        match db.claim_task(task.id, 7).unwrap() {
            ClaimOutcome::Claimed(t) => {
                assert_eq!(t.status, TaskStatus::InProgress);
                assert_eq!(t.collector_id, Some(7));
            }
            other => panic!("Expected claim, got {:?}", other),
        }

        // Second collector must not overwrite the assignment
        match db.claim_task(task.id, 8).unwrap() {
            ClaimOutcome::Unavailable(t) => assert_eq!(t.collector_id, Some(7)),
            other => panic!("Expected unavailable, got {:?}", other),
        }
        assert_eq!(db.get_task(task.id).unwrap().unwrap().collector_id, Some(7));
        assert_eq!(db.claim_task(999, 7).unwrap(), ClaimOutcome::NotFound);
    }

    #[test]
    fn test_complete_verification_is_atomic() {
        let db = WasteDb::open_in_memory().unwrap();
        let (_, task) = db.create_report(sample_report(1)).unwrap();
        db.claim_task(task.id, 7).unwrap();

        let settlement = db
            .complete_verification(task.id, 7, r#"{"confidence":0.9}"#, 42)
            .unwrap();
        assert_eq!(settlement.task.status, TaskStatus::Verified);
        assert!(settlement.task.collection_date.is_some());
        assert_eq!(settlement.reward.amount, 42);
        assert_eq!(settlement.collected.task_id, task.id);

        assert_eq!(db.get_task(task.id).unwrap().unwrap().status, TaskStatus::Verified);
        assert_eq!(db.user_balance(7).unwrap(), 42);
        assert_eq!(db.list_collected_waste().unwrap().len(), 1);
    }

    #[test]
    fn test_complete_verification_rejects_wrong_collector() {
        let db = WasteDb::open_in_memory().unwrap();
        let (_, task) = db.create_report(sample_report(1)).unwrap();
        db.claim_task(task.id, 7).unwrap();

        assert!(db.complete_verification(task.id, 8, "{}", 20).is_err());

        let unchanged = db.get_task(task.id).unwrap().unwrap();
        assert_eq!(unchanged.status, TaskStatus::InProgress);
        assert!(db.rewards_for_user(8).unwrap().is_empty());
        assert!(db.list_collected_waste().unwrap().is_empty());
    }

    #[test]
    fn test_complete_verification_requires_claim() {
        let db = WasteDb::open_in_memory().unwrap();
        let (_, task) = db.create_report(sample_report(1)).unwrap();

        assert!(db.complete_verification(task.id, 7, "{}", 20).is_err());
        assert!(db.complete_verification(404, 7, "{}", 20).is_err());
        assert_eq!(db.stats().unwrap().total_rewards, 0);
    }

    #[test]
    fn test_update_task_status() {
        let db = WasteDb::open_in_memory().unwrap();
        let (_, task) = db.create_report(sample_report(1)).unwrap();

        let updated = db
            .update_task_status(task.id, TaskStatus::Completed, Some(3))
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.collector_id, Some(3));
        assert!(updated.collection_date.is_some());
        assert!(db.update_task_status(999, TaskStatus::Pending, None).unwrap().is_none());
    }

    #[test]
    fn test_rewards_balance_and_notifications() {
        let db = WasteDb::open_in_memory().unwrap();
        db.save_reward(5, 10).unwrap();
        db.save_reward(5, 25).unwrap();
        db.save_reward(6, 59).unwrap();

        assert_eq!(db.user_balance(5).unwrap(), 35);
        assert_eq!(db.user_balance(6).unwrap(), 59);
        assert_eq!(db.user_balance(9).unwrap(), 0);

        let unread = db.unread_notifications(5).unwrap();
        assert_eq!(unread.len(), 2);
        assert!(unread.iter().all(|n| n.kind == NotificationKind::Reward));

        assert!(db.mark_notification_read(unread[0].id).unwrap());
        assert_eq!(db.unread_notifications(5).unwrap().len(), 1);
        assert!(!db.mark_notification_read(999).unwrap());
    }

    #[test]
    fn test_users() {
        let db = WasteDb::open_in_memory().unwrap();
        let user = db.get_or_create_user("Ada@Example.com ", None).unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.name, "Anonymous User");
        assert_eq!(user.role, UserRole::Reporter);

        let again = db.get_or_create_user("ada@example.com", Some("Ada")).unwrap();
        assert_eq!(again.id, user.id);
        assert!(db.create_user("ada@example.com", "Dup", UserRole::Admin).is_err());

        let updated = db
            .update_user_details(user.id, "Ada L.", UserRole::Collector)
            .unwrap();
        assert_eq!(updated.role, UserRole::Collector);
        assert_eq!(
            db.get_user_by_email("ada@example.com").unwrap().unwrap().name,
            "Ada L."
        );
    }

    #[test]
    fn test_stats() {
        let db = WasteDb::open_in_memory().unwrap();
        let (_, task) = db.create_report(sample_report(1)).unwrap();
        db.create_report(sample_report(1)).unwrap();
        db.claim_task(task.id, 2).unwrap();
        db.complete_verification(task.id, 2, "{}", 30).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_reports, 2);
        assert_eq!(stats.total_tasks, 2);
        assert_eq!(stats.task_counts.get("verified"), Some(&1));
        assert_eq!(stats.task_counts.get("pending"), Some(&1));
        assert_eq!(stats.tokens_issued, 30);
    }

    #[test]
    fn test_status_and_role_parsing() {
        assert_eq!("in-progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("VERIFIED".parse::<TaskStatus>().unwrap(), TaskStatus::Verified);
        assert!("done".parse::<TaskStatus>().is_err());
        assert_eq!("collector".parse::<UserRole>().unwrap(), UserRole::Collector);
        assert!("janitor".parse::<UserRole>().is_err());
    }
}
