//! ============================================================================
//! TRASH2TOKEN-CORE: Waste verification and rewards
//! ============================================================================
//! This crate handles all backend logic for Trash2Token:
//! - Photo verification via an external vision model (Gemini)
//! - Report filing and collection task claiming
//! - Atomic settlement of verified collections into the reward ledger
//! - Embedded redb storage, task board helpers, periodic account refresh
//! ============================================================================

pub mod board;
pub mod collection;
pub mod config;
pub mod db;
pub mod geo;
pub mod refresh;
pub mod reporting;
pub mod types;
pub mod verification;

// Re-export main types for convenience
pub use types::*;
pub use collection::{CollectionOutcome, CollectionService};
pub use config::AppConfig;
pub use db::{
    ClaimOutcome, CollectedWaste, CollectionTask, DbStats, NewReport, Notification,
    NotificationKind, Report, Reward, Settlement, TaskStatus, User, UserRole, WasteDb,
};
pub use geo::GeoPoint;
pub use refresh::{spawn_account_refresh, AccountSnapshot};
pub use reporting::{ReportDraft, ReportService};
pub use verification::{EncodedImage, VerificationError, Verifier};
