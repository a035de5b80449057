// ============================================================================
// t2t - Operator CLI for the Trash2Token database and verification workflow
// ============================================================================
// Usage:
//   t2t stats                                   Show database statistics
//   t2t list-tasks [--status S] [--search Q]    Browse the task board
//   t2t export --format json                    Export full database as JSON
//   t2t add-user --email E [--name N]           Create or update a user
//   t2t report --email E --image P ...          Verify a photo and file a report
//   t2t claim --task ID --email E               Start collection
//   t2t verify --task ID --email E --image P    Verify a collection photo
//   t2t navigate --task ID [--lat --lng]        Distance and directions
//   t2t balance --email E                       Token balance and unread notices
//   t2t notifications --email E [--mark-read]   Show notifications
//   t2t watch --email E                         Follow balance refreshes
// ============================================================================

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use trash2token_core::board::{self, map_action, task_action, PAGE_SIZE};
use trash2token_core::collection;
use trash2token_core::geo::{haversine_meters, has_arrived, navigation_url};
use trash2token_core::refresh::snapshot;
use trash2token_core::verification::ReportDecision;
use trash2token_core::{
    spawn_account_refresh, AppConfig, CollectionService, EncodedImage, GeoPoint, ReportDraft,
    ReportService, TaskStatus, User, UserRole, WasteDb,
};

/// Trash2Token operator tool
#[derive(Parser)]
#[command(name = "t2t", version, about = "Inspect and drive the Trash2Token workflow")]
struct Cli {
    /// Path to the database file (default: ~/.trash2token/trash2token.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show database statistics (users, reports, task counts, tokens issued)
    Stats,

    /// List collection tasks
    ListTasks {
        /// Filter by status: pending, in-progress, completed, verified
        #[arg(long)]
        status: Option<String>,

        /// Case-insensitive location search
        #[arg(long)]
        search: Option<String>,

        /// Page number, 5 tasks per page
        #[arg(long, default_value = "1")]
        page: usize,

        /// Show the action available to this user
        #[arg(long)]
        email: Option<String>,
    },

    /// Export full database contents as JSON
    Export {
        /// Output format (currently only json is supported)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Create a user, or update name and role of an existing one
    AddUser {
        #[arg(long)]
        email: String,

        #[arg(long)]
        name: Option<String>,

        /// reporter, collector, authority, admin (new users default to reporter)
        #[arg(long)]
        role: Option<String>,
    },

    /// Verify a waste photo and file a report
    Report {
        #[arg(long)]
        email: String,

        /// Path to the photo
        #[arg(long)]
        image: String,

        #[arg(long)]
        location: String,

        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        lng: Option<f64>,

        /// Override (or supply, if verification was partial) the waste type
        #[arg(long)]
        waste_type: Option<String>,

        /// Override (or supply, if verification was partial) the amount
        #[arg(long)]
        amount: Option<String>,
    },

    /// Start collection of a pending task
    Claim {
        #[arg(long)]
        task: u64,

        #[arg(long)]
        email: String,
    },

    /// Verify a collection photo for a task you hold
    Verify {
        #[arg(long)]
        task: u64,

        #[arg(long)]
        email: String,

        #[arg(long)]
        image: String,
    },

    /// Distance to a task and a directions link
    Navigate {
        #[arg(long)]
        task: u64,

        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        lng: Option<f64>,

        #[arg(long)]
        email: Option<String>,
    },

    /// Show token balance and unread notification count
    Balance {
        #[arg(long)]
        email: String,
    },

    /// List unread notifications
    Notifications {
        #[arg(long)]
        email: String,

        /// Mark the listed notifications as read
        #[arg(long)]
        mark_read: bool,
    },

    /// Print a balance snapshot on every refresh until interrupted
    Watch {
        #[arg(long)]
        email: String,
    },
}

fn format_timestamp(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("(invalid: {})", ts))
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trash2token_core=info".parse()?)
                .add_directive("t2t=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::default();
    let db_path = cli.db_path.clone().or_else(|| config.db_path.clone());
    let db = Arc::new(WasteDb::open(db_path.as_deref())?);

    match cli.command {
        Commands::Stats => cmd_stats(&db),
        Commands::ListTasks {
            status,
            search,
            page,
            email,
        } => cmd_list_tasks(&db, status, search, page, email),
        Commands::Export { format } => cmd_export(&db, &format),
        Commands::AddUser { email, name, role } => cmd_add_user(&db, &email, name, role.as_deref()),
        Commands::Report {
            email,
            image,
            location,
            lat,
            lng,
            waste_type,
            amount,
        } => {
            let draft = ReportDraft {
                location,
                latitude: lat,
                longitude: lng,
                waste_type,
                amount,
            };
            cmd_report(&config, db, &email, &image, draft).await
        }
        Commands::Claim { task, email } => cmd_claim(&db, task, &email),
        Commands::Verify { task, email, image } => cmd_verify(&config, db, task, &email, &image).await,
        Commands::Navigate {
            task,
            lat,
            lng,
            email,
        } => cmd_navigate(&db, task, lat, lng, email),
        Commands::Balance { email } => cmd_balance(&db, &email),
        Commands::Notifications { email, mark_read } => cmd_notifications(&db, &email, mark_read),
        Commands::Watch { email } => cmd_watch(&config, db, &email).await,
    }
}

fn user_by_email(db: &WasteDb, email: &str) -> Result<User> {
    db.get_user_by_email(email)?
        .with_context(|| format!("No user with email '{}'. Create one with add-user.", email))
}

fn cmd_stats(db: &WasteDb) -> Result<()> {
    let stats = db.stats()?;

    println!("=== Trash2Token Database Stats ===");
    match db.path() {
        Some(path) => println!("Database: {}", path.display()),
        None => println!("Database: (in memory)"),
    }
    println!();
    println!("Users:     {}", stats.total_users);
    println!("Reports:   {}", stats.total_reports);
    println!("Tasks:     {} total", stats.total_tasks);
    let mut counts: Vec<_> = stats.task_counts.iter().collect();
    counts.sort();
    for (status, count) in counts {
        println!("  {:12} {}", status, count);
    }
    println!("Collected: {}", stats.total_collected);
    println!("Rewards:   {} ({} tokens issued)", stats.total_rewards, stats.tokens_issued);

    Ok(())
}

fn cmd_list_tasks(
    db: &WasteDb,
    status_filter: Option<String>,
    search: Option<String>,
    page: usize,
    email: Option<String>,
) -> Result<()> {
    let filter = status_filter
        .as_deref()
        .map(str::parse::<TaskStatus>)
        .transpose()
        .map_err(anyhow::Error::msg)?;
    let viewer = email.as_deref().map(|e| user_by_email(db, e)).transpose()?;

    let tasks = db.list_tasks(filter)?;
    let matching = board::filter_by_location(&tasks, search.as_deref().unwrap_or(""));

    if matching.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    let pages = board::page_count(matching.len());
    let page = page.clamp(1, pages);

    println!(
        "{:<6}  {:<12}  {:<22}  {:<12}  {:<10}  {}",
        "ID", "STATUS", "CREATED AT", "WASTE", "AMOUNT", "LOCATION"
    );
    println!("{}", "-".repeat(100));

    for task in board::paginate(&matching, page) {
        let location = task.location.chars().take(30).collect::<String>();
        println!(
            "{:<6}  {:<12}  {:<22}  {:<12}  {:<10}  {}",
            task.id,
            task.status.as_str(),
            format_timestamp(task.created_at),
            task.waste_type,
            task.amount,
            location
        );
        if let Some(user) = &viewer {
            let action = task_action(task, Some(user.id));
            if !action.label().is_empty() {
                println!("        -> {}", action.label());
            }
        }
    }

    println!(
        "\nPage {}/{} ({} per page), {} matching tasks",
        page,
        pages,
        PAGE_SIZE,
        matching.len()
    );
    Ok(())
}

fn cmd_export(db: &WasteDb, format: &str) -> Result<()> {
    if format != "json" {
        bail!("Unsupported format '{}'. Only 'json' is supported.", format);
    }

    let export = serde_json::json!({
        "exported_at": Utc::now().to_rfc3339(),
        "stats": db.stats()?,
        "users": db.list_users()?,
        "reports": db.list_reports()?,
        "tasks": db.list_tasks(None)?,
        "collected_wastes": db.list_collected_waste()?,
    });

    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

fn cmd_add_user(db: &WasteDb, email: &str, name: Option<String>, role: Option<&str>) -> Result<()> {
    let user = upsert_user(db, email, name, role)?;
    println!("User {}: {} <{}> ({})", user.id, user.name, user.email, user.role);
    Ok(())
}

/// Register or edit a user. Fields left out keep their stored values.
fn upsert_user(db: &WasteDb, email: &str, name: Option<String>, role: Option<&str>) -> Result<User> {
    let role = role
        .map(str::parse::<UserRole>)
        .transpose()
        .map_err(anyhow::Error::msg)?;
    let user = db.get_or_create_user(email, name.as_deref())?;
    if name.is_none() && role.is_none() {
        return Ok(user);
    }

    let name = name.unwrap_or_else(|| user.name.clone());
    Ok(db.update_user_details(user.id, &name, role.unwrap_or(user.role))?)
}

async fn cmd_report(
    config: &AppConfig,
    db: Arc<WasteDb>,
    email: &str,
    image_path: &str,
    draft: ReportDraft,
) -> Result<()> {
    let reporter = user_by_email(&db, email)?;
    let image = EncodedImage::from_path(image_path).await?;
    let service = ReportService::new(Arc::clone(&db), Arc::new(config.build_verifier()?));

    println!("Verifying {} ...", image_path);
    let assessment = match service.verify_image(&image).await {
        Ok(a) => a,
        Err(e) => bail!("{}", e.user_message()),
    };

    let result = &assessment.result;
    println!("Waste type:     {}", result.waste_type);
    println!("Quantity:       {}", result.quantity);
    println!("Confidence:     {}%", result.confidence_percent());
    println!("Description:    {}", result.description);
    println!("Recommendation: {}", result.recommendation);
    if let ReportDecision::Partial(reason) = &assessment.decision {
        println!("Note: {}", reason.message());
    }

    let (report, task) = service
        .submit(&reporter, draft, Some(&assessment), &image)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    info!("Report {} filed by {}", report.id, reporter.email);
    println!(
        "Report {} filed: {} ({}) at {}. Task {} is {}.",
        report.id, report.waste_type, report.amount, report.location, task.id, task.status
    );
    Ok(())
}

fn cmd_claim(db: &WasteDb, task_id: u64, email: &str) -> Result<()> {
    let collector = user_by_email(db, email)?;
    let task = collection::claim_task(db, task_id, &collector)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!("Task {} is now {} for {}", task.id, task.status, collector.email);
    Ok(())
}

async fn cmd_verify(
    config: &AppConfig,
    db: Arc<WasteDb>,
    task_id: u64,
    email: &str,
    image_path: &str,
) -> Result<()> {
    let collector = user_by_email(&db, email)?;
    let image = EncodedImage::from_path(image_path).await?;
    let service = CollectionService::new(Arc::clone(&db), Arc::new(config.build_verifier()?));

    println!("Verifying collection for task {} ...", task_id);
    let outcome = service
        .verify_collection(task_id, &collector, &image)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!("{}", outcome.message());
    Ok(())
}

fn cmd_navigate(
    db: &WasteDb,
    task_id: u64,
    lat: Option<f64>,
    lng: Option<f64>,
    email: Option<String>,
) -> Result<()> {
    let task = db
        .get_task(task_id)?
        .with_context(|| format!("Task {} not found", task_id))?;
    let position = match (lat, lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)).filter(GeoPoint::is_valid),
        _ => None,
    };

    println!("Task {}: {} ({})", task.id, task.location, task.status);
    if let Some(here) = position {
        let meters = haversine_meters(here, GeoPoint::from(&task));
        println!("Distance: {:.0} m", meters);
        println!("Arrived:  {}", if has_arrived(position, &task) { "yes" } else { "no" });
    }
    if let Some(email) = email {
        let user = user_by_email(db, &email)?;
        let action = map_action(&task, Some(user.id), position);
        if !action.label().is_empty() {
            println!("Action:   {}", action.label());
        }
    }
    println!("Directions: {}", navigation_url(position, &task));
    Ok(())
}

fn cmd_balance(db: &WasteDb, email: &str) -> Result<()> {
    let user = user_by_email(db, email)?;
    let snap = snapshot(db, user.id)?;

    println!("{} <{}>", user.name, user.email);
    println!("Balance: {} tokens", snap.balance);
    println!("Unread:  {} notifications", snap.unread.len());
    Ok(())
}

fn cmd_notifications(db: &WasteDb, email: &str, mark_read: bool) -> Result<()> {
    let user = user_by_email(db, email)?;
    let unread = db.unread_notifications(user.id)?;

    if unread.is_empty() {
        println!("No unread notifications.");
        return Ok(());
    }

    for n in &unread {
        println!(
            "[{}] {:<22}  {:?}  {}",
            n.id,
            format_timestamp(n.created_at),
            n.kind,
            n.message
        );
        if mark_read {
            db.mark_notification_read(n.id)?;
        }
    }
    Ok(())
}

async fn cmd_watch(config: &AppConfig, db: Arc<WasteDb>, email: &str) -> Result<()> {
    let user = user_by_email(&db, email)?;
    let (mut rx, handle) = spawn_account_refresh(db, user.id, config.refresh_interval());

    println!(
        "Watching {} every {}s (Ctrl-C to stop)",
        user.email,
        config.refresh_interval().as_secs()
    );
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = rx.borrow_and_update().clone();
                println!(
                    "{}  balance {} tokens, {} unread",
                    format_timestamp(snap.refreshed_at),
                    snap.balance,
                    snap.unread.len()
                );
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    drop(rx);
    handle.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_user_keeps_role_unless_given() {
        let db = WasteDb::open_in_memory().unwrap();

        let admin = upsert_user(&db, "Admin@X.org", Some("Ada".into()), Some("admin")).unwrap();
        assert_eq!(admin.role, UserRole::Admin);

        let again = upsert_user(&db, "admin@x.org", None, None).unwrap();
        assert_eq!(again.role, UserRole::Admin);
        assert_eq!(again.name, "Ada");

        let renamed = upsert_user(&db, "admin@x.org", Some("Ada L".into()), None).unwrap();
        assert_eq!(renamed.role, UserRole::Admin);
        assert_eq!(renamed.name, "Ada L");

        let demoted = upsert_user(&db, "admin@x.org", None, Some("collector")).unwrap();
        assert_eq!(demoted.role, UserRole::Collector);
        assert_eq!(demoted.name, "Ada L");
    }

    #[test]
    fn test_add_user_defaults_and_bad_role() {
        let db = WasteDb::open_in_memory().unwrap();

        let user = upsert_user(&db, "new@x.org", None, None).unwrap();
        assert_eq!(user.role, UserRole::Reporter);
        assert_eq!(user.name, "Anonymous User");

        assert!(upsert_user(&db, "other@x.org", None, Some("mayor")).is_err());
        assert!(db.get_user_by_email("other@x.org").unwrap().is_none());
    }
}
