//! ============================================================================
//! Task Board - Collector-facing task listing
//! ============================================================================
//! Search, pagination and the action each task offers the current user.
//! ============================================================================

use serde::{Deserialize, Serialize};

use crate::db::{CollectionTask, TaskStatus};
use crate::geo::{has_arrived, GeoPoint};

/// Tasks per page
pub const PAGE_SIZE: usize = 5;

/// What the current user can do with a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    /// Pending: start collection
    Claim,
    /// In progress and held by the current user: complete & verify
    Verify,
    /// In progress and held by someone else: read-only
    ClaimedByOther,
    RewardEarned,
    None,
}

impl TaskAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Claim => "Start Collection",
            Self::Verify => "Complete & Verify",
            Self::ClaimedByOther => "In progress by another collector",
            Self::RewardEarned => "Reward Earned",
            Self::None => "",
        }
    }
}

/// Action offered in the list view.
pub fn task_action(task: &CollectionTask, user_id: Option<u64>) -> TaskAction {
    match task.status {
        TaskStatus::Pending => TaskAction::Claim,
        TaskStatus::InProgress if user_id.is_some() && task.collector_id == user_id => TaskAction::Verify,
        TaskStatus::InProgress => TaskAction::ClaimedByOther,
        TaskStatus::Verified => TaskAction::RewardEarned,
        TaskStatus::Completed => TaskAction::None,
    }
}

/// Action offered on the map, where starting requires being on site.
pub fn map_action(task: &CollectionTask, user_id: Option<u64>, position: Option<GeoPoint>) -> TaskAction {
    match task_action(task, user_id) {
        TaskAction::Claim if !has_arrived(position, task) => TaskAction::None,
        action => action,
    }
}

/// Case-insensitive substring match on the location text.
pub fn filter_by_location<'a>(tasks: &'a [CollectionTask], term: &str) -> Vec<&'a CollectionTask> {
    let term = term.trim().to_lowercase();
    tasks
        .iter()
        .filter(|t| t.location.to_lowercase().contains(&term))
        .collect()
}

pub fn page_count(total: usize) -> usize {
    total.div_ceil(PAGE_SIZE)
}

/// 1-based page of at most PAGE_SIZE items. Out-of-range pages are empty.
pub fn paginate<T>(items: &[T], page: usize) -> &[T] {
    let start = page.saturating_sub(1).saturating_mul(PAGE_SIZE);
    if page == 0 || start >= items.len() {
        return &[];
    }
    let end = (start + PAGE_SIZE).min(items.len());
    &items[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: u64, location: &str, status: TaskStatus, collector_id: Option<u64>) -> CollectionTask {
        CollectionTask {
            id,
            report_id: id,
            collector_id,
            status,
            location: location.into(),
            latitude: 6.4541,
            longitude: 3.3947,
            waste_type: "plastic".into(),
            amount: "1kg".into(),
            created_at: 0,
            collection_date: None,
        }
    }

    #[test]
    fn test_task_actions() {
        assert_eq!(task_action(&task(1, "a", TaskStatus::Pending, None), Some(1)), TaskAction::Claim);
        assert_eq!(
            task_action(&task(1, "a", TaskStatus::InProgress, Some(1)), Some(1)),
            TaskAction::Verify
        );
        assert_eq!(
            task_action(&task(1, "a", TaskStatus::InProgress, Some(2)), Some(1)),
            TaskAction::ClaimedByOther
        );
        assert_eq!(
            task_action(&task(1, "a", TaskStatus::InProgress, None), None),
            TaskAction::ClaimedByOther
        );
        assert_eq!(
            task_action(&task(1, "a", TaskStatus::Verified, Some(2)), Some(1)),
            TaskAction::RewardEarned
        );
        assert_eq!(TaskAction::ClaimedByOther.label(), "In progress by another collector");
    }

    #[test]
    fn test_map_action_requires_arrival() {
        let pending = task(1, "a", TaskStatus::Pending, None);
        assert_eq!(map_action(&pending, Some(1), None), TaskAction::None);
        assert_eq!(
            map_action(&pending, Some(1), Some(GeoPoint::new(6.4541, 3.3947))),
            TaskAction::Claim
        );

        let mine = task(2, "a", TaskStatus::InProgress, Some(1));
        assert_eq!(map_action(&mine, Some(1), None), TaskAction::Verify);
    }

    #[test]
    fn test_filter_by_location() {
        let tasks = vec![
            task(1, "Harbour Road, Lagos", TaskStatus::Pending, None),
            task(2, "Main Street, Accra", TaskStatus::Pending, None),
            task(3, "LAGOS Island", TaskStatus::Pending, None),
        ];
        let ids: Vec<u64> = filter_by_location(&tasks, "lagos").iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(filter_by_location(&tasks, "").len(), 3);
        assert!(filter_by_location(&tasks, "nairobi").is_empty());
    }

    #[test]
    fn test_pagination() {
        let items: Vec<u32> = (1..=12).collect();
        assert_eq!(page_count(items.len()), 3);
        assert_eq!(page_count(0), 0);
        assert_eq!(paginate(&items, 1), &[1, 2, 3, 4, 5]);
        assert_eq!(paginate(&items, 3), &[11, 12]);
        assert!(paginate(&items, 4).is_empty());
        assert!(paginate(&items, 0).is_empty());
    }
}
