#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clinic_access_domain::{
    format_rfc3339, now_utc, Activity, ActivityId, ActivityStatus, ActivityType, NewActivity,
};
use serde::{Deserialize, Serialize};
use ulid::Generator;

/// User-visible acknowledgment emitted when an activity is recorded.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Notification {
    pub activity_id: ActivityId,
    pub title: String,
    pub message: String,
}

pub trait Notifier {
    fn notifier_name(&self) -> &'static str;

    fn notify(&self, notification: &Notification);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notifier_name(&self) -> &'static str {
        "tracing"
    }

    fn notify(&self, notification: &Notification) {
        tracing::info!(
            activity_id = %notification.activity_id,
            title = %notification.title,
            "{}",
            notification.message
        );
    }
}

/// Keeps every notification in memory, oldest first.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Notifier for MemoryNotifier {
    fn notifier_name(&self) -> &'static str {
        "memory"
    }

    fn notify(&self, notification: &Notification) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StatusUpdate {
    Applied,
    /// Transition not allowed from the current status; nothing changed.
    Ignored,
    NotFound,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct ActivityFilter {
    #[serde(default, rename = "type")]
    pub activity_type: Option<ActivityType>,
    #[serde(default)]
    pub status: Option<ActivityStatus>,
}

impl ActivityFilter {
    #[must_use]
    pub fn matches(&self, activity: &Activity) -> bool {
        !matches!(self.activity_type, Some(kind) if kind != activity.activity_type)
            && !matches!(self.status, Some(status) if status != activity.status)
    }
}

struct LogState {
    /// Newest first.
    activities: Vec<Activity>,
    ids: Generator,
}

/// Append-only, newest-first log of AI-assisted and clinical activities.
pub struct ActivityLogStore {
    state: Mutex<LogState>,
    notifier: Arc<dyn Notifier + Send + Sync>,
}

impl std::fmt::Debug for ActivityLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLogStore")
            .field("len", &self.len())
            .field("notifier", &self.notifier.notifier_name())
            .finish()
    }
}

impl Default for ActivityLogStore {
    fn default() -> Self {
        Self::new(Arc::new(TracingNotifier))
    }
}

impl ActivityLogStore {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier + Send + Sync>) -> Self {
        Self {
            state: Mutex::new(LogState {
                activities: Vec::new(),
                ids: Generator::new(),
            }),
            notifier,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a new activity in `in-progress` and announces it.
    pub fn add(&self, input: NewActivity) -> Activity {
        let activity = {
            let mut state = self.lock();
            let id = state
                .ids
                .generate()
                .map_or_else(|_| ActivityId::new(), ActivityId);
            let timestamp = input.timestamp.unwrap_or_else(display_timestamp);
            let activity = Activity {
                id,
                activity_type: input.activity_type,
                title: input.title,
                description: input.description,
                timestamp,
                status: ActivityStatus::InProgress,
                details: input.details,
            };
            state.activities.insert(0, activity.clone());
            activity
        };

        tracing::info!(
            activity_id = %activity.id,
            activity_type = activity.activity_type.as_str(),
            "activity recorded"
        );
        self.notifier.notify(&Notification {
            activity_id: activity.id,
            title: activity.title.clone(),
            message: format!("{} started", activity.title),
        });

        activity
    }

    /// Applies a status change when the lifecycle allows it; otherwise a no-op.
    pub fn update_status(&self, id: ActivityId, next: ActivityStatus) -> StatusUpdate {
        let mut state = self.lock();
        let Some(activity) = state.activities.iter_mut().find(|item| item.id == id) else {
            tracing::debug!(activity_id = %id, "status update for unknown activity ignored");
            return StatusUpdate::NotFound;
        };

        if !activity.status.can_transition_to(next) {
            tracing::debug!(
                activity_id = %id,
                from = activity.status.as_str(),
                to = next.as_str(),
                "illegal status transition ignored"
            );
            return StatusUpdate::Ignored;
        }

        tracing::info!(
            activity_id = %id,
            from = activity.status.as_str(),
            to = next.as_str(),
            terminal = next.is_terminal(),
            "activity status changed"
        );
        activity.status = next;
        StatusUpdate::Applied
    }

    /// Snapshot, most recent first.
    #[must_use]
    pub fn list(&self) -> Vec<Activity> {
        self.lock().activities.clone()
    }

    #[must_use]
    pub fn filter(&self, filter: &ActivityFilter) -> Vec<Activity> {
        self.lock()
            .activities
            .iter()
            .filter(|activity| filter.matches(activity))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn get(&self, id: ActivityId) -> Option<Activity> {
        self.lock()
            .activities
            .iter()
            .find(|activity| activity.id == id)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().activities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().activities.is_empty()
    }
}

fn display_timestamp() -> String {
    let now = now_utc();
    format_rfc3339(now).unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn store_with_memory() -> (ActivityLogStore, Arc<MemoryNotifier>) {
        let notifier = Arc::new(MemoryNotifier::new());
        let store = ActivityLogStore::new(notifier.clone());
        (store, notifier)
    }

    fn must_some<T>(value: Option<T>) -> T {
        match value {
            Some(inner) => inner,
            None => panic!("expected Some(..), got None"),
        }
    }

    #[test]
    fn add_starts_in_progress_and_notifies() {
        let (store, notifier) = store_with_memory();
        let input = NewActivity::new(ActivityType::Call, "X", "Y");
        let activity = store.add(input.with_detail("patient_id", "p-1"));

        assert_eq!(activity.status, ActivityStatus::InProgress);
        assert!(!activity.timestamp.is_empty());
        assert_eq!(store.get(activity.id), Some(activity.clone()));

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "X");
        assert_eq!(sent[0].activity_id, activity.id);
    }

    #[test]
    fn completed_is_terminal() {
        let (store, _) = store_with_memory();
        let activity = store.add(NewActivity::new(ActivityType::Call, "X", "Y"));

        assert_eq!(
            store.update_status(activity.id, ActivityStatus::Completed),
            StatusUpdate::Applied
        );
        assert_eq!(
            store.update_status(activity.id, ActivityStatus::InProgress),
            StatusUpdate::Ignored
        );
        assert_eq!(
            store.update_status(activity.id, ActivityStatus::Failed),
            StatusUpdate::Ignored
        );
        assert_eq!(
            must_some(store.get(activity.id)).status,
            ActivityStatus::Completed
        );
    }

    #[test]
    fn failed_activity_can_be_retried() {
        let (store, _) = store_with_memory();
        let activity = store.add(NewActivity::new(ActivityType::Summary, "Summary", ""));

        assert_eq!(
            store.update_status(activity.id, ActivityStatus::Failed),
            StatusUpdate::Applied
        );
        assert_eq!(
            store.update_status(activity.id, ActivityStatus::Completed),
            StatusUpdate::Ignored
        );
        assert_eq!(
            store.update_status(activity.id, ActivityStatus::InProgress),
            StatusUpdate::Applied
        );
        assert_eq!(
            store.update_status(activity.id, ActivityStatus::Completed),
            StatusUpdate::Applied
        );
    }

    #[test]
    fn unknown_id_leaves_log_untouched() {
        let (store, _) = store_with_memory();
        let activity = store.add(NewActivity::new(ActivityType::Reminder, "Remind", ""));
        let before = store.list();

        assert_eq!(
            store.update_status(ActivityId::new(), ActivityStatus::Completed),
            StatusUpdate::NotFound
        );
        assert_eq!(store.list(), before);
        assert_eq!(
            must_some(store.get(activity.id)).status,
            ActivityStatus::InProgress
        );
    }

    #[test]
    fn list_is_newest_first_and_filterable() {
        let (store, notifier) = store_with_memory();
        let first = store.add(NewActivity::new(ActivityType::Call, "first", ""));
        let second = store.add(NewActivity::new(ActivityType::Referral, "second", ""));
        let third = store.add(NewActivity::new(ActivityType::Call, "third", ""));
        let _ = store.update_status(third.id, ActivityStatus::Failed);

        let ids: Vec<ActivityId> = store.list().iter().map(|activity| activity.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
        assert!(third.id > first.id);

        let calls = store.filter(&ActivityFilter {
            activity_type: Some(ActivityType::Call),
            status: None,
        });
        assert_eq!(calls.len(), 2);

        let failed_calls = store.filter(&ActivityFilter {
            activity_type: Some(ActivityType::Call),
            status: Some(ActivityStatus::Failed),
        });
        assert_eq!(failed_calls.len(), 1);
        assert_eq!(failed_calls[0].id, third.id);

        assert_eq!(notifier.drain().len(), 3);
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn snapshot_does_not_alias_store_state() {
        let (store, _) = store_with_memory();
        let activity = store.add(NewActivity::new(ActivityType::Call, "X", ""));
        let mut snapshot = store.list();
        snapshot[0].status = ActivityStatus::Completed;
        snapshot.clear();

        assert_eq!(store.len(), 1);
        assert_eq!(
            must_some(store.get(activity.id)).status,
            ActivityStatus::InProgress
        );
    }

    fn status_strategy() -> impl Strategy<Value = ActivityStatus> {
        prop_oneof![
            Just(ActivityStatus::InProgress),
            Just(ActivityStatus::Completed),
            Just(ActivityStatus::Failed),
        ]
    }

    proptest! {
        #[test]
        fn only_lifecycle_transitions_are_reachable(
            requests in proptest::collection::vec(status_strategy(), 0..24)
        ) {
            let (store, _) = store_with_memory();
            let activity = store.add(NewActivity::new(ActivityType::FollowUp, "follow", ""));
            let mut current = ActivityStatus::InProgress;

            for next in requests {
                let outcome = store.update_status(activity.id, next);
                let after = must_some(store.get(activity.id)).status;

                if current == ActivityStatus::Completed {
                    prop_assert_eq!(outcome, StatusUpdate::Ignored);
                    prop_assert_eq!(after, ActivityStatus::Completed);
                }
                match outcome {
                    StatusUpdate::Applied => {
                        prop_assert!(current.can_transition_to(next));
                        prop_assert_eq!(after, next);
                    }
                    StatusUpdate::Ignored => prop_assert_eq!(after, current),
                    StatusUpdate::NotFound => prop_assert!(false, "activity vanished"),
                }
                current = after;
            }
        }
    }
}
