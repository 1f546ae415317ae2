//! Task list filtering.
//!
//! Stages are applied in a fixed order and all of them must match. Role scoping
//! comes first and does not depend on the filter state.

use chrono::{DateTime, Utc};

use crate::dates::parse_instant;
use crate::models::{FilterState, Identity, Task};

/// Tasks the identity may see that pass every active filter, in mirror order.
pub fn visible_tasks<'a>(
    tasks: &'a [Task],
    identity: &Identity,
    filters: &FilterState,
    now: DateTime<Utc>,
) -> Vec<&'a Task> {
    let query = filters
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);

    tasks
        .iter()
        .filter(|task| identity.can_see(task))
        .filter(|task| filters.store.as_deref().map_or(true, |s| task.store == s))
        .filter(|task| filters.status.map_or(true, |s| task.status == s))
        .filter(|task| filters.validation.map_or(true, |v| task.validation == v))
        .filter(|task| !filters.overdue || is_overdue(task, now))
        .filter(|task| query.as_deref().map_or(true, |q| matches_text(task, q)))
        .collect()
}

/// Deadline strictly in the past and the task not finished. A missing or
/// unparseable deadline is never overdue.
pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    if task.status.is_terminal() {
        return false;
    }
    parse_instant(&task.deadline).is_some_and(|deadline| deadline < now)
}

/// `query` must already be lowercase.
fn matches_text(task: &Task, query: &str) -> bool {
    let haystack = [
        task.title.as_str(),
        task.notes.as_str(),
        task.controller.as_str(),
        task.store_manager.as_str(),
        task.feedback.as_str(),
    ]
    .join(" ")
    .to_lowercase();
    haystack.contains(query)
}
