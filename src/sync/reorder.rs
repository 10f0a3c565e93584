//! Ordering operations over id sequences. Persisting the result is the caller's job.

use crate::models::Todo;

/// Move `source` to the position of `destination` within `ids`.
///
/// Returns `None` when the ids are equal or either is missing. Elements between
/// the two positions shift by one; nothing is swapped.
pub fn move_within(ids: &[String], source: &str, destination: &str) -> Option<Vec<String>> {
    if source == destination {
        return None;
    }
    let from = ids.iter().position(|id| id == source)?;
    let to = ids.iter().position(|id| id == destination)?;

    let mut next = ids.to_vec();
    let moved = next.remove(from);
    next.insert(to, moved);
    Some(next)
}

/// Rearrange `items` to follow `order`; items missing from it go last.
pub fn arrange_by<T>(items: &mut [T], order: &[String], id: impl Fn(&T) -> &str) {
    items.sort_by_key(|item| {
        order
            .iter()
            .position(|o| o == id(item))
            .unwrap_or(usize::MAX)
    });
}

fn ids_of(todos: &[Todo]) -> Vec<String> {
    todos.iter().map(|t| t.id.clone()).collect()
}

/// Visible items by priority (red, yellow, blue, then the rest), ties by oldest
/// first, followed by the hidden items in their current order.
pub fn sort_by_priority(visible: &[Todo], hidden: &[Todo]) -> Vec<String> {
    let mut sorted = visible.to_vec();
    sorted.sort_by(|a, b| {
        a.color
            .priority_rank()
            .cmp(&b.color.priority_rank())
            .then(a.created_at.cmp(&b.created_at))
    });
    let mut ids = ids_of(&sorted);
    ids.extend(ids_of(hidden));
    ids
}

/// Visible items newest first, followed by the hidden items in their current order.
pub fn sort_by_added_time(visible: &[Todo], hidden: &[Todo]) -> Vec<String> {
    let mut sorted = visible.to_vec();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let mut ids = ids_of(&sorted);
    ids.extend(ids_of(hidden));
    ids
}
