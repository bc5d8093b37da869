use crate::answers::AnswerStore;
use crate::navigation::NavigableTask;

pub type VisibilityMap = std::collections::BTreeMap<String, bool>;

/// Visibility of every step for one snapshot of the answer store.
pub fn resolve_visibility(task: &NavigableTask, store: &AnswerStore) -> VisibilityMap {
    task.steps
        .iter()
        .enumerate()
        .map(|(position, step)| (step.id.clone(), task.is_visible(position, store)))
        .collect()
}
