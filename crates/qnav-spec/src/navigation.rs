//! Navigable task construction and the interview session that walks it.
//!
//! Visibility is never precomputed: every `advance` consults the compiled
//! predicates against the live answer store, so revising an earlier answer
//! reshapes the remaining path.

use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::answers::{Answer, AnswerStore, DatePrecision};
use crate::compile::{ItemIndex, Predicate, compile_conditions};
use crate::config::TaskOptions;
use crate::error::{CompileError, InterviewError, LoadError, StructuralError};
use crate::options::{ResolvedOption, resolve_options};
use crate::response::{ResponseDocument, ResponseStatus, build_response};
use crate::spec::{Constraint, Item, ItemKind, Questionnaire};
use crate::validate::{normalize_answer, validate_answer};
use crate::visibility::{VisibilityMap, resolve_visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRole {
    /// Collects an answer.
    Question,
    /// Display item; shown but never answered.
    Instruction,
    /// Terminal step appended from [`TaskOptions::completion`].
    Completion,
}

impl StepRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepRole::Question => "question",
            StepRole::Instruction => "instruction",
            StepRole::Completion => "completion",
        }
    }
}

/// One leaf item, flattened out of its groups.
#[derive(Debug, Clone)]
pub struct Step {
    pub id: String,
    pub kind: ItemKind,
    pub role: StepRole,
    pub text: Option<String>,
    pub required: bool,
    pub options: Vec<ResolvedOption>,
    pub constraint: Option<Constraint>,
    pub pattern: Option<Regex>,
    pub date_precision: Option<DatePrecision>,
    /// Identifiers of the enclosing items, outermost first.
    pub parents: Vec<String>,
}

impl Step {
    pub fn is_interactive(&self) -> bool {
        self.role == StepRole::Question
    }

    /// Open choice steps also accept free text.
    pub fn allows_other(&self) -> bool {
        self.kind == ItemKind::OpenChoice
    }

    pub fn title(&self) -> &str {
        self.text.as_deref().unwrap_or(&self.id)
    }
}

/// Skip rule: `step` is shown only while `predicate` holds; otherwise
/// navigation falls through to the next step in document order whose own
/// rule holds, or to completion.
#[derive(Debug, Clone)]
pub struct NavigationRule {
    pub step: String,
    pub predicate: Predicate,
}

/// Ordered steps plus the skip rules that drive an interview.
#[derive(Debug, Clone)]
pub struct NavigableTask {
    pub identifier: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub steps: Vec<Step>,
    pub rules: Vec<NavigationRule>,
    items: Vec<Item>,
    rule_index: Vec<Option<usize>>,
}

struct Builder<'q> {
    questionnaire: &'q Questionnaire,
    index: ItemIndex,
    steps: Vec<Step>,
    rules: Vec<NavigationRule>,
    rule_index: Vec<Option<usize>>,
}

impl Builder<'_> {
    fn walk(
        &mut self,
        items: &[Item],
        inherited: &Predicate,
        parents: &[String],
    ) -> Result<(), LoadError> {
        for item in items {
            let predicate = inherited
                .clone()
                .and(compile_conditions(item, &self.index)?);
            if item.kind == ItemKind::Group {
                if item.items.is_empty() {
                    warn!(group = %item.id, "group has no items and produces no steps");
                }
            } else {
                self.push_step(item, &predicate, parents)?;
            }
            if !item.items.is_empty() {
                let mut nested = parents.to_vec();
                nested.push(item.id.clone());
                self.walk(&item.items, &predicate, &nested)?;
            }
        }
        Ok(())
    }

    fn push_step(
        &mut self,
        item: &Item,
        predicate: &Predicate,
        parents: &[String],
    ) -> Result<(), LoadError> {
        let pattern = match item
            .constraint
            .as_ref()
            .and_then(|constraint| constraint.pattern.as_deref())
        {
            Some(pattern) => Some(Regex::new(pattern).map_err(|err| {
                CompileError::InvalidPattern {
                    item: item.id.clone(),
                    pattern: pattern.to_string(),
                    message: err.to_string(),
                }
            })?),
            None => None,
        };

        self.steps.push(Step {
            id: item.id.clone(),
            kind: item.kind,
            role: if item.kind == ItemKind::Display {
                StepRole::Instruction
            } else {
                StepRole::Question
            },
            text: item.text.clone(),
            required: item.required && item.kind.is_answerable(),
            options: resolve_options(self.questionnaire, item)?,
            constraint: item.constraint.clone(),
            pattern,
            date_precision: item.date_precision,
            parents: parents.to_vec(),
        });

        if predicate.is_always() {
            self.rule_index.push(None);
        } else {
            self.rule_index.push(Some(self.rules.len()));
            self.rules.push(NavigationRule {
                step: item.id.clone(),
                predicate: predicate.clone(),
            });
        }
        Ok(())
    }
}

impl NavigableTask {
    /// Compiles a questionnaire into a navigable task.
    ///
    /// # Errors
    /// Any malformed expression, unresolvable reference or structural defect
    /// rejects the whole questionnaire.
    pub fn build(questionnaire: &Questionnaire, options: &TaskOptions) -> Result<Self, LoadError> {
        if questionnaire.items.is_empty() {
            return Err(StructuralError::NoItems.into());
        }

        let mut builder = Builder {
            questionnaire,
            index: ItemIndex::build(&questionnaire.items)?,
            steps: Vec::new(),
            rules: Vec::new(),
            rule_index: Vec::new(),
        };
        builder.walk(&questionnaire.items, &Predicate::Always, &[])?;

        if let Some(completion) = &options.completion {
            if builder.index.position(&completion.id).is_some() {
                return Err(StructuralError::DuplicateIdentifier(completion.id.clone()).into());
            }
            builder.steps.push(Step {
                id: completion.id.clone(),
                kind: ItemKind::Display,
                role: StepRole::Completion,
                text: completion.text.clone().or_else(|| completion.title.clone()),
                required: false,
                options: Vec::new(),
                constraint: None,
                pattern: None,
                date_precision: None,
                parents: Vec::new(),
            });
            builder.rule_index.push(None);
        }

        let identifier = options
            .identifier
            .clone()
            .or_else(|| questionnaire.url.clone())
            .or_else(|| questionnaire.id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let task = NavigableTask {
            identifier,
            title: options.title.clone().or_else(|| questionnaire.title.clone()),
            description: questionnaire.description.clone(),
            steps: builder.steps,
            rules: builder.rules,
            items: questionnaire.items.clone(),
            rule_index: builder.rule_index,
        };
        info!(
            task = %task.identifier,
            steps = task.steps.len(),
            rules = task.rules.len(),
            "navigable task built"
        );
        Ok(task)
    }

    /// Item tree the task was compiled from.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.id == id)
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.id == id)
    }

    pub fn rule_for(&self, position: usize) -> Option<&NavigationRule> {
        self.rule_index
            .get(position)
            .copied()
            .flatten()
            .and_then(|rule| self.rules.get(rule))
    }

    pub fn is_visible(&self, position: usize, store: &AnswerStore) -> bool {
        self.rule_for(position)
            .is_none_or(|rule| rule.predicate.is_satisfied(store))
    }

    /// First visible step strictly after `after`, or the first visible step.
    pub fn next_visible(&self, after: Option<usize>, store: &AnswerStore) -> Option<usize> {
        let start = after.map_or(0, |position| position + 1);
        (start..self.steps.len()).find(|position| self.is_visible(*position, store))
    }

    /// Step navigation lands on when the step at `position` is skipped; `None`
    /// when nothing visible follows it.
    pub fn skip_target(&self, position: usize, store: &AnswerStore) -> Option<&Step> {
        self.next_visible(Some(position), store)
            .map(|next| &self.steps[next])
    }

    /// Brings every stored answer into the encoding its step declares.
    pub fn normalize(&self, store: &mut AnswerStore) {
        for step in &self.steps {
            if let Some(answer) = store.get(&step.id).cloned() {
                store.record(step.id.clone(), normalize_answer(step, answer));
            }
        }
    }

    /// Steps visible for `store`, in document order.
    pub fn visible_path(&self, store: &AnswerStore) -> Vec<&str> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(position, _)| self.is_visible(*position, store))
            .map(|(_, step)| step.id.as_str())
            .collect()
    }

    pub fn visibility(&self, store: &AnswerStore) -> VisibilityMap {
        resolve_visibility(self, store)
    }

    /// Clears answers of steps that are hidden for `store`.
    ///
    /// Runs in document order so that clearing an answer is seen by every
    /// later predicate in the same pass.
    pub fn clear_hidden(&self, store: &mut AnswerStore) -> Vec<String> {
        let mut cleared = Vec::new();
        for (position, step) in self.steps.iter().enumerate() {
            if store.get(&step.id).is_some() && !self.is_visible(position, store) {
                store.clear(&step.id);
                cleared.push(step.id.clone());
            }
        }
        if !cleared.is_empty() {
            debug!(task = %self.identifier, ?cleared, "cleared answers of hidden steps");
        }
        cleared
    }
}

/// Single-owner interview over a navigable task.
#[derive(Debug, Clone)]
pub struct Interview<'a> {
    task: &'a NavigableTask,
    store: AnswerStore,
    history: Vec<usize>,
    current: Option<usize>,
}

impl<'a> Interview<'a> {
    pub fn start(task: &'a NavigableTask) -> Self {
        let store = AnswerStore::new();
        let current = task.next_visible(None, &store);
        Self {
            task,
            store,
            history: Vec::new(),
            current,
        }
    }

    /// Continues from previously recorded answers, landing on the first
    /// visible question without an answer.
    pub fn resume(task: &'a NavigableTask, mut store: AnswerStore) -> Self {
        task.normalize(&mut store);
        task.clear_hidden(&mut store);
        let mut history = Vec::new();
        let mut cursor = task.next_visible(None, &store);
        while let Some(position) = cursor {
            let step = &task.steps[position];
            let settled = match step.role {
                StepRole::Question => store.is_answered(&step.id),
                StepRole::Instruction => true,
                StepRole::Completion => false,
            };
            if !settled {
                break;
            }
            history.push(position);
            cursor = task.next_visible(Some(position), &store);
        }
        Self {
            task,
            store,
            history,
            current: cursor,
        }
    }

    pub fn task(&self) -> &'a NavigableTask {
        self.task
    }

    pub fn current(&self) -> Option<&'a Step> {
        let task = self.task;
        self.current.map(|position| &task.steps[position])
    }

    fn current_step(&self) -> Result<&'a Step, InterviewError> {
        self.current().ok_or(InterviewError::Completed)
    }

    /// Validates and records an answer for the current step, then clears
    /// answers of steps the change hid. Returns the cleared identifiers.
    pub fn answer(&mut self, answer: impl Into<Answer>) -> Result<Vec<String>, InterviewError> {
        let step = self.current_step()?;
        let answer = answer.into();
        validate_answer(step, &answer)?;
        self.store.record(step.id.clone(), normalize_answer(step, answer));
        debug!(step = %step.id, "answer recorded");
        Ok(self.task.clear_hidden(&mut self.store))
    }

    pub fn clear_answer(&mut self) -> Result<Option<Answer>, InterviewError> {
        let step = self.current_step()?;
        let previous = self.store.clear(&step.id);
        self.task.clear_hidden(&mut self.store);
        Ok(previous)
    }

    /// Moves to the next visible step. Returns `None` once the interview is
    /// complete.
    pub fn advance(&mut self) -> Result<Option<&'a Step>, InterviewError> {
        let position = self.current.ok_or(InterviewError::Completed)?;
        let step = &self.task.steps[position];
        if step.is_interactive() && step.required && !self.store.is_answered(&step.id) {
            return Err(InterviewError::RequiredAnswerMissing(step.id.clone()));
        }
        self.history.push(position);
        self.current = self.task.next_visible(Some(position), &self.store);
        let next = self.current();
        debug!(from = %step.id, to = ?next.map(|step| step.id.as_str()), "advanced");
        Ok(next)
    }

    /// Returns to the previously shown step. Answers are left untouched.
    pub fn back(&mut self) -> Result<&'a Step, InterviewError> {
        let position = self.history.pop().ok_or(InterviewError::AtFirstStep)?;
        self.current = Some(position);
        Ok(&self.task.steps[position])
    }

    pub fn is_complete(&self) -> bool {
        self.current.is_none()
    }

    /// Steps shown so far, ending with the current one.
    pub fn path(&self) -> Vec<&'a str> {
        let task = self.task;
        self.history
            .iter()
            .chain(self.current.iter())
            .map(|position| task.steps[*position].id.as_str())
            .collect()
    }

    pub fn store(&self) -> &AnswerStore {
        &self.store
    }

    pub fn into_store(self) -> AnswerStore {
        self.store
    }

    pub fn response(&self) -> ResponseDocument {
        let status = if self.is_complete() {
            ResponseStatus::Completed
        } else {
            ResponseStatus::InProgress
        };
        build_response(self.task, &self.store, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::AnswerValue;
    use crate::spec::{Condition, Operator};

    fn text(value: &str) -> AnswerValue {
        AnswerValue::String(value.into())
    }

    fn questionnaire(items: Vec<Item>) -> Questionnaire {
        Questionnaire {
            id: Some("chain".into()),
            url: None,
            title: Some("Chain".into()),
            description: None,
            contained: Vec::new(),
            items,
        }
    }

    fn chain() -> NavigableTask {
        let items = vec![
            Item::new("a", ItemKind::SingleChoice)
                .required()
                .with_options([text("yes"), text("no")]),
            Item::new("b", ItemKind::Text)
                .enable_when(Condition::simple("a", Operator::Equals, text("yes"))),
            Item::new("c", ItemKind::Text),
        ];
        NavigableTask::build(&questionnaire(items), &TaskOptions::default()).expect("build")
    }

    #[test]
    fn skipped_step_is_bypassed_and_its_answer_cleared() {
        let task = chain();
        let mut interview = Interview::start(&task);
        interview.answer(text("yes")).expect("answer a");
        assert_eq!(interview.advance().expect("advance").map(|s| s.id.as_str()), Some("b"));
        interview.answer(text("details")).expect("answer b");

        interview.back().expect("back to a");
        let cleared = interview.answer(text("no")).expect("answer a");
        assert_eq!(cleared, vec!["b"]);
        assert!(!interview.store().is_answered("b"));
        assert_eq!(interview.advance().expect("advance").map(|s| s.id.as_str()), Some("c"));
        assert_eq!(interview.path(), vec!["a", "c"]);
    }

    #[test]
    fn restored_step_starts_unanswered() {
        let task = chain();
        let mut interview = Interview::start(&task);
        interview.answer(text("yes")).expect("answer a");
        interview.advance().expect("advance");
        interview.answer(text("first")).expect("answer b");
        interview.back().expect("back");
        interview.answer(text("no")).expect("hide b");
        interview.advance().expect("to c");

        interview.back().expect("back to a");
        interview.answer(text("yes")).expect("show b");
        let next = interview.advance().expect("advance").expect("next step");
        assert_eq!(next.id, "b");
        assert!(interview.store().get("b").is_none());
    }

    #[test]
    fn going_back_keeps_downstream_answers() {
        let task = chain();
        let mut interview = Interview::start(&task);
        interview.answer(text("yes")).expect("answer a");
        interview.advance().expect("to b");
        interview.answer(text("kept")).expect("answer b");
        interview.advance().expect("to c");
        interview.back().expect("back to b");
        interview.back().expect("back to a");
        assert_eq!(interview.store().values("b"), Some(&[text("kept")][..]));
        assert_eq!(interview.back().unwrap_err(), InterviewError::AtFirstStep);
    }

    #[test]
    fn required_steps_block_advance() {
        let task = chain();
        let mut interview = Interview::start(&task);
        assert_eq!(
            interview.advance().unwrap_err(),
            InterviewError::RequiredAnswerMissing("a".into())
        );
        assert!(matches!(
            interview.answer(text("maybe")),
            Err(InterviewError::InvalidAnswer(_))
        ));
    }

    #[test]
    fn interview_completes_after_last_visible_step() {
        let task = chain();
        let mut interview = Interview::start(&task);
        interview.answer(text("no")).expect("answer a");
        interview.advance().expect("to c");
        assert!(interview.advance().expect("finish").is_none());
        assert!(interview.is_complete());
        assert_eq!(interview.advance().unwrap_err(), InterviewError::Completed);
        assert_eq!(interview.back().expect("back").id, "c");
    }

    #[test]
    fn group_conditions_apply_to_children() {
        let items = vec![
            Item::new("smoker", ItemKind::SingleChoice).with_options([text("yes"), text("no")]),
            Item::new("habits", ItemKind::Group)
                .enable_when(Condition::expression("answer-of(smoker) = 'yes'"))
                .with_items(vec![
                    Item::new("per-day", ItemKind::Numeric),
                    Item::new("years", ItemKind::Numeric),
                ]),
            Item::new("notes", ItemKind::Text),
        ];
        let task = NavigableTask::build(&questionnaire(items), &TaskOptions::default())
            .expect("build");
        assert_eq!(task.rules.len(), 2);
        assert_eq!(task.steps[1].parents, vec!["habits"]);

        let mut store = AnswerStore::new();
        store.record("smoker", text("no"));
        assert_eq!(task.visible_path(&store), vec!["smoker", "notes"]);
        store.record("smoker", text("yes"));
        assert_eq!(
            task.visible_path(&store),
            vec!["smoker", "per-day", "years", "notes"]
        );
    }

    #[test]
    fn completion_step_is_terminal_and_never_skipped() {
        let options = TaskOptions::default().with_completion("done", "Thank you");
        let items = vec![Item::new("only", ItemKind::Text)];
        let task = NavigableTask::build(&questionnaire(items), &options).expect("build");
        let mut interview = Interview::start(&task);
        let done = interview.advance().expect("advance").expect("completion");
        assert_eq!(done.role, StepRole::Completion);
        assert!(interview.advance().expect("finish").is_none());
    }

    #[test]
    fn resume_lands_on_first_unanswered_question() {
        let task = chain();
        let mut store = AnswerStore::new();
        store.record("a", text("no"));
        store.record("b", text("stale"));
        let interview = Interview::resume(&task, store);
        assert_eq!(interview.current().map(|step| step.id.as_str()), Some("c"));
        assert!(interview.store().get("b").is_none());
        assert_eq!(interview.path(), vec!["a", "c"]);
    }

    #[test]
    fn skip_target_is_next_visible_step() {
        let task = chain();
        let mut store = AnswerStore::new();
        store.record("a", text("no"));
        assert!(!task.is_visible(1, &store));
        assert_eq!(task.skip_target(1, &store).map(|step| step.id.as_str()), Some("c"));
        assert!(task.skip_target(2, &store).is_none());
    }

    #[test]
    fn identifier_falls_back_to_url_then_id() {
        let mut source = questionnaire(vec![Item::new("q", ItemKind::Text)]);
        let task = NavigableTask::build(&source, &TaskOptions::default()).expect("build");
        assert_eq!(task.identifier, "chain");

        source.url = Some("http://example.org/q/chain".into());
        let task = NavigableTask::build(&source, &TaskOptions::default()).expect("build");
        assert_eq!(task.identifier, "http://example.org/q/chain");

        source.id = None;
        source.url = None;
        let task = NavigableTask::build(&source, &TaskOptions::default()).expect("build");
        assert!(Uuid::parse_str(&task.identifier).is_ok());
    }

    #[test]
    fn empty_questionnaire_is_rejected() {
        assert_eq!(
            NavigableTask::build(&questionnaire(Vec::new()), &TaskOptions::default()).unwrap_err(),
            LoadError::Structural(StructuralError::NoItems)
        );
    }

    #[test]
    fn invalid_pattern_is_a_compile_error() {
        let mut item = Item::new("code", ItemKind::Text);
        item.constraint = Some(Constraint {
            pattern: Some("([a-z".into()),
            ..Constraint::default()
        });
        assert!(matches!(
            NavigableTask::build(&questionnaire(vec![item]), &TaskOptions::default()),
            Err(LoadError::Compile(CompileError::InvalidPattern { .. }))
        ));
    }
}
