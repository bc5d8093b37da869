pub mod condition;
pub mod item;
pub mod questionnaire;

pub use condition::{CombinationMode, Condition, Operator, SimpleCondition};
pub use item::{AnswerOption, Constraint, Item, ItemKind};
pub use questionnaire::{Questionnaire, ValueSet, ValueSetConcept};
