use std::borrow::Cow;
use std::cmp::Ordering;

use chrono::{NaiveDateTime, NaiveTime};

use crate::answers::{AnswerStore, AnswerValue, PartialDate};
use crate::error::EvaluationError;
use crate::expr::{CompareOp, Expr, Function};

enum Operand<'a> {
    Scalar(Cow<'a, AnswerValue>),
    Answers(&'a [AnswerValue]),
}

impl Expr {
    /// Evaluates the expression against a snapshot of the answer store.
    ///
    /// `and`/`or` short-circuit left to right; a fault on one side is
    /// absorbed only when the other side decides the result on its own.
    pub fn evaluate(&self, store: &AnswerStore) -> Result<bool, EvaluationError> {
        match self {
            Expr::Literal(AnswerValue::Boolean(value)) => Ok(*value),
            Expr::Literal(other) => Err(mismatch("boolean", other)),
            Expr::Answer(id) => match answers(store, id)? {
                [AnswerValue::Boolean(value)] => Ok(*value),
                [single] => Err(mismatch("boolean", single)),
                _ => Err(EvaluationError::TypeMismatch {
                    expected: "boolean".into(),
                    found: "multiple answers".into(),
                }),
            },
            Expr::Not(inner) => inner.evaluate(store).map(|value| !value),
            Expr::And(left, right) => match left.evaluate(store) {
                Ok(false) => Ok(false),
                Ok(true) => right.evaluate(store),
                Err(err) => match right.evaluate(store) {
                    Ok(false) => Ok(false),
                    _ => Err(err),
                },
            },
            Expr::Or(left, right) => match left.evaluate(store) {
                Ok(true) => Ok(true),
                Ok(false) => right.evaluate(store),
                Err(err) => match right.evaluate(store) {
                    Ok(true) => Ok(true),
                    _ => Err(err),
                },
            },
            Expr::Compare { op, left, right } => {
                compare(*op, operand(left, store)?, operand(right, store)?)
            }
            Expr::Call(Function::Exists(id)) => Ok(store.is_answered(id)),
            Expr::Call(Function::MemberOf(id, literal)) => {
                compare_answers(CompareOp::Eq, answers(store, id)?, literal)
            }
            Expr::Call(Function::Count(_)) => Err(EvaluationError::TypeMismatch {
                expected: "boolean".into(),
                found: "integer".into(),
            }),
        }
    }
}

fn answers<'a>(store: &'a AnswerStore, id: &str) -> Result<&'a [AnswerValue], EvaluationError> {
    match store.values(id) {
        Some(values) if !values.is_empty() => Ok(values),
        _ => Err(EvaluationError::MissingAnswer(id.to_string())),
    }
}

fn operand<'a>(expr: &'a Expr, store: &'a AnswerStore) -> Result<Operand<'a>, EvaluationError> {
    Ok(match expr {
        Expr::Literal(value) => Operand::Scalar(Cow::Borrowed(value)),
        Expr::Answer(id) => Operand::Answers(answers(store, id)?),
        Expr::Call(Function::Count(id)) => {
            let count = store.values(id).map_or(0, <[AnswerValue]>::len);
            Operand::Scalar(Cow::Owned(AnswerValue::Integer(count as i64)))
        }
        other => Operand::Scalar(Cow::Owned(AnswerValue::Boolean(other.evaluate(store)?))),
    })
}

fn compare(op: CompareOp, left: Operand<'_>, right: Operand<'_>) -> Result<bool, EvaluationError> {
    match (left, right) {
        (Operand::Answers(values), Operand::Scalar(literal)) => {
            compare_answers(op, values, &literal)
        }
        (Operand::Scalar(literal), Operand::Answers(values)) => {
            compare_answers(op.flip(), values, &literal)
        }
        (Operand::Scalar(left), Operand::Scalar(right)) => apply(op, &left, &right),
        (Operand::Answers(left), Operand::Answers(right)) => {
            if op == CompareOp::Ne {
                all(left, |value| compare_answers(CompareOp::Ne, right, value))
            } else {
                any(left, |value| compare_answers(op.flip(), right, value))
            }
        }
    }
}

/// Compares recorded answers against one literal. Inequality must hold for
/// every value; every other operator for at least one.
pub(crate) fn compare_answers(
    op: CompareOp,
    values: &[AnswerValue],
    literal: &AnswerValue,
) -> Result<bool, EvaluationError> {
    if op == CompareOp::Ne {
        all(values, |value| apply(op, value, literal))
    } else {
        any(values, |value| apply(op, value, literal))
    }
}

fn any(
    values: &[AnswerValue],
    mut check: impl FnMut(&AnswerValue) -> Result<bool, EvaluationError>,
) -> Result<bool, EvaluationError> {
    let mut fault = None;
    for value in values {
        match check(value) {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(err) => {
                fault.get_or_insert(err);
            }
        }
    }
    fault.map_or(Ok(false), Err)
}

fn all(
    values: &[AnswerValue],
    mut check: impl FnMut(&AnswerValue) -> Result<bool, EvaluationError>,
) -> Result<bool, EvaluationError> {
    let mut fault = None;
    for value in values {
        match check(value) {
            Ok(false) => return Ok(false),
            Ok(true) => {}
            Err(err) => {
                fault.get_or_insert(err);
            }
        }
    }
    fault.map_or(Ok(true), Err)
}

fn apply(op: CompareOp, value: &AnswerValue, literal: &AnswerValue) -> Result<bool, EvaluationError> {
    let ordering = order(value, literal)?;
    let holds = |check: fn(Ordering) -> bool| {
        ordering.map(check).ok_or_else(|| EvaluationError::Incomparable {
            left: describe(value),
            right: describe(literal),
        })
    };
    match op {
        CompareOp::Eq => Ok(ordering == Some(Ordering::Equal)),
        CompareOp::Ne => Ok(ordering != Some(Ordering::Equal)),
        CompareOp::Lt => holds(Ordering::is_lt),
        CompareOp::Le => holds(Ordering::is_le),
        CompareOp::Gt => holds(Ordering::is_gt),
        CompareOp::Ge => holds(Ordering::is_ge),
    }
}

fn describe(value: &AnswerValue) -> String {
    format!("{} {}", value.kind_label(), value)
}

fn mismatch(expected: &str, found: &AnswerValue) -> EvaluationError {
    EvaluationError::TypeMismatch {
        expected: expected.to_string(),
        found: found.kind_label().to_string(),
    }
}

fn numeric(value: &AnswerValue) -> Result<f64, EvaluationError> {
    match value {
        AnswerValue::String(text) => text.trim().parse().map_err(|_| mismatch("number", value)),
        other => other.as_f64().ok_or_else(|| mismatch("number", other)),
    }
}

/// Orders an answer against a literal, converting the answer to the
/// literal's type. `Ok(None)` means the values are unequal and unordered.
fn order(value: &AnswerValue, literal: &AnswerValue) -> Result<Option<Ordering>, EvaluationError> {
    use AnswerValue as V;

    Ok(match (value, literal) {
        (V::Integer(left), V::Integer(right)) => Some(left.cmp(right)),
        (_, V::Integer(_) | V::Decimal(_)) => {
            let right = literal.as_f64().unwrap_or(f64::NAN);
            numeric(value)?.partial_cmp(&right)
        }
        (V::Boolean(left), V::Boolean(right)) => Some(left.cmp(right)),
        (V::String(text), V::Boolean(right)) => match text.trim() {
            "true" => Some(true.cmp(right)),
            "false" => Some(false.cmp(right)),
            _ => return Err(mismatch("boolean", value)),
        },
        (V::Coding(coding), V::String(text)) | (V::String(text), V::Coding(coding)) => {
            (coding.code == *text || coding.display.as_deref() == Some(text.as_str()))
                .then_some(Ordering::Equal)
        }
        (V::Coding(left), V::Coding(right)) => left.matches(right).then_some(Ordering::Equal),
        (_, V::String(text)) => Some(value.to_string().as_str().cmp(text.as_str())),
        (V::Date(left), V::Date(right)) => left.compare(right),
        (V::DateTime(left), V::Date(right)) => PartialDate::Full(left.date()).compare(right),
        (V::String(text), V::Date(right)) => text
            .parse::<PartialDate>()
            .map_err(|_| mismatch("date", value))?
            .compare(right),
        (V::DateTime(left), V::DateTime(right)) => Some(left.cmp(right)),
        (V::Date(PartialDate::Full(date)), V::DateTime(right)) => {
            date.and_hms_opt(0, 0, 0).map(|midnight| midnight.cmp(right))
        }
        (V::String(text), V::DateTime(right)) => {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                .map_err(|_| mismatch("date-time", value))?
                .partial_cmp(right)
        }
        (V::Time(left), V::Time(right)) => Some(left.cmp(right)),
        (V::String(text), V::Time(right)) => NaiveTime::parse_from_str(text, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
            .map_err(|_| mismatch("time", value))?
            .partial_cmp(right),
        _ => return Err(mismatch(literal.kind_label(), value)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::{Answer, Coding};
    use crate::expr::parse;

    fn store(entries: &[(&str, AnswerValue)]) -> AnswerStore {
        let mut store = AnswerStore::new();
        for (id, value) in entries {
            store.record(*id, value.clone());
        }
        store
    }

    fn text(value: &str) -> AnswerValue {
        AnswerValue::String(value.into())
    }

    fn eval(source: &str, store: &AnswerStore) -> Result<bool, EvaluationError> {
        parse(source).expect("parse").evaluate(store)
    }

    #[test]
    fn conjunction_of_equalities() {
        let source = "answer-of(q1) = 'Yes' and answer-of(q2) = 'green'";
        let mut answers = store(&[("q1", text("Yes")), ("q2", text("green"))]);
        assert_eq!(eval(source, &answers), Ok(true));
        answers.record("q2", text("orange"));
        assert_eq!(eval(source, &answers), Ok(false));
    }

    #[test]
    fn exists_tracks_any_recorded_value() {
        let mut answers = AnswerStore::new();
        assert_eq!(eval("exists(q1)", &answers), Ok(false));
        answers.record("q1", text(""));
        assert_eq!(eval("exists(q1)", &answers), Ok(true));
    }

    #[test]
    fn unguarded_missing_answer_is_a_fault() {
        let answers = AnswerStore::new();
        assert_eq!(
            eval("answer-of(q1) = 'Yes'", &answers),
            Err(EvaluationError::MissingAnswer("q1".into()))
        );
        assert_eq!(eval("exists(q1) and answer-of(q1) = 'Yes'", &answers), Ok(false));
        assert_eq!(eval("not exists(q1) or answer-of(q1) = 'Yes'", &answers), Ok(true));
    }

    #[test]
    fn faults_are_absorbed_only_when_the_other_side_decides() {
        let answers = store(&[("q2", text("x"))]);
        assert_eq!(eval("answer-of(q1) = 1 and answer-of(q2) = 'y'", &answers), Ok(false));
        assert_eq!(eval("answer-of(q1) = 1 or answer-of(q2) = 'x'", &answers), Ok(true));
        assert!(eval("answer-of(q1) = 1 or answer-of(q2) = 'y'", &answers).is_err());
        assert!(eval("not (answer-of(q1) = 1)", &answers).is_err());
    }

    #[test]
    fn multi_select_equality_is_contains() {
        let mut answers = AnswerStore::new();
        answers.record(
            "toppings",
            Answer::many(vec![text("sprinkles"), text("marshmallows")]),
        );
        assert_eq!(eval("answer-of(toppings) = 'sprinkles'", &answers), Ok(true));
        assert_eq!(eval("answer-of(toppings) = 'nuts'", &answers), Ok(false));
        assert_eq!(eval("answer-of(toppings) != 'nuts'", &answers), Ok(true));
        assert_eq!(eval("answer-of(toppings) != 'sprinkles'", &answers), Ok(false));
        assert_eq!(eval("'sprinkles' = answer-of(toppings)", &answers), Ok(true));
        assert_eq!(eval("memberOf(toppings, 'marshmallows')", &answers), Ok(true));
        assert_eq!(eval("count(toppings) = 2", &answers), Ok(true));
        assert_eq!(eval("count(missing) = 0", &answers), Ok(true));
    }

    #[test]
    fn numbers_convert_to_the_literal_type() {
        let answers = store(&[
            ("age", AnswerValue::Integer(12)),
            ("weight", AnswerValue::Decimal(2.5)),
            ("typed", text("7")),
        ]);
        assert_eq!(eval("answer-of(age) > 10", &answers), Ok(true));
        assert_eq!(eval("answer-of(age) = 12.0", &answers), Ok(true));
        assert_eq!(eval("answer-of(weight) <= 2", &answers), Ok(false));
        assert_eq!(eval("answer-of(typed) >= 7", &answers), Ok(true));
        assert_eq!(eval("10 < answer-of(age)", &answers), Ok(true));
        assert!(matches!(
            eval("answer-of(age) > @2020", &answers),
            Err(EvaluationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn dates_compare_on_shared_precision() {
        let answers = store(&[
            ("dob", AnswerValue::Date("1990-05-17".parse().unwrap())),
            ("year", AnswerValue::Date(PartialDate::Year(2021))),
        ]);
        assert_eq!(eval("answer-of(dob) < @2001-01-01", &answers), Ok(true));
        assert_eq!(eval("answer-of(dob) >= @1990-04", &answers), Ok(true));
        assert_eq!(eval("answer-of(year) = @2021-08", &answers), Ok(false));
        assert!(matches!(
            eval("answer-of(year) < @2021-08", &answers),
            Err(EvaluationError::Incomparable { .. })
        ));
    }

    #[test]
    fn codings_match_code_or_display() {
        let answers = store(&[(
            "q1",
            AnswerValue::Coding(Coding::new(Some("urn:yn"), "Y", Some("Yes"))),
        )]);
        assert_eq!(eval("answer-of(q1) = 'Yes'", &answers), Ok(true));
        assert_eq!(eval("answer-of(q1) = 'Y'", &answers), Ok(true));
        assert_eq!(eval("answer-of(q1) = 'No'", &answers), Ok(false));
        assert!(eval("answer-of(q1) > 'No'", &answers).is_err());
    }

    #[test]
    fn boolean_answers_stand_alone() {
        let answers = store(&[("consent", AnswerValue::Boolean(true)), ("name", text("x"))]);
        assert_eq!(eval("answer-of(consent)", &answers), Ok(true));
        assert_eq!(eval("answer-of(consent) = false", &answers), Ok(false));
        assert!(eval("answer-of(name)", &answers).is_err());
        assert!(eval("'text'", &answers).is_err());
        assert!(eval("count(name)", &answers).is_err());
    }

    #[test]
    fn evaluation_is_idempotent() {
        let answers = store(&[("q1", text("Yes"))]);
        let expr = parse("answer-of(q1) = 'Yes' and not exists(q2)").unwrap();
        let first = expr.evaluate(&answers);
        for _ in 0..3 {
            assert_eq!(expr.evaluate(&answers), first);
        }
    }
}
