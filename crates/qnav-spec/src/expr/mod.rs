//! Restricted expression language used by `enable_when` expressions.
//!
//! ```text
//! expr       := orExpr
//! orExpr     := andExpr ("or" andExpr)*
//! andExpr    := notExpr ("and" notExpr)*
//! notExpr    := "not"? comparison
//! comparison := operand (("=" | "!=" | "<" | ">" | "<=" | ">=") operand)?
//! operand    := literal | "answer-of" "(" id ")" | call | "(" expr ")"
//! call       := "exists" "(" id ")" | "count" "(" id ")" | "memberOf" "(" id "," literal ")"
//! ```

mod eval;
mod lexer;
mod parser;

use std::fmt;
use std::str::FromStr;

use crate::answers::AnswerValue;
use crate::error::ParseError;

pub(crate) use eval::compare_answers;
pub use parser::parse;

/// Comparison operators of the expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        }
    }

    /// Operator with its operands swapped: `a < b` iff `b > a`.
    pub fn flip(&self) -> CompareOp {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Ge => CompareOp::Le,
            other => *other,
        }
    }
}

/// Closed set of callable functions.
#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    Exists(String),
    Count(String),
    MemberOf(String, AnswerValue),
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(AnswerValue),
    /// `answer-of(id)`.
    Answer(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call(Function),
}

impl Expr {
    /// Question identifiers referenced anywhere in the tree, in source order.
    pub fn references(&self) -> Vec<&str> {
        let mut found = Vec::new();
        self.collect_references(&mut found);
        found
    }

    fn collect_references<'a>(&'a self, found: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Answer(id)
            | Expr::Call(Function::Exists(id))
            | Expr::Call(Function::Count(id))
            | Expr::Call(Function::MemberOf(id, _)) => found.push(id),
            Expr::Not(inner) => inner.collect_references(found),
            Expr::And(left, right) | Expr::Or(left, right) => {
                left.collect_references(found);
                right.collect_references(found);
            }
            Expr::Compare { left, right, .. } => {
                left.collect_references(found);
                right.collect_references(found);
            }
        }
    }

    fn is_operand(&self) -> bool {
        matches!(self, Expr::Literal(_) | Expr::Answer(_) | Expr::Call(_))
    }
}

impl FromStr for Expr {
    type Err = ParseError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        parse(source)
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("'")?;
    for c in text.chars() {
        match c {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            other => write!(f, "{other}")?,
        }
    }
    f.write_str("'")
}

fn write_reference(f: &mut fmt::Formatter<'_>, id: &str) -> fmt::Result {
    if !id.is_empty() && id.chars().all(lexer::is_word_char) {
        f.write_str(id)
    } else {
        write_quoted(f, id)
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &AnswerValue) -> fmt::Result {
    match value {
        AnswerValue::String(text) => write_quoted(f, text),
        AnswerValue::Coding(coding) => write_quoted(f, &coding.code),
        AnswerValue::Date(_) | AnswerValue::DateTime(_) => write!(f, "@{value}"),
        AnswerValue::Time(_) => write!(f, "@T{value}"),
        other => write!(f, "{other}"),
    }
}

struct Grouped<'a>(&'a Expr);

impl fmt::Display for Grouped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_operand() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "({})", self.0)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write_literal(f, value),
            Expr::Answer(id) => {
                f.write_str("answer-of(")?;
                write_reference(f, id)?;
                f.write_str(")")
            }
            Expr::Call(Function::Exists(id)) => {
                f.write_str("exists(")?;
                write_reference(f, id)?;
                f.write_str(")")
            }
            Expr::Call(Function::Count(id)) => {
                f.write_str("count(")?;
                write_reference(f, id)?;
                f.write_str(")")
            }
            Expr::Call(Function::MemberOf(id, value)) => {
                f.write_str("memberOf(")?;
                write_reference(f, id)?;
                f.write_str(", ")?;
                write_literal(f, value)?;
                f.write_str(")")
            }
            Expr::Not(inner) => match inner.as_ref() {
                Expr::Compare { .. } => write!(f, "not {inner}"),
                other => write!(f, "not {}", Grouped(other)),
            },
            Expr::And(left, right) => {
                for (index, side) in [left, right].into_iter().enumerate() {
                    if index > 0 {
                        f.write_str(" and ")?;
                    }
                    match side.as_ref() {
                        Expr::Or(..) => write!(f, "({side})")?,
                        other => write!(f, "{other}")?,
                    }
                }
                Ok(())
            }
            Expr::Or(left, right) => write!(f, "{left} or {right}"),
            Expr::Compare { op, left, right } => {
                write!(f, "{} {} {}", Grouped(left), op.symbol(), Grouped(right))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_parser() {
        let sources = [
            "answer-of(q1) = 'Yes' and answer-of(q2) = 'green'",
            "not exists(q1) or count(q3) >= 2",
            "(answer-of(a) = 1 or answer-of(b) = 2.5) and memberOf(c, 'x')",
            "answer-of(dob) < @2001-01-01 and answer-of(visit) >= @2021-08",
            "not (answer-of(flag) = true and answer-of('odd id') != 'it\\'s')",
        ];
        for source in sources {
            let parsed = parse(source).unwrap_or_else(|err| panic!("{source}: {err}"));
            let rendered = parsed.to_string();
            let reparsed = parse(&rendered).unwrap_or_else(|err| panic!("{rendered}: {err}"));
            assert_eq!(parsed, reparsed, "{source} rendered as {rendered}");
        }
    }

    #[test]
    fn references_are_collected_in_source_order() {
        let expr: Expr = "exists(a) and (answer-of(b) = 1 or memberOf(c, 'x'))"
            .parse()
            .expect("parse");
        assert_eq!(expr.references(), vec!["a", "b", "c"]);
    }

    #[test]
    fn flip_swaps_ordering_operators_only() {
        assert_eq!(CompareOp::Lt.flip(), CompareOp::Gt);
        assert_eq!(CompareOp::Ge.flip(), CompareOp::Le);
        assert_eq!(CompareOp::Eq.flip(), CompareOp::Eq);
        assert_eq!(CompareOp::Ne.flip(), CompareOp::Ne);
    }
}
