use crate::answers::AnswerValue;
use crate::error::ParseError;
use crate::expr::lexer::{Lexer, Token, TokenKind};
use crate::expr::{CompareOp, Expr, Function};

const KEYWORDS: [&str; 3] = ["and", "or", "not"];

/// Parses `source` into an expression tree.
///
/// # Errors
/// Returns a [`ParseError`] with the byte offset of the offending token for
/// unterminated strings, unknown operators, missing operands, unknown
/// functions and trailing tokens.
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_or()?;
    parser.expect(TokenKind::Eof, "end of input")?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            position: 0,
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.position].clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    fn error(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError::new(token.position, expected, token.kind.describe())
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error(expected))
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Word(word) if word == keyword)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.at_keyword("or") {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.at_keyword("and") {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.at_keyword("not") {
            self.advance();
            let inner = self.parse_comparison()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_operand()?;
        let op = match self.peek().kind {
            TokenKind::Eq => CompareOp::Eq,
            TokenKind::Ne => CompareOp::Ne,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Le => CompareOp::Le,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Ge => CompareOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_operand()?;
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_operand(&mut self) -> Result<Expr, ParseError> {
        let expected = "literal, answer-of(...) or function call";
        match &self.peek().kind {
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Word(word) if KEYWORDS.contains(&word.as_str()) => Err(self.error(expected)),
            TokenKind::Word(word) => {
                let word = word.clone();
                match word.as_str() {
                    "true" => {
                        self.advance();
                        Ok(Expr::Literal(AnswerValue::Boolean(true)))
                    }
                    "false" => {
                        self.advance();
                        Ok(Expr::Literal(AnswerValue::Boolean(false)))
                    }
                    "answer-of" | "exists" | "count" | "memberOf" => self.parse_call(&word),
                    _ => {
                        let start = self.advance();
                        if self.peek().kind == TokenKind::LParen {
                            Err(ParseError::new(
                                start.position,
                                "one of answer-of, exists, count, memberOf",
                                format!("unknown function '{word}'"),
                            ))
                        } else {
                            Err(ParseError::new(start.position, expected, start.kind.describe()))
                        }
                    }
                }
            }
            TokenKind::Number(_) | TokenKind::Str(_) | TokenKind::Temporal(_) => {
                self.parse_literal().map(Expr::Literal)
            }
            _ => Err(self.error(expected)),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr, ParseError> {
        self.advance();
        self.expect(TokenKind::LParen, "'(' after function name")?;
        let id = self.parse_reference()?;
        let expr = match name {
            "answer-of" => Expr::Answer(id),
            "exists" => Expr::Call(Function::Exists(id)),
            "count" => Expr::Call(Function::Count(id)),
            _ => {
                self.expect(TokenKind::Comma, "','")?;
                let value = self.parse_literal()?;
                Expr::Call(Function::MemberOf(id, value))
            }
        };
        self.expect(TokenKind::RParen, "')'")?;
        Ok(expr)
    }

    fn parse_reference(&mut self) -> Result<String, ParseError> {
        match &self.peek().kind {
            TokenKind::Word(id) | TokenKind::Number(id) | TokenKind::Str(id) => {
                let id = id.clone();
                self.advance();
                Ok(id)
            }
            _ => Err(self.error("question identifier")),
        }
    }

    fn parse_literal(&mut self) -> Result<AnswerValue, ParseError> {
        let token = self.peek().clone();
        let value = match &token.kind {
            TokenKind::Str(text) => AnswerValue::String(text.clone()),
            TokenKind::Temporal(value) => value.clone(),
            TokenKind::Word(word) if word == "true" => AnswerValue::Boolean(true),
            TokenKind::Word(word) if word == "false" => AnswerValue::Boolean(false),
            TokenKind::Number(raw) if raw.contains('.') => raw
                .parse::<f64>()
                .map(AnswerValue::Decimal)
                .map_err(|_| ParseError::new(token.position, "decimal", token.kind.describe()))?,
            TokenKind::Number(raw) => raw
                .trim_start_matches('+')
                .parse::<i64>()
                .map(AnswerValue::Integer)
                .map_err(|_| {
                    ParseError::new(token.position, "64-bit integer", token.kind.describe())
                })?,
            _ => return Err(self.error("literal")),
        };
        self.advance();
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(id: &str) -> Box<Expr> {
        Box::new(Expr::Answer(id.into()))
    }

    fn text(value: &str) -> Box<Expr> {
        Box::new(Expr::Literal(AnswerValue::String(value.into())))
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse("answer-of(a) = 'x' or answer-of(b) = 'y' and not exists(c)").unwrap();
        let expected = Expr::Or(
            Box::new(Expr::Compare {
                op: CompareOp::Eq,
                left: answer("a"),
                right: text("x"),
            }),
            Box::new(Expr::And(
                Box::new(Expr::Compare {
                    op: CompareOp::Eq,
                    left: answer("b"),
                    right: text("y"),
                }),
                Box::new(Expr::Not(Box::new(Expr::Call(Function::Exists("c".into()))))),
            )),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn literals_keep_their_declared_type() {
        let cases = [
            ("answer-of(q) = 3", AnswerValue::Integer(3)),
            ("answer-of(q) = -2.5", AnswerValue::Decimal(-2.5)),
            ("answer-of(q) = true", AnswerValue::Boolean(true)),
            ("answer-of(q) = \"green\"", AnswerValue::String("green".into())),
        ];
        for (source, literal) in cases {
            let Expr::Compare { right, .. } = parse(source).unwrap() else {
                panic!("{source} is not a comparison");
            };
            assert_eq!(*right, Expr::Literal(literal), "{source}");
        }
    }

    #[test]
    fn numeric_identifiers_are_references() {
        let expr = parse("answer-of(1.1) = 'x' and count(2) > 1").unwrap();
        assert_eq!(expr.references(), vec!["1.1", "2"]);
    }

    #[test]
    fn member_of_takes_a_literal() {
        let expr = parse("memberOf(toppings, 'sprinkles')").unwrap();
        assert_eq!(
            expr,
            Expr::Call(Function::MemberOf(
                "toppings".into(),
                AnswerValue::String("sprinkles".into())
            ))
        );
        assert!(parse("memberOf(toppings, answer-of(x))").is_err());
    }

    #[test]
    fn missing_right_operand_fails() {
        let err = parse("answer-of(q1) =").unwrap_err();
        assert_eq!(err.position, 15);
        assert_eq!(err.found, "end of input");
        assert_eq!(err.expected, "literal, answer-of(...) or function call");
    }

    #[test]
    fn trailing_tokens_fail() {
        let err = parse("exists(q1) exists(q2)").unwrap_err();
        assert_eq!(err.position, 11);
        assert_eq!(err.expected, "end of input");
    }

    #[test]
    fn unknown_functions_and_bare_words_fail() {
        let err = parse("sum(q1) > 2").unwrap_err();
        assert_eq!(err.found, "unknown function 'sum'");
        let err = parse("q1 = 'x'").unwrap_err();
        assert_eq!(err.position, 0);
        assert!(parse("and").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn unbalanced_parentheses_fail() {
        let err = parse("(exists(q1)").unwrap_err();
        assert_eq!(err.expected, "')'");
        assert!(parse("exists(q1))").is_err());
    }

    #[test]
    fn comparisons_do_not_chain() {
        let err = parse("count(a) < 2 < 3").unwrap_err();
        assert_eq!(err.expected, "end of input");
    }
}
