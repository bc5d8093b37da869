use chrono::{NaiveDateTime, NaiveTime};

use crate::answers::{AnswerValue, PartialDate};
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Keywords, function names and bare identifiers.
    Word(String),
    /// Raw numeric text; converted by the parser.
    Number(String),
    Str(String),
    /// `@`-prefixed date, date-time or time literal.
    Temporal(AnswerValue),
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Word(word) => format!("'{word}'"),
            TokenKind::Number(raw) => format!("number {raw}"),
            TokenKind::Str(text) => format!("string '{text}'"),
            TokenKind::Temporal(value) => format!("{} literal", value.kind_label()),
            TokenKind::LParen => "'('".into(),
            TokenKind::RParen => "')'".into(),
            TokenKind::Comma => "','".into(),
            TokenKind::Eq => "'='".into(),
            TokenKind::Ne => "'!='".into(),
            TokenKind::Lt => "'<'".into(),
            TokenKind::Le => "'<='".into(),
            TokenKind::Gt => "'>'".into(),
            TokenKind::Ge => "'>='".into(),
            TokenKind::Eof => "end of input".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn is_temporal_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ':' | '.' | '-' | '+')
}

fn is_number(raw: &str) -> bool {
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();
    !whole.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.is_none_or(|f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()))
}

/// Single-pass tokenizer; the returned list always ends with `Eof`.
pub(crate) struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Extends the lexeme `start..end` while `keep` holds.
    fn take_while(&mut self, start: usize, mut end: usize, keep: impl Fn(char) -> bool) -> &'a str {
        while let Some(&(index, c)) = self.chars.peek() {
            if !keep(c) {
                break;
            }
            end = index + c.len_utf8();
            self.chars.next();
        }
        &self.source[start..end]
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((position, c)) = self.chars.next() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                position: self.source.len(),
            });
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            '=' => TokenKind::Eq,
            '!' => {
                if self.chars.next_if(|(_, c)| *c == '=').is_some() {
                    TokenKind::Ne
                } else {
                    return Err(ParseError::new(position, "operator '!='", "'!'"));
                }
            }
            '<' => {
                if self.chars.next_if(|(_, c)| *c == '=').is_some() {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.chars.next_if(|(_, c)| *c == '=').is_some() {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '\'' | '"' => TokenKind::Str(self.string(position, c)?),
            '@' => TokenKind::Temporal(self.temporal(position)?),
            '-' | '+' if self.chars.peek().is_some_and(|(_, next)| next.is_ascii_digit()) => {
                let raw = self.take_while(position, position + 1, is_word_char);
                if !is_number(raw) {
                    return Err(ParseError::new(position, "number", format!("'{raw}'")));
                }
                TokenKind::Number(raw.to_string())
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let raw = self.take_while(position, position + c.len_utf8(), is_word_char);
                if is_number(raw) {
                    TokenKind::Number(raw.to_string())
                } else {
                    TokenKind::Word(raw.to_string())
                }
            }
            other => {
                return Err(ParseError::new(
                    position,
                    "operator, literal or identifier",
                    format!("unknown symbol '{other}'"),
                ));
            }
        };
        Ok(Token { kind, position })
    }

    fn string(&mut self, start: usize, quote: char) -> Result<String, ParseError> {
        let mut text = String::new();
        while let Some((index, c)) = self.chars.next() {
            match c {
                c if c == quote => return Ok(text),
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => text.push('\n'),
                    Some((_, 't')) => text.push('\t'),
                    Some((_, escaped @ ('\'' | '"' | '\\'))) => text.push(escaped),
                    Some((_, other)) => {
                        return Err(ParseError::new(
                            index,
                            "escape sequence",
                            format!("'\\{other}'"),
                        ));
                    }
                    None => break,
                },
                other => text.push(other),
            }
        }
        Err(ParseError::new(start, format!("closing {quote}"), "end of input"))
    }

    fn temporal(&mut self, start: usize) -> Result<AnswerValue, ParseError> {
        let raw = self.take_while(start + 1, start + 1, is_temporal_char);
        let invalid = || ParseError::new(start, "date or time literal", format!("'@{raw}'"));
        if let Some(time) = raw.strip_prefix('T') {
            return NaiveTime::parse_from_str(time, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
                .map(AnswerValue::Time)
                .map_err(|_| invalid());
        }
        if raw.contains('T') {
            return NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
                .map(AnswerValue::DateTime)
                .map_err(|_| invalid());
        }
        raw.parse::<PartialDate>()
            .map(AnswerValue::Date)
            .map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .expect("tokenize")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn words_keep_dots_and_dashes() {
        assert_eq!(
            kinds("answer-of(item.1-a)"),
            vec![
                TokenKind::Word("answer-of".into()),
                TokenKind::LParen,
                TokenKind::Word("item.1-a".into()),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_accept_sign_and_fraction() {
        assert_eq!(
            kinds("-3 +4.25 10 1.1.2"),
            vec![
                TokenKind::Number("-3".into()),
                TokenKind::Number("+4.25".into()),
                TokenKind::Number("10".into()),
                TokenKind::Word("1.1.2".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn operators_use_one_character_lookahead() {
        assert_eq!(
            kinds("<= < >= > != ="),
            vec![
                TokenKind::Le,
                TokenKind::Lt,
                TokenKind::Ge,
                TokenKind::Gt,
                TokenKind::Ne,
                TokenKind::Eq,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn temporal_literals_parse_each_form() {
        let tokens = kinds("@2021 @2021-08-31 @2021-08-31T10:30 @T07:15:00");
        assert!(matches!(tokens[0], TokenKind::Temporal(AnswerValue::Date(PartialDate::Year(2021)))));
        assert!(matches!(tokens[1], TokenKind::Temporal(AnswerValue::Date(PartialDate::Full(_)))));
        assert!(matches!(tokens[2], TokenKind::Temporal(AnswerValue::DateTime(_))));
        assert!(matches!(tokens[3], TokenKind::Temporal(AnswerValue::Time(_))));
    }

    #[test]
    fn strings_support_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\tb""#),
            vec![
                TokenKind::Str("it's".into()),
                TokenKind::Str("a\tb".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_reports_its_start() {
        let err = Lexer::new("answer-of(q1) = 'Yes").tokenize().unwrap_err();
        assert_eq!(err.position, 16);
        assert_eq!(err.found, "end of input");
    }

    #[test]
    fn unknown_operators_are_rejected() {
        let err = Lexer::new("answer-of(q1) ! 'x'").tokenize().unwrap_err();
        assert_eq!(err.position, 14);
        let err = Lexer::new("a & b").tokenize().unwrap_err();
        assert_eq!(err.found, "unknown symbol '&'");
    }
}
