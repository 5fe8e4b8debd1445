//! Tokenizer for the netlist language.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::{Result, WdfError};

/// A token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-indexed
    pub line: usize,
    /// 1-indexed
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Component name, node name, keyword or parameter key
    Identifier,
    /// Number with optional SI suffix
    Number,
    /// `.` followed by a name
    Directive,
    /// Raw remainder of a `.title` line
    Text,
    OpenParen,
    CloseParen,
    Equals,
    Newline,
    Eof,
}

/// SI suffix characters accepted after a number.
const SUFFIXES: [char; 9] = ['p', 'n', 'u', 'µ', 'm', 'k', 'K', 'M', 'G'];

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    /// Next token is the raw rest of the line
    raw_pending: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
            raw_pending: false,
        }
    }

    /// Produce the next token. Comments and blank space are skipped.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_blank();

        let line = self.line;
        let column = self.column;
        let token = |kind, text: String| Token {
            kind,
            text,
            line,
            column,
        };

        let Some(&ch) = self.chars.peek() else {
            return Ok(token(TokenKind::Eof, String::new()));
        };

        if std::mem::take(&mut self.raw_pending) && ch != '\n' {
            let mut text = String::new();
            while let Some(c) = self.chars.peek().copied().filter(|&c| c != '\n') {
                text.push(c);
                self.advance();
            }
            return Ok(token(TokenKind::Text, text.trim_end().to_string()));
        }

        let single = match ch {
            '\n' => Some(TokenKind::Newline),
            '(' => Some(TokenKind::OpenParen),
            ')' => Some(TokenKind::CloseParen),
            '=' => Some(TokenKind::Equals),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance();
            return Ok(token(kind, ch.to_string()));
        }

        if ch == '.' {
            self.advance();
            let name = self.read_word();
            if name.is_empty() {
                return Err(WdfError::lexer(line, column, "'.' must start a directive"));
            }
            self.raw_pending = name.eq_ignore_ascii_case("title");
            return Ok(token(TokenKind::Directive, format!(".{name}")));
        }

        if ch.is_ascii_digit() || ch == '-' || ch == '+' {
            let text = self.read_number();
            if parse_value(&text).is_none() {
                return Err(WdfError::lexer(line, column, format!("malformed number '{text}'")));
            }
            return Ok(token(TokenKind::Number, text));
        }

        if ch.is_alphabetic() || ch == '_' {
            return Ok(token(TokenKind::Identifier, self.read_word()));
        }

        Err(WdfError::lexer(line, column, format!("unexpected character '{ch}'")))
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_blank(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            match ch {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '#' | ';' => {
                    while self.chars.peek().is_some_and(|&c| c != '\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_word(&mut self) -> String {
        let mut text = String::new();
        while let Some(&ch) = self.chars.peek() {
            if !(ch.is_alphanumeric() || ch == '_') {
                break;
            }
            text.push(ch);
            self.advance();
        }
        text
    }

    fn read_digits(&mut self, text: &mut String) {
        while let Some(&ch) = self.chars.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            text.push(ch);
            self.advance();
        }
    }

    fn read_number(&mut self) -> String {
        let mut text = String::new();
        if let Some(&sign @ ('-' | '+')) = self.chars.peek() {
            text.push(sign);
            self.advance();
        }
        self.read_digits(&mut text);

        if self.chars.peek() == Some(&'.') {
            text.push('.');
            self.advance();
            self.read_digits(&mut text);
        }

        if let Some(&e @ ('e' | 'E')) = self.chars.peek() {
            text.push(e);
            self.advance();
            if let Some(&sign @ ('-' | '+')) = self.chars.peek() {
                text.push(sign);
                self.advance();
            }
            self.read_digits(&mut text);
        }

        if let Some(&suffix) = self.chars.peek() {
            if SUFFIXES.contains(&suffix) {
                text.push(suffix);
                self.advance();
            }
        }
        text
    }
}

/// Parse a number with an optional SI suffix (`10k`, `100n`, `4.7u`).
pub fn parse_value(text: &str) -> Option<f64> {
    let text = text.trim();
    let last = text.chars().last()?;
    let multiplier = match last {
        'p' => 1e-12,
        'n' => 1e-9,
        'u' | 'µ' => 1e-6,
        'm' => 1e-3,
        'k' | 'K' => 1e3,
        'M' => 1e6,
        'G' => 1e9,
        _ => return text.parse::<f64>().ok(),
    };
    let digits = &text[..text.len() - last.len_utf8()];
    digits.parse::<f64>().ok().map(|v| v * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().unwrap();
            out.push(tok.kind);
            if tok.kind == TokenKind::Eof {
                return out;
            }
        }
    }

    #[test]
    fn test_parse_value() {
        assert_relative_eq!(parse_value("10k").unwrap(), 10_000.0);
        assert_relative_eq!(parse_value("100n").unwrap(), 100e-9);
        assert_relative_eq!(parse_value("4.7u").unwrap(), 4.7e-6);
        assert_relative_eq!(parse_value("1M").unwrap(), 1e6);
        assert_relative_eq!(parse_value("2.2").unwrap(), 2.2);
        assert_relative_eq!(parse_value("1e-9").unwrap(), 1e-9);
        assert_relative_eq!(parse_value("2.52n").unwrap(), 2.52e-9);
        assert!(parse_value("k").is_none());
        assert!(parse_value("").is_none());
    }

    #[test]
    fn test_component_line() {
        use TokenKind::*;
        assert_eq!(
            kinds("C1 out 0 100n output ; load\n"),
            vec![Identifier, Identifier, Number, Number, Identifier, Newline, Eof]
        );
    }

    #[test]
    fn test_model_line() {
        use TokenKind::*;
        assert_eq!(
            kinds(".model D1 D (is=1e-14)"),
            vec![Directive, Identifier, Identifier, OpenParen, Identifier, Equals, Number, CloseParen, Eof]
        );
    }

    #[test]
    fn test_title_is_raw() {
        let mut lexer = Lexer::new(".title RC low-pass (1st order)\nR1");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Directive);
        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Text);
        assert_eq!(tok.text, "RC low-pass (1st order)");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Newline);
    }

    #[test]
    fn test_positions() {
        let mut lexer = Lexer::new("# heading\n  R1 a");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Newline);
        let tok = lexer.next_token().unwrap();
        assert_eq!((tok.text.as_str(), tok.line, tok.column), ("R1", 2, 3));
    }

    #[test]
    fn test_bad_character() {
        let mut lexer = Lexer::new("R1 a@b");
        lexer.next_token().unwrap();
        lexer.next_token().unwrap();
        match lexer.next_token() {
            Err(WdfError::LexerError { line: 1, column: 5, .. }) => {}
            other => panic!("expected lexer error, got {other:?}"),
        }
    }
}
