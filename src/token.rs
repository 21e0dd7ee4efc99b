use std::rc::Rc;

use crate::error::{OrganicError, OrganicResult};
use crate::location::SourceLocation;

/// Reserved enum literals the tokenizer recognizes by name (§3): sequence
/// orderings, random generator types, and rounding modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumLiteral {
    SequenceForwards,
    SequenceBackwards,
    SequencePingPong,
    SequenceRandom,
    RandomStep,
    RandomLinear,
    RoundNearest,
    RoundUp,
    RoundDown,
}

impl EnumLiteral {
    fn from_name(name: &str) -> Option<Self> {
        use EnumLiteral::*;
        Some(match name {
            "sequence-forwards" => SequenceForwards,
            "sequence-backwards" => SequenceBackwards,
            "sequence-ping-pong" => SequencePingPong,
            "sequence-random" => SequenceRandom,
            "random-step" => RandomStep,
            "random-linear" => RandomLinear,
            "round-nearest" => RoundNearest,
            "round-up" => RoundUp,
            "round-down" => RoundDown,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
    Comma,
    Colon,
    Equals,

    EqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,

    Value(f64),
    Str(String),
    Identifier(String),
    Enum(EnumLiteral),

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: SourceLocation,
}

impl Token {
    /// The substring of the source that produced this token; used by the
    /// tokenize-then-locate test (`source[start..end] == token.string()`).
    pub fn text(&self) -> String {
        match &self.kind {
            TokenKind::OpenParen => "(".to_string(),
            TokenKind::CloseParen => ")".to_string(),
            TokenKind::OpenBracket => "[".to_string(),
            TokenKind::CloseBracket => "]".to_string(),
            TokenKind::OpenBrace => "{".to_string(),
            TokenKind::CloseBrace => "}".to_string(),
            TokenKind::Comma => ",".to_string(),
            TokenKind::Colon => ":".to_string(),
            TokenKind::Equals => "=".to_string(),
            TokenKind::EqualEqual => "==".to_string(),
            TokenKind::Less => "<".to_string(),
            TokenKind::LessEqual => "<=".to_string(),
            TokenKind::Greater => ">".to_string(),
            TokenKind::GreaterEqual => ">=".to_string(),
            TokenKind::Plus => "+".to_string(),
            TokenKind::Minus => "-".to_string(),
            TokenKind::Star => "*".to_string(),
            TokenKind::Slash => "/".to_string(),
            TokenKind::Caret => "^".to_string(),
            TokenKind::Value(v) => v.to_string(),
            TokenKind::Str(s) => format!("\"{s}\""),
            TokenKind::Identifier(s) => s.clone(),
            TokenKind::Enum(_) => String::new(),
            TokenKind::Eof => String::new(),
        }
    }
}

/// Base semitone for the first letter of a note literal: `c,d,e,f,g,a,b`.
fn note_base(letter: char) -> Option<i32> {
    Some(match letter {
        'c' => 0,
        'd' => 2,
        'e' => 4,
        'f' => 5,
        'g' => 7,
        'a' => 9,
        'b' => 11,
        _ => return None,
    })
}

/// `freq(n) = 440 * 2^((n-57)/12)`.
pub fn note_frequency(semitone: i32) -> f64 {
    440.0 * 2f64.powf((semitone as f64 - 57.0) / 12.0)
}

/// Recognizes `[a-g][sf]?[0-9]`; returns the precomputed frequency.
fn parse_note(identifier: &str) -> Option<f64> {
    let chars: Vec<char> = identifier.chars().collect();
    match chars.len() {
        2 => {
            let base = note_base(chars[0])?;
            let digit = chars[1].to_digit(10)? as i32;
            Some(note_frequency(base + 12 * digit))
        }
        3 => {
            let base = note_base(chars[0])?;
            let adjust = match chars[1] {
                's' => 1,
                'f' => -1,
                _ => return None,
            };
            let digit = chars[2].to_digit(10)? as i32;
            Some(note_frequency(base + 12 * digit + adjust))
        }
        _ => None,
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Character stream to token stream, including note-name -> frequency
/// conversion and the leading-minus fold onto numeric literals.
pub struct Tokenizer {
    path: Rc<str>,
    chars: Vec<char>,
    current: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
}

impl Tokenizer {
    pub fn new(path: impl Into<Rc<str>>, source: &str) -> Self {
        Self {
            path: path.into(),
            chars: source.chars().collect(),
            current: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> OrganicResult<Vec<Token>> {
        loop {
            self.skip_whitespace_and_comments()?;
            if self.at_end() {
                break;
            }
            let start = self.current;
            let line = self.line;
            let column = self.column;
            let c = self.peek();
            match c {
                '(' => self.push_simple(TokenKind::OpenParen, start, line, column),
                ')' => self.push_simple(TokenKind::CloseParen, start, line, column),
                '[' => self.push_simple(TokenKind::OpenBracket, start, line, column),
                ']' => self.push_simple(TokenKind::CloseBracket, start, line, column),
                '{' => self.push_simple(TokenKind::OpenBrace, start, line, column),
                '}' => self.push_simple(TokenKind::CloseBrace, start, line, column),
                ',' => self.push_simple(TokenKind::Comma, start, line, column),
                ':' => self.push_simple(TokenKind::Colon, start, line, column),
                '+' => self.push_simple(TokenKind::Plus, start, line, column),
                '*' => self.push_simple(TokenKind::Star, start, line, column),
                '/' => self.push_simple(TokenKind::Slash, start, line, column),
                '^' => self.push_simple(TokenKind::Caret, start, line, column),
                '=' => self.tokenize_one_or_two('=', TokenKind::Equals, TokenKind::EqualEqual, start, line, column),
                '<' => self.tokenize_one_or_two('=', TokenKind::Less, TokenKind::LessEqual, start, line, column),
                '>' => self.tokenize_one_or_two('=', TokenKind::Greater, TokenKind::GreaterEqual, start, line, column),
                '-' => self.tokenize_minus(start, line, column)?,
                '"' => self.tokenize_string(start, line, column)?,
                c if c.is_ascii_digit() || c == '.' => self.tokenize_number(start, line, column, false)?,
                c if is_identifier_start(c) => self.tokenize_identifier(start, line, column),
                other => {
                    return Err(OrganicError::parse(
                        self.location(start, start),
                        format!("unexpected character '{other}'"),
                    ))
                }
            }
        }
        let eof_loc = self.location(self.current, self.current);
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            location: eof_loc,
        });
        Ok(self.tokens)
    }

    fn at_end(&self) -> bool {
        self.current >= self.chars.len()
    }

    fn peek(&self) -> char {
        self.chars[self.current]
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.current + offset).copied()
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn location(&self, start: usize, end: usize) -> SourceLocation {
        SourceLocation::new(self.path.clone(), self.line, self.column, start as u32, end as u32)
    }

    fn skip_whitespace_and_comments(&mut self) -> OrganicResult<()> {
        loop {
            while !self.at_end() && self.peek().is_whitespace() {
                self.advance();
            }
            if !self.at_end() && self.peek() == '/' && self.peek_at(1) == Some('/') {
                while !self.at_end() && self.peek() != '\n' {
                    self.advance();
                }
                continue;
            }
            if !self.at_end() && self.peek() == '/' && self.peek_at(1) == Some('*') {
                self.advance();
                self.advance();
                loop {
                    if self.at_end() {
                        return Err(OrganicError::parse(
                            self.location(self.current, self.current),
                            "unterminated block comment",
                        ));
                    }
                    if self.peek() == '*' && self.peek_at(1) == Some('/') {
                        self.advance();
                        self.advance();
                        break;
                    }
                    self.advance();
                }
                continue;
            }
            break;
        }
        Ok(())
    }

    fn push_simple(&mut self, kind: TokenKind, start: usize, line: u32, column: u32) {
        self.advance();
        self.tokens.push(Token {
            kind,
            location: SourceLocation::new(self.path.clone(), line, column, start as u32, self.current as u32),
        });
    }

    fn tokenize_one_or_two(
        &mut self,
        second: char,
        one: TokenKind,
        two: TokenKind,
        start: usize,
        line: u32,
        column: u32,
    ) {
        self.advance();
        let kind = if !self.at_end() && self.peek() == second {
            self.advance();
            two
        } else {
            one
        };
        self.tokens.push(Token {
            kind,
            location: SourceLocation::new(self.path.clone(), line, column, start as u32, self.current as u32),
        });
    }

    /// A `-` immediately before a digit folds into the number literal
    /// unless the preceding token is an identifier or value (so `x-1` stays
    /// three tokens but `-1` and `(-1)` are a single negative literal).
    fn tokenize_minus(&mut self, start: usize, line: u32, column: u32) -> OrganicResult<()> {
        let negative = matches!(self.peek_at(1), Some(c) if c.is_ascii_digit() || c == '.')
            && !matches!(
                self.tokens.last().map(|t| &t.kind),
                Some(TokenKind::Identifier(_)) | Some(TokenKind::Value(_))
            );
        if negative {
            self.advance();
            self.tokenize_number(start, line, column, true)
        } else {
            self.advance();
            self.tokens.push(Token {
                kind: TokenKind::Minus,
                location: SourceLocation::new(self.path.clone(), line, column, start as u32, self.current as u32),
            });
            Ok(())
        }
    }

    fn tokenize_number(&mut self, start: usize, line: u32, column: u32, negative: bool) -> OrganicResult<()> {
        let digits_start = self.current;
        let mut seen_dot = false;
        while !self.at_end() {
            let c = self.peek();
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                self.advance();
            } else {
                break;
            }
        }
        let text: String = self.chars[digits_start..self.current].iter().collect();
        let mut value: f64 = text
            .parse()
            .map_err(|_| OrganicError::parse(self.location(start, self.current), "malformed number literal"))?;
        if negative {
            value = -value;
        }
        self.tokens.push(Token {
            kind: TokenKind::Value(value),
            location: SourceLocation::new(self.path.clone(), line, column, start as u32, self.current as u32),
        });
        Ok(())
    }

    fn tokenize_string(&mut self, start: usize, line: u32, column: u32) -> OrganicResult<()> {
        self.advance();
        let content_start = self.current;
        loop {
            if self.at_end() {
                return Err(OrganicError::parse(
                    self.location(start, self.current),
                    "unterminated string literal",
                ));
            }
            if self.peek() == '"' {
                break;
            }
            self.advance();
        }
        let content: String = self.chars[content_start..self.current].iter().collect();
        self.advance();
        self.tokens.push(Token {
            kind: TokenKind::Str(content),
            location: SourceLocation::new(self.path.clone(), line, column, start as u32, self.current as u32),
        });
        Ok(())
    }

    fn tokenize_identifier(&mut self, start: usize, line: u32, column: u32) {
        while !self.at_end() && is_identifier_continue(self.peek()) {
            self.advance();
        }
        let text: String = self.chars[start..self.current].iter().collect();
        let kind = if let Some(literal) = EnumLiteral::from_name(&text) {
            TokenKind::Enum(literal)
        } else if text == "pi" {
            TokenKind::Value(std::f64::consts::PI)
        } else if text == "e" {
            TokenKind::Value(std::f64::consts::E)
        } else if let Some(freq) = parse_note(&text) {
            TokenKind::Value(freq)
        } else {
            TokenKind::Identifier(text)
        };
        self.tokens.push(Token {
            kind,
            location: SourceLocation::new(self.path.clone(), line, column, start as u32, self.current as u32),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(src: &str) -> Vec<Token> {
        Tokenizer::new("test.organic", src).tokenize().unwrap()
    }

    #[test]
    fn empty_file_yields_only_eof() {
        let tokens = tokenize("");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn disambiguates_equals_and_comparisons() {
        let tokens = tokenize("= == < <= > >=");
        let kinds: Vec<_> = tokens.iter().map(|t| &t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &TokenKind::Equals,
                &TokenKind::EqualEqual,
                &TokenKind::Less,
                &TokenKind::LessEqual,
                &TokenKind::Greater,
                &TokenKind::GreaterEqual,
                &TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn leading_minus_folds_into_number_but_not_after_identifier() {
        let tokens = tokenize("-1");
        assert_eq!(tokens[0].kind, TokenKind::Value(-1.0));

        let tokens = tokenize("x-1");
        assert_eq!(tokens[0].kind, TokenKind::Identifier("x".into()));
        assert_eq!(tokens[1].kind, TokenKind::Minus);
        assert_eq!(tokens[2].kind, TokenKind::Value(1.0));
    }

    #[test]
    fn note_roundtrip_within_tolerance() {
        for n in -60..60 {
            let freq = note_frequency(n);
            let expected = 440.0 * 2f64.powf((n as f64 - 57.0) / 12.0);
            assert!((freq - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn note_literals_resolve_to_frequencies() {
        let tokens = tokenize("a4");
        match tokens[0].kind {
            TokenKind::Value(v) => assert!((v - note_frequency(9 + 48)).abs() < 1e-9),
            _ => panic!("expected a note value"),
        }
    }

    #[test]
    fn sharp_and_flat_notes_adjust_by_one_semitone() {
        let sharp = tokenize("cs4");
        let flat = tokenize("df4");
        assert_eq!(sharp[0].kind, flat[0].kind);
    }

    #[test]
    fn block_comments_do_not_nest() {
        let tokens = tokenize("/* outer /* inner */ x */");
        // the first `*/` ends the comment, leaving `x */` to tokenize.
        assert_eq!(tokens[0].kind, TokenKind::Identifier("x".into()));
    }

    #[test]
    fn tokens_locate_back_into_source() {
        let src = "sine(volume: 1)";
        let tokens = tokenize(src);
        for token in &tokens {
            if matches!(token.kind, TokenKind::Eof) {
                continue;
            }
            let slice: String = src
                .chars()
                .skip(token.location.start as usize)
                .take((token.location.end - token.location.start) as usize)
                .collect();
            if let TokenKind::Str(_) = token.kind {
                assert_eq!(slice, format!("\"{}\"", token.text().trim_matches('"')));
            } else {
                assert_eq!(slice, token.text());
            }
        }
    }
}
