use crate::heap::Heap;
use crate::number::Number;
use crate::strings::{build_string, char_from_name, BuildError};
use crate::tokens::{next_token, tokenize, SpecialChar, Token, TokenizerError};
use crate::types::Value;

use std::fmt;

#[derive(Debug)]
pub enum Error {
    Tokenizer(TokenizerError),
    UnexpectedEof,
    UnexpectedClose,
    BadDot,
    BadString(BuildError),
    BadCharacter(String),
    UnreadableInput(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Tokenizer(e) => write!(f, "{}", e),
            Error::UnexpectedEof => write!(f, "unexpected end of input"),
            Error::UnexpectedClose => write!(f, "unexpected ')'"),
            Error::BadDot => write!(f, "misplaced '.'"),
            Error::BadString(e) => write!(f, "bad string literal: {}", e),
            Error::BadCharacter(name) => write!(f, "unknown character #\\{}", name),
            Error::UnreadableInput(at) => write!(f, "cannot read input at byte {}", at),
        }
    }
}

impl From<TokenizerError> for Error {
    fn from(e: TokenizerError) -> Self {
        Error::Tokenizer(e)
    }
}

struct Parser<'a, 'h> {
    heap: &'h mut Heap,
    text: &'a str,
    position: usize,
}

impl<'a, 'h> Parser<'a, 'h> {
    /// Next token that isn't a comment.
    fn next(&mut self) -> Result<Option<Token<'a>>, Error> {
        loop {
            let text = self.text;
            let remaining = &text[self.position..];
            match next_token(remaining)? {
                None => {
                    self.position = self.text.len();
                    return Ok(None);
                }
                Some((_, 0)) => return Err(Error::UnreadableInput(self.position)),
                Some((Token::Comment(_), used)) => self.position += used,
                Some((token, used)) => {
                    self.position += used;
                    return Ok(Some(token));
                }
            }
        }
    }

    fn required(&mut self) -> Result<Value, Error> {
        match self.next()? {
            Some(token) => self.datum(token),
            None => Err(Error::UnexpectedEof),
        }
    }

    fn datum(&mut self, token: Token<'a>) -> Result<Value, Error> {
        use SpecialChar::*;
        match token {
            Token::SpecialChar(OpenRoundBracket) => self.list(),
            Token::SpecialChar(OpenVector) => self.vector(),
            Token::SpecialChar(CloseRoundBracket) => Err(Error::UnexpectedClose),
            Token::SpecialChar(Dot) => Err(Error::BadDot),
            Token::SpecialChar(Quote) => self.abbreviation("quote"),
            Token::SpecialChar(Backtick) => self.abbreviation("quasiquote"),
            Token::SpecialChar(Comma) => self.abbreviation("unquote"),
            Token::SpecialChar(CommaAt) => self.abbreviation("unquote-splicing"),
            Token::StringLiteral(body) => {
                let s = build_string(body).map_err(Error::BadString)?;
                Ok(self.heap.string_from(s))
            }
            Token::CharLiteral(name) => char_from_name(name)
                .map(Value::Char)
                .ok_or_else(|| Error::BadCharacter(name.to_string())),
            Token::Comment(_) => self.required(),
            Token::PlainChars(text) => Ok(self.atom(text)),
        }
    }

    fn abbreviation(&mut self, keyword: &str) -> Result<Value, Error> {
        let quoted = self.required()?;
        let keyword = self.heap.intern(keyword);
        Ok(self.heap.list(&[keyword, quoted]))
    }

    fn list(&mut self) -> Result<Value, Error> {
        let mut items = Vec::new();
        loop {
            match self.next()? {
                None => return Err(Error::UnexpectedEof),
                Some(Token::SpecialChar(SpecialChar::CloseRoundBracket)) => {
                    return Ok(self.heap.list(&items))
                }
                Some(Token::SpecialChar(SpecialChar::Dot)) => {
                    if items.is_empty() {
                        return Err(Error::BadDot);
                    }
                    let tail = self.required()?;
                    return match self.next()? {
                        Some(Token::SpecialChar(SpecialChar::CloseRoundBracket)) => {
                            Ok(self.heap.list_with_tail(&items, tail))
                        }
                        None => Err(Error::UnexpectedEof),
                        Some(_) => Err(Error::BadDot),
                    };
                }
                Some(token) => items.push(self.datum(token)?),
            }
        }
    }

    fn vector(&mut self) -> Result<Value, Error> {
        let mut items = Vec::new();
        loop {
            match self.next()? {
                None => return Err(Error::UnexpectedEof),
                Some(Token::SpecialChar(SpecialChar::CloseRoundBracket)) => {
                    return Ok(self.heap.vector_from(items))
                }
                Some(Token::SpecialChar(SpecialChar::Dot)) => return Err(Error::BadDot),
                Some(token) => items.push(self.datum(token)?),
            }
        }
    }

    fn atom(&mut self, text: &str) -> Value {
        match text {
            "#t" | "#true" => Value::Bool(true),
            "#f" | "#false" => Value::Bool(false),
            _ => match Number::parse(text) {
                Some(n) => Value::Number(n),
                None => self.heap.intern(text),
            },
        }
    }
}

/// Read the datum starting at byte `position` of `text`, leaving `position`
/// just past it. `Ok(None)` when nothing but whitespace and comments remain.
pub fn read_datum(heap: &mut Heap, text: &str, position: &mut usize) -> Result<Option<Value>, Error> {
    let mut parser = Parser {
        heap,
        text,
        position: *position,
    };
    let result = match parser.next()? {
        None => Ok(None),
        Some(token) => parser.datum(token).map(Some),
    };
    *position = parser.position;
    result
}

/// Read exactly one datum from `text`, ignoring anything after it.
pub fn read_str(heap: &mut Heap, text: &str) -> Result<Value, Error> {
    let mut position = 0;
    read_datum(heap, text, &mut position)?.ok_or(Error::UnexpectedEof)
}

/// Whether `text` holds only whole data: no open brackets or strings. The
/// REPL keeps reading lines until this holds.
pub fn is_complete(text: &str) -> bool {
    let tokens = match tokenize(text) {
        Ok(tokens) => tokens,
        Err(TokenizerError::UnbalancedString) => return false,
        Err(_) => return true,
    };
    let depth = tokens.iter().fold(0i64, |depth, token| match token {
        Token::SpecialChar(SpecialChar::OpenRoundBracket)
        | Token::SpecialChar(SpecialChar::OpenVector) => depth + 1,
        Token::SpecialChar(SpecialChar::CloseRoundBracket) => depth - 1,
        _ => depth,
    });
    depth <= 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::{pr_str, PrintMode};

    fn round_trip(text: &str) -> String {
        let mut heap = Heap::new();
        let value = read_str(&mut heap, text).unwrap();
        pr_str(&mut heap, value, PrintMode::ReadableRepresentation)
    }

    #[test]
    fn reads_nested_structure() {
        assert_eq!(round_trip("(a (b . c) #(1 2.5) \"s\\n\")"), "(a (b . c) #(1 2.5) \"s\\n\")");
        assert_eq!(round_trip("'x"), "(quote x)");
        assert_eq!(round_trip("`(a ,b ,@c)"), "(quasiquote (a (unquote b) (unquote-splicing c)))");
        assert_eq!(round_trip("(#t #false #\\space #\\a)"), "(#t #f #\\space #\\a)");
    }

    #[test]
    fn reads_one_datum_at_a_time() {
        let mut heap = Heap::new();
        let text = "1 ; comment\n (two) three";
        let mut position = 0;
        let mut seen = Vec::new();
        while let Some(v) = read_datum(&mut heap, text, &mut position).unwrap() {
            seen.push(pr_str(&mut heap, v, PrintMode::ReadableRepresentation));
        }
        assert_eq!(seen, vec!["1", "(two)", "three"]);
        assert_eq!(position, text.len());
    }

    #[test]
    fn malformed_input() {
        let mut heap = Heap::new();
        assert!(matches!(read_str(&mut heap, "(1 2"), Err(Error::UnexpectedEof)));
        assert!(matches!(read_str(&mut heap, ")"), Err(Error::UnexpectedClose)));
        assert!(matches!(read_str(&mut heap, "(. 1)"), Err(Error::BadDot)));
        assert!(matches!(read_str(&mut heap, "(1 . 2 3)"), Err(Error::BadDot)));
        assert!(matches!(read_str(&mut heap, "#\\bogus"), Err(Error::BadCharacter(_))));
    }

    #[test]
    fn completeness() {
        assert!(is_complete("(define x 1)"));
        assert!(!is_complete("(define (f x)\n  (+ x"));
        assert!(!is_complete("(display \"abc"));
        assert!(is_complete("; just a comment"));
    }
}
