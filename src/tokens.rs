use regex::Regex;
use std::fmt;

#[derive(Debug, Eq, PartialEq)]
pub enum SpecialChar {
    OpenRoundBracket,
    CloseRoundBracket,
    OpenVector,
    Quote,
    Backtick,
    Comma,
    CommaAt,
    Dot,
}

#[derive(Debug, PartialEq)]
pub enum Token<'a> {
    SpecialChar(SpecialChar),
    StringLiteral(&'a str),
    CharLiteral(&'a str),
    Comment(&'a str),
    PlainChars(&'a str),
}

#[derive(Debug)]
pub enum TokenizerError {
    NoFirstCharacter,
    UnbalancedString,
    NoCapture(String),
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tokenizer failed: {}",
            match self {
                TokenizerError::NoFirstCharacter => "no characters to parse token from",
                TokenizerError::UnbalancedString => "unbalanced string literal",
                TokenizerError::NoCapture(_) => "token regex did not capture a token",
            }
        )
    }
}

fn create_token(captured: &str) -> Result<Token, TokenizerError> {
    use SpecialChar::*;
    let bytes = captured.as_bytes();
    let first_char = bytes.first().ok_or(TokenizerError::NoFirstCharacter)?;
    match first_char {
        b',' => match bytes.get(1) {
            Some(b'@') => Ok(Token::SpecialChar(CommaAt)),
            _ => Ok(Token::SpecialChar(Comma)),
        },
        b'#' if bytes.get(1) == Some(&b'(') => Ok(Token::SpecialChar(OpenVector)),
        b'#' if bytes.get(1) == Some(&b'\\') => Ok(Token::CharLiteral(&captured[2..])),
        b'(' => Ok(Token::SpecialChar(OpenRoundBracket)),
        b')' => Ok(Token::SpecialChar(CloseRoundBracket)),
        b'\'' => Ok(Token::SpecialChar(Quote)),
        b'`' => Ok(Token::SpecialChar(Backtick)),
        b'.' if bytes.len() == 1 => Ok(Token::SpecialChar(Dot)),
        b'"' => tokenize_string_literal(captured),
        // ; is ASCII so it is safe to slice on bytes here.
        b';' => Ok(Token::Comment(&captured[1..])),
        _ => Ok(Token::PlainChars(captured)),
    }
}

fn tokenize_string_literal(captured: &str) -> Result<Token, TokenizerError> {
    let bytes = captured.as_bytes();
    if bytes.len() == 1 || bytes[bytes.len() - 1] != b'"' {
        return Err(TokenizerError::UnbalancedString);
    }

    let trailing_backslashes = bytes
        .iter()
        .rev()
        .skip(1)
        .take_while(|&&byte| byte == b'\\')
        .count();
    if trailing_backslashes % 2 == 1 {
        return Err(TokenizerError::UnbalancedString);
    }

    Ok(Token::StringLiteral(&captured[1..captured.len() - 1]))
}

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(
        r#"(?x)                          # ignore whitespace in this pattern & allow comments
            \s*                          # whitespace, ignored
            (                            # token capture group
                ,@                       # unquote-splicing
                |\#\\.[^\s()'"`,;]*      # character literal
                |\#\(                    # vector opener
                |[()'`,]                 # single special characters
                |"(?:                    # string literal. its contents, not captured, include:
                    \\.                  #    escapes
                    |[^\\"]              #    anything which isn't a backslash or a quote
                  )*
                  "?                     #    possibly missing a closing quote
                |;.*                     # comments
                |[^\s('"`,;)]*           # zero or more plain characters
            )
            \s*                          # whitespace, ignored
        "#
    )
    .expect("token pattern compiles");
}

/// The next token in `input` and how many bytes it (and the whitespace around
/// it) used up. `None` once only whitespace remains.
pub fn next_token(input: &str) -> Result<Option<(Token, usize)>, TokenizerError> {
    if input.trim_start().is_empty() {
        return Ok(None);
    }
    let caps = TOKEN_RE
        .captures(input)
        .ok_or_else(|| TokenizerError::NoCapture(String::from(input)))?;
    let token_text = caps
        .get(1)
        .ok_or_else(|| TokenizerError::NoCapture(String::from(input)))?;
    let consumed = caps.get(0).map(|m| m.end()).unwrap_or(0);
    let token = create_token(token_text.as_str())?;
    Ok(Some((token, consumed)))
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, TokenizerError> {
    let mut input = input;
    let mut tokens = Vec::new();
    while let Some((token, consumed)) = next_token(input)? {
        tokens.push(token);
        input = &input[consumed..];
    }
    Ok(tokens)
}
