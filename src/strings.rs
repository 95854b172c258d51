// String literals only know the escapes \n, \t, \" and \\. Anything else after
// a backslash is a read error rather than being passed through.

use bimap::BiMap;
use std::fmt;
use std::str::Chars;

lazy_static! {
    static ref ESCAPES: BiMap<char, char> = {
        let mut m = BiMap::new();
        m.insert('\\', '\\');
        m.insert('"', '"');
        m.insert('n', '\n');
        m.insert('t', '\t');
        m
    };
}

struct StringBuilder<'a> {
    chars: Chars<'a>,
}

impl<'a> StringBuilder<'a> {
    fn new(src: &'a str) -> Self {
        Self { chars: src.chars() }
    }
}

#[derive(Debug)]
pub enum BuildError {
    UnknownEscape(char),
    UnexpectedSingleBackslash,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::UnknownEscape(c) => write!(f, "unknown escape \\{}", c),
            BuildError::UnexpectedSingleBackslash => write!(f, "trailing backslash"),
        }
    }
}

impl Iterator for StringBuilder<'_> {
    type Item = std::result::Result<char, BuildError>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = match self.chars.next()? {
            '\\' => match self.chars.next() {
                None => Err(BuildError::UnexpectedSingleBackslash),
                Some(c) => ESCAPES
                    .get_by_left(&c)
                    .copied()
                    .ok_or(BuildError::UnknownEscape(c)),
            },
            c => Ok(c),
        };
        Some(result)
    }
}

/// Decode the body of a string literal (without its quotes).
pub(crate) fn build_string(src: &str) -> Result<String, BuildError> {
    StringBuilder::new(src).collect()
}

/// The re-readable form of `src`, quotes included.
pub(crate) fn string_repr(src: &str) -> String {
    let mut output = String::with_capacity(src.len() + 2);
    output.push('"');
    for c in src.chars() {
        match ESCAPES.get_by_right(&c) {
            Some(&escaped) => {
                output.push('\\');
                output.push(escaped);
            }
            None => output.push(c),
        }
    }
    output.push('"');
    output
}

const CHAR_NAMES: [(&str, char); 5] = [
    ("space", ' '),
    ("newline", '\n'),
    ("tab", '\t'),
    ("nul", '\0'),
    ("return", '\r'),
];

/// `#\a`, `#\space` and friends; `name` is the text after `#\`.
pub(crate) fn char_from_name(name: &str) -> Option<char> {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => CHAR_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| *c),
    }
}

pub(crate) fn char_repr(c: char) -> String {
    match CHAR_NAMES.iter().find(|(_, named)| *named == c) {
        Some((name, _)) => format!("#\\{}", name),
        None => format!("#\\{}", c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_survive_a_round_trip() {
        let text = "say \"hi\"\n\tback\\slash";
        let repr = string_repr(text);
        let body = &repr[1..repr.len() - 1];
        assert_eq!(build_string(body).unwrap(), text);
    }

    #[test]
    fn unknown_escape_is_an_error() {
        assert!(matches!(
            build_string("a\\qb"),
            Err(BuildError::UnknownEscape('q'))
        ));
        assert!(matches!(
            build_string("a\\"),
            Err(BuildError::UnexpectedSingleBackslash)
        ));
    }

    #[test]
    fn named_characters() {
        assert_eq!(char_from_name("space"), Some(' '));
        assert_eq!(char_from_name("x"), Some('x'));
        assert_eq!(char_from_name("bogus"), None);
        assert_eq!(char_repr('\n'), "#\\newline");
        assert_eq!(char_repr('q'), "#\\q");
    }
}
