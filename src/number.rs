//! A deliberately small numeric tower: exact integers that overflow into
//! inexact reals. Enough for the evaluator core and its tests.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Real(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Real(r) => r,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(i) => i == 0,
            Number::Real(r) => r == 0.0,
        }
    }

    pub fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(x), Number::Int(y)) => x
                .checked_add(y)
                .map(Number::Int)
                .unwrap_or_else(|| Number::Real(x as f64 + y as f64)),
            (x, y) => Number::Real(x.as_f64() + y.as_f64()),
        }
    }

    pub fn sub(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(x), Number::Int(y)) => x
                .checked_sub(y)
                .map(Number::Int)
                .unwrap_or_else(|| Number::Real(x as f64 - y as f64)),
            (x, y) => Number::Real(x.as_f64() - y.as_f64()),
        }
    }

    pub fn mul(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(x), Number::Int(y)) => x
                .checked_mul(y)
                .map(Number::Int)
                .unwrap_or_else(|| Number::Real(x as f64 * y as f64)),
            (x, y) => Number::Real(x.as_f64() * y.as_f64()),
        }
    }

    /// Exact division stays exact only when it divides evenly.
    /// Returns `None` on exact division by zero.
    pub fn div(self, other: Number) -> Option<Number> {
        match (self, other) {
            (_, Number::Int(0)) => None,
            (Number::Int(x), Number::Int(y)) if x.checked_rem(y) == Some(0) => Some(Number::Int(x / y)),
            (x, y) => Some(Number::Real(x.as_f64() / y.as_f64())),
        }
    }

    /// Numeric comparison. NaN is not comparable with anything.
    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
            (x, y) => x.as_f64().partial_cmp(&y.as_f64()),
        }
    }

    /// Bitwise sameness, used by `eq?`.
    pub fn identical(self, other: Number) -> bool {
        match (self, other) {
            (Number::Int(x), Number::Int(y)) => x == y,
            (Number::Real(x), Number::Real(y)) => x.to_bits() == y.to_bits(),
            _ => false,
        }
    }

    pub fn parse(text: &str) -> Option<Number> {
        let mut chars = text.chars();
        let first = chars.next()?;
        let second = chars.next();
        let numeric_start = match first {
            '0'..='9' => true,
            '+' | '-' => matches!(second, Some('0'..='9') | Some('.')),
            '.' => matches!(second, Some('0'..='9')),
            _ => false,
        };
        if !numeric_start {
            return None;
        }
        if let Ok(i) = text.parse::<i64>() {
            return Some(Number::Int(i));
        }
        text.parse::<f64>().ok().map(Number::Real)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Real(r) if r.is_nan() => write!(f, "+nan.0"),
            Number::Real(r) if r.is_infinite() => {
                write!(f, "{}", if *r > 0.0 { "+inf.0" } else { "-inf.0" })
            }
            Number::Real(r) if r.fract() == 0.0 && r.abs() < 1e16 => write!(f, "{:.1}", r),
            Number::Real(r) => write!(f, "{}", r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_arithmetic_overflows_to_inexact() {
        assert!(matches!(
            Number::Int(i64::MAX).add(Number::Int(1)),
            Number::Real(_)
        ));
        assert!(matches!(Number::Int(2).mul(Number::Int(3)), Number::Int(6)));
    }

    #[test]
    fn division() {
        assert!(matches!(Number::Int(6).div(Number::Int(3)), Some(Number::Int(2))));
        assert!(matches!(Number::Int(1).div(Number::Int(2)), Some(Number::Real(_))));
        assert!(Number::Int(1).div(Number::Int(0)).is_none());
    }

    #[test]
    fn parse_and_display() {
        assert!(matches!(Number::parse("-12"), Some(Number::Int(-12))));
        assert_eq!(Number::parse("2.5").map(|n| n.to_string()), Some("2.5".into()));
        assert!(Number::parse("-").is_none());
        assert!(Number::parse("abc").is_none());
        assert_eq!(Number::Real(3.0).to_string(), "3.0");
    }

    #[test]
    fn nan_is_not_comparable() {
        assert_eq!(Number::Real(f64::NAN).compare(Number::Int(1)), None);
        assert_eq!(
            Number::Int(1).compare(Number::Real(1.5)),
            Some(Ordering::Less)
        );
    }
}
