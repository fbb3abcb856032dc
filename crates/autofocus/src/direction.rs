use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Traversal direction through the focus order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Towards larger order keys.
    #[default]
    Forward,
    /// Towards smaller order keys.
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => f.write_str("FORWARD"),
            Self::Backward => f.write_str("BACKWARD"),
        }
    }
}

/// A direction as supplied by a caller, including deprecated spellings.
///
/// `"NEXT"`, `true` and `1` are accepted for [`Direction::Forward`];
/// `"PREV"`, `false` and `0` for [`Direction::Backward`]. Each logs a
/// deprecation warning when normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectionArg {
    /// A canonical direction.
    Direction(Direction),
    /// A direction token by name.
    Name(String),
    /// Legacy boolean form.
    Flag(bool),
    /// Legacy numeric form.
    Number(i64),
}

impl From<Direction> for DirectionArg {
    fn from(d: Direction) -> Self {
        Self::Direction(d)
    }
}

impl From<&str> for DirectionArg {
    fn from(s: &str) -> Self {
        Self::Name(s.to_string())
    }
}

impl From<String> for DirectionArg {
    fn from(s: String) -> Self {
        Self::Name(s)
    }
}

impl From<bool> for DirectionArg {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

impl From<i64> for DirectionArg {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for DirectionArg {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl DirectionArg {
    /// Map to a canonical direction, or fail with [`Error::InvalidDirection`].
    pub fn normalize(&self) -> Result<Direction> {
        match self {
            Self::Direction(d) => Ok(*d),
            Self::Name(name) => match name.as_str() {
                "FORWARD" => Ok(Direction::Forward),
                "BACKWARD" => Ok(Direction::Backward),
                "NEXT" => Ok(deprecated("\"NEXT\"", Direction::Forward)),
                "PREV" => Ok(deprecated("\"PREV\"", Direction::Backward)),
                other => Err(Error::InvalidDirection(other.to_string())),
            },
            Self::Flag(true) => Ok(deprecated("true", Direction::Forward)),
            Self::Flag(false) => Ok(deprecated("false", Direction::Backward)),
            Self::Number(1) => Ok(deprecated("1", Direction::Forward)),
            Self::Number(0) => Ok(deprecated("0", Direction::Backward)),
            Self::Number(n) => Err(Error::InvalidDirection(n.to_string())),
        }
    }
}

/// Report a legacy direction token and pass the canonical value through.
fn deprecated(token: &str, direction: Direction) -> Direction {
    warn!(
        token,
        replacement = %direction,
        "deprecated focus direction {token}, use \"{direction}\" instead"
    );
    direction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_and_legacy_tokens() {
        let cases: Vec<(DirectionArg, Direction)> = vec![
            ("FORWARD".into(), Direction::Forward),
            ("BACKWARD".into(), Direction::Backward),
            ("NEXT".into(), Direction::Forward),
            ("PREV".into(), Direction::Backward),
            (true.into(), Direction::Forward),
            (false.into(), Direction::Backward),
            (1i64.into(), Direction::Forward),
            (0i64.into(), Direction::Backward),
            (Direction::Backward.into(), Direction::Backward),
        ];
        for (arg, want) in cases {
            assert_eq!(arg.normalize().unwrap(), want, "{arg:?}");
        }
    }

    #[test]
    fn unknown_tokens_fail() {
        for arg in [
            DirectionArg::from("forward"),
            DirectionArg::from("UP"),
            DirectionArg::from(2i64),
            DirectionArg::from(-1i32),
        ] {
            assert!(matches!(arg.normalize(), Err(Error::InvalidDirection(_))));
        }
    }

    #[test]
    fn serde_uses_uppercase_names() {
        assert_eq!(
            serde_json::to_string(&Direction::Backward).unwrap(),
            "\"BACKWARD\""
        );
        let d: Direction = serde_json::from_str("\"FORWARD\"").unwrap();
        assert_eq!(d, Direction::Forward);
    }
}
