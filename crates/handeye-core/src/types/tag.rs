use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one capture, attached at load time and carried through every stage.
///
/// Loaders that work from files fill in `key` with the lexical-numeric key of
/// the file name; positional sources (e.g. one pose file with many blocks)
/// leave it empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewTag {
    /// Position in capture order.
    pub index: usize,
    /// Numeric key extracted from the source file name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<u64>,
    /// Human-readable source (file name or `file#block`).
    pub source: String,
}

impl ViewTag {
    pub fn new(index: usize, key: Option<u64>, source: impl Into<String>) -> Self {
        Self {
            index,
            key,
            source: source.into(),
        }
    }

    /// Tag for a positional source without file identity.
    pub fn positional(index: usize, source: impl Into<String>) -> Self {
        Self::new(index, None, source)
    }

    /// Whether two tags can refer to the same capture.
    ///
    /// Positions must agree; numeric keys are compared only when both tags
    /// carry one.
    pub fn matches(&self, other: &ViewTag) -> bool {
        if self.index != other.index {
            return false;
        }
        match (self.key, other.key) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl fmt::Display for ViewTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.index, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_compared_only_when_present() {
        let a = ViewTag::new(3, Some(12), "12.png");
        assert!(a.matches(&ViewTag::new(3, Some(12), "12.csv")));
        assert!(!a.matches(&ViewTag::new(3, Some(13), "13.csv")));
        assert!(a.matches(&ViewTag::positional(3, "robot_cali.txt#3")));
        assert!(!a.matches(&ViewTag::positional(2, "robot_cali.txt#2")));
    }
}
