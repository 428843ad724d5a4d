/// Static pre-execution screening
///
/// Purely textual: the script is case-folded and checked for each pattern in
/// list order. The first hit wins. Matches inside comments or string literals
/// still count, and aliased or indirect access is not detected; the external
/// sandbox remains the real boundary.
use crate::screening::patterns::PatternSet;
use serde::{Deserialize, Serialize};

/// Screening result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum ScreeningVerdict {
    Pass,
    Reject { pattern: String },
}

impl ScreeningVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, ScreeningVerdict::Pass)
    }
}

/// Screener parameterized by an immutable pattern set
#[derive(Debug, Clone, Default)]
pub struct Screener {
    patterns: PatternSet,
}

impl Screener {
    pub fn new(patterns: PatternSet) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Screen a script, citing the first matching pattern in list order
    pub fn screen(&self, script: &str) -> ScreeningVerdict {
        screen(&self.patterns, script)
    }
}

/// Pure screening function over an explicit pattern set
pub fn screen(patterns: &PatternSet, script: &str) -> ScreeningVerdict {
    let folded = script.to_lowercase();
    patterns
        .iter()
        .find(|pattern| folded.contains(pattern))
        .map(|pattern| ScreeningVerdict::Reject {
            pattern: pattern.to_string(),
        })
        .unwrap_or(ScreeningVerdict::Pass)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benign_script_passes() {
        let screener = Screener::default();
        let verdict = screener.screen("def main():\n    return {\"a\": 1}");
        assert!(verdict.is_pass());
    }

    #[test]
    fn test_open_call_rejected() {
        let screener = Screener::default();
        let verdict = screener.screen("def main():\n    return open('/etc/passwd')");
        assert_eq!(
            verdict,
            ScreeningVerdict::Reject {
                pattern: "open(".to_string()
            }
        );
    }

    #[test]
    fn test_case_insensitive() {
        let screener = Screener::default();
        let verdict = screener.screen("IMPORT SOCKET\ndef main():\n    return 1");
        assert_eq!(
            verdict,
            ScreeningVerdict::Reject {
                pattern: "import socket".to_string()
            }
        );
    }

    #[test]
    fn test_first_pattern_in_list_order_is_cited() {
        // "eval(" appears first in the text, but "import sys" precedes it in the list.
        let screener = Screener::default();
        let verdict = screener.screen("x = eval('1')\nimport sys\n");
        assert_eq!(
            verdict,
            ScreeningVerdict::Reject {
                pattern: "import sys".to_string()
            }
        );
    }

    #[test]
    fn test_comment_mentions_are_rejected() {
        let screener = Screener::default();
        let verdict = screener.screen("# never call exec(\ndef main():\n    return 1");
        assert!(!verdict.is_pass());
    }

    #[test]
    fn test_substring_false_positive_preserved() {
        // "profile(" contains "file(".
        let screener = Screener::default();
        let verdict = screener.screen("def profile():\n    return 1\ndef main():\n    return profile()");
        assert_eq!(
            verdict,
            ScreeningVerdict::Reject {
                pattern: "file(".to_string()
            }
        );
    }

    #[test]
    fn test_custom_pattern_set() {
        let screener = Screener::new(PatternSet::new(["import os"]));
        assert!(screener.screen("open('x')").is_pass());
        assert!(!screener.screen("import os").is_pass());
    }

    #[test]
    fn test_empty_pattern_set_passes_everything() {
        let screener = Screener::new(PatternSet::new(std::iter::empty()));
        assert!(screener.screen("import subprocess").is_pass());
    }
}
