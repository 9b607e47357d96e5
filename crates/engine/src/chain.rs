//! Ordered short-circuit decision chain shared by every gate
//!
//! A gate lists its block conditions in priority order. The first condition
//! that holds blocks the setup and contributes the only reason code; later
//! conditions are never reported.

pub const SCORE_BELOW_THRESHOLD: &str = "score_below_threshold";

/// One named block condition
#[derive(Debug, Clone, Copy)]
pub struct Check {
    pub code: &'static str,
    pub blocks: bool,
}

impl Check {
    pub fn block_if(code: &'static str, blocks: bool) -> Self {
        Self { code, blocks }
    }

    /// A check that only applies when `enabled`
    pub fn when(enabled: bool, code: &'static str, blocks: bool) -> Self {
        Self {
            code,
            blocks: enabled && blocks,
        }
    }
}

/// Outcome of a check chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    allow: bool,
    reason_codes: Vec<String>,
}

impl Verdict {
    pub fn evaluate<I>(checks: I) -> Self
    where
        I: IntoIterator<Item = Check>,
    {
        match checks.into_iter().find(|check| check.blocks) {
            Some(check) => Self {
                allow: false,
                reason_codes: vec![check.code.to_string()],
            },
            None => Self {
                allow: true,
                reason_codes: Vec::new(),
            },
        }
    }

    /// Final threshold check, applied only while still allowed
    pub fn min_score(mut self, score: f64, min_pass_score: f64) -> Self {
        if self.allow && score < min_pass_score {
            self.allow = false;
            self.reason_codes.push(SCORE_BELOW_THRESHOLD.to_string());
        }
        self
    }

    /// Trailing pass marker, appended only when allowed
    pub fn pass_code(mut self, code: &'static str) -> Self {
        if self.allow {
            self.reason_codes.push(code.to_string());
        }
        self
    }

    pub fn allow(&self) -> bool {
        self.allow
    }

    pub fn reason_codes(&self) -> &[String] {
        &self.reason_codes
    }

    pub fn into_parts(self) -> (bool, Vec<String>) {
        (self.allow, self.reason_codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_failure_wins() {
        let verdict = Verdict::evaluate([
            Check::block_if("a", false),
            Check::block_if("b", true),
            Check::block_if("c", true),
        ])
        .min_score(0.0, 50.0)
        .pass_code("pass");
        assert!(!verdict.allow());
        assert_eq!(verdict.reason_codes(), ["b"]);
    }

    #[test]
    fn test_disabled_check_never_blocks() {
        let verdict = Verdict::evaluate([Check::when(false, "a", true)]);
        assert!(verdict.allow());
        assert!(verdict.reason_codes().is_empty());
    }

    #[test]
    fn test_score_threshold_then_pass_code() {
        let low = Verdict::evaluate([Check::block_if("a", false)])
            .min_score(64.0, 65.0)
            .pass_code("pass");
        assert_eq!(low.reason_codes(), [SCORE_BELOW_THRESHOLD]);

        let ok = Verdict::evaluate([Check::block_if("a", false)])
            .min_score(65.0, 65.0)
            .pass_code("pass");
        assert!(ok.allow());
        assert_eq!(ok.reason_codes(), ["pass"]);
    }
}
