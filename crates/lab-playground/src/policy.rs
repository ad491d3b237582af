//! Static safety policy applied to cell code before execution.
//!
//! This check is the only preventive control before code reaches the
//! remote interpreter: pure, synchronous, and evaluated before any
//! network call. Rules are ordered and the first match short-circuits.

use regex::Regex;
use std::sync::OnceLock;

/// One policy rule: a pattern and the message shown when it matches.
#[derive(Debug)]
pub struct PolicyRule {
    pattern: &'static str,
    pub message: &'static str,
}

/// Ordered rule list. Order matters: more specific rules come first so
/// their message wins.
const RULES: &[PolicyRule] = &[
    PolicyRule {
        pattern: r"\bpip3?\s+install\b",
        message: "Package installation is disabled. The playground environment already provides the data-science stack.",
    },
    PolicyRule {
        pattern: r"\bconda\s+(install|create)\b",
        message: "Conda environment changes are disabled in the playground.",
    },
    PolicyRule {
        pattern: r"\b(apt|apt-get|yum|dnf|brew|apk)\s+(install|add)\b",
        message: "System package managers are not available in the playground.",
    },
    PolicyRule {
        pattern: r"(?m)^\s*!",
        message: "Shell commands are disabled in playground cells.",
    },
    PolicyRule {
        pattern: r"(?m)^\s*(?:import|from)\s+(?:tensorflow|torch|keras|pyspark)\b",
        message: "This library is not available in the playground environment.",
    },
    PolicyRule {
        pattern: r"__import__\s*\(|\bimportlib\b",
        message: "Dynamic imports are disabled in the playground.",
    },
    PolicyRule {
        pattern: r"\bsubprocess\b|\bos\.system\b|\bos\.popen\b|\bpty\.spawn\b",
        message: "Shell and subprocess access is disabled in the playground.",
    },
];

fn compiled() -> &'static Vec<(Regex, &'static PolicyRule)> {
    static COMPILED: OnceLock<Vec<(Regex, &'static PolicyRule)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .map(|rule| {
                let regex = Regex::new(rule.pattern).expect("invalid policy pattern");
                (regex, rule)
            })
            .collect()
    })
}

/// Check code against the policy. Returns the first matching rule, or
/// None when the code is allowed to run.
pub fn check(code: &str) -> Option<&'static PolicyRule> {
    compiled()
        .iter()
        .find(|(regex, _)| regex.is_match(code))
        .map(|(_, rule)| *rule)
}
