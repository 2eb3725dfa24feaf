//! Safety evidence summaries.
//!
//! A safety payload is a list of pass/warn/fail checks, each with free-form
//! evidence. The overall status is the worst status present, and for display
//! the checks are grouped by status with intra-group order kept.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one safety check.
///
/// Variant order is the severity order: `Pass < Warn < Fail`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum SafetyStatus {
    /// Check passed.
    #[default]
    Pass,
    /// Check passed with a concern.
    Warn,
    /// Check failed.
    Fail,
}

impl SafetyStatus {
    /// Upper-case tag used in rendered output.
    pub fn tag(&self) -> &'static str {
        match self {
            SafetyStatus::Pass => "PASS",
            SafetyStatus::Warn => "WARN",
            SafetyStatus::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for SafetyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SafetyStatus::Pass => "pass",
            SafetyStatus::Warn => "warn",
            SafetyStatus::Fail => "fail",
        })
    }
}

/// One safety check with its evidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SafetyExplanation {
    /// Check category (e.g. "scope", "tests", "secrets").
    pub category: String,
    /// One-line statement of what was checked.
    pub statement: String,
    /// Structured evidence backing the statement.
    #[serde(default)]
    pub evidence: serde_json::Value,
    /// Check outcome.
    pub status: SafetyStatus,
}

impl SafetyExplanation {
    /// Create an explanation without evidence.
    pub fn new(
        category: impl Into<String>,
        statement: impl Into<String>,
        status: SafetyStatus,
    ) -> Self {
        Self {
            category: category.into(),
            statement: statement.into(),
            evidence: serde_json::Value::Null,
            status,
        }
    }

    /// Attach evidence.
    pub fn with_evidence(mut self, evidence: serde_json::Value) -> Self {
        self.evidence = evidence;
        self
    }
}

/// Reduce explanations to their overall status.
///
/// Max over the severity order, so the result does not depend on input
/// order. No explanations means `Pass`.
pub fn summarize(explanations: &[SafetyExplanation]) -> SafetyStatus {
    explanations
        .iter()
        .map(|e| e.status)
        .max()
        .unwrap_or(SafetyStatus::Pass)
}

/// Overall status plus the explanations it was computed from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SafetySummary {
    /// Worst status present.
    pub overall: SafetyStatus,
    /// Explanations in input order.
    pub explanations: Vec<SafetyExplanation>,
    /// When the underlying checks were computed (from the snapshot).
    #[serde(alias = "computed_at")]
    pub computed_at: DateTime<Utc>,
}

impl SafetySummary {
    /// Summarize explanations captured at `computed_at`.
    pub fn new(explanations: Vec<SafetyExplanation>, computed_at: DateTime<Utc>) -> Self {
        Self {
            overall: summarize(&explanations),
            explanations,
            computed_at,
        }
    }

    /// Group the explanations for display.
    pub fn groups(&self) -> EvidenceGroups<'_> {
        EvidenceGroups::new(&self.explanations)
    }
}

/// Explanations partitioned by status, borrowed from the summary.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceGroups<'a> {
    /// Failing checks in input order.
    pub fail: Vec<&'a SafetyExplanation>,
    /// Warning checks in input order.
    pub warn: Vec<&'a SafetyExplanation>,
    /// Passing checks in input order.
    pub pass: Vec<&'a SafetyExplanation>,
}

impl<'a> EvidenceGroups<'a> {
    /// Partition explanations by status.
    pub fn new(explanations: &'a [SafetyExplanation]) -> Self {
        let mut groups = Self {
            fail: Vec::new(),
            warn: Vec::new(),
            pass: Vec::new(),
        };
        for explanation in explanations {
            match explanation.status {
                SafetyStatus::Fail => groups.fail.push(explanation),
                SafetyStatus::Warn => groups.warn.push(explanation),
                SafetyStatus::Pass => groups.pass.push(explanation),
            }
        }
        groups
    }

    /// Whether the pass group starts collapsed.
    ///
    /// Collapsed only when there are both failures and warnings to look at.
    pub fn pass_collapsed_by_default(&self) -> bool {
        !self.fail.is_empty() && !self.warn.is_empty()
    }

    /// Render the groups as an indented text tree.
    ///
    /// With `expand_all` the pass group is always shown in full.
    pub fn render_tree(&self, expand_all: bool) -> String {
        let mut out = String::new();
        let collapse_pass = !expand_all && self.pass_collapsed_by_default();

        for (status, group) in [
            (SafetyStatus::Fail, &self.fail),
            (SafetyStatus::Warn, &self.warn),
            (SafetyStatus::Pass, &self.pass),
        ] {
            if group.is_empty() {
                continue;
            }

            let _ = writeln!(out, "{} ({})", status.tag(), group.len());

            if status == SafetyStatus::Pass && collapse_pass {
                let _ = writeln!(out, "  ... {} passing checks hidden", group.len());
                continue;
            }

            for explanation in group {
                let _ = writeln!(
                    out,
                    "  [{}] {}: {}",
                    status.tag(),
                    explanation.category,
                    explanation.statement
                );
                render_evidence(&mut out, &explanation.evidence, 4);
            }
        }

        out
    }
}

/// Append evidence as indented `key: value` lines.
fn render_evidence(out: &mut String, evidence: &serde_json::Value, indent: usize) {
    let pad = " ".repeat(indent);
    match evidence {
        serde_json::Value::Null => {}
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                match value {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        let _ = writeln!(out, "{}{}:", pad, key);
                        render_evidence(out, value, indent + 2);
                    }
                    _ => {
                        let _ = writeln!(out, "{}{}: {}", pad, key, scalar(value));
                    }
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                match item {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        let _ = writeln!(out, "{}-", pad);
                        render_evidence(out, item, indent + 2);
                    }
                    _ => {
                        let _ = writeln!(out, "{}- {}", pad, scalar(item));
                    }
                }
            }
        }
        other => {
            let _ = writeln!(out, "{}{}", pad, scalar(other));
        }
    }
}

fn scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn check(category: &str, status: SafetyStatus) -> SafetyExplanation {
        SafetyExplanation::new(category, format!("{} check", category), status)
    }

    #[test]
    fn test_summarize_empty_is_pass() {
        assert_eq!(summarize(&[]), SafetyStatus::Pass);
    }

    #[test]
    fn test_summarize_warn_beats_pass() {
        let checks = vec![
            check("scope", SafetyStatus::Pass),
            check("tests", SafetyStatus::Warn),
        ];
        assert_eq!(summarize(&checks), SafetyStatus::Warn);
    }

    #[test]
    fn test_summarize_fail_beats_everything() {
        let checks = vec![
            check("scope", SafetyStatus::Pass),
            check("tests", SafetyStatus::Warn),
            check("secrets", SafetyStatus::Fail),
        ];
        assert_eq!(summarize(&checks), SafetyStatus::Fail);

        let reversed: Vec<_> = checks.into_iter().rev().collect();
        assert_eq!(summarize(&reversed), SafetyStatus::Fail);
    }

    #[test]
    fn test_severity_order() {
        assert!(SafetyStatus::Pass < SafetyStatus::Warn);
        assert!(SafetyStatus::Warn < SafetyStatus::Fail);
    }

    #[test]
    fn test_groups_preserve_input_order() {
        let checks = vec![
            check("a", SafetyStatus::Warn),
            check("b", SafetyStatus::Pass),
            check("c", SafetyStatus::Fail),
            check("d", SafetyStatus::Warn),
            check("e", SafetyStatus::Pass),
        ];
        let groups = EvidenceGroups::new(&checks);

        fn names(group: &[&SafetyExplanation]) -> Vec<String> {
            group.iter().map(|e| e.category.clone()).collect()
        }
        assert_eq!(names(&groups.fail), vec!["c"]);
        assert_eq!(names(&groups.warn), vec!["a", "d"]);
        assert_eq!(names(&groups.pass), vec!["b", "e"]);
    }

    #[test]
    fn test_pass_collapsed_only_with_fail_and_warn() {
        let fail_warn = vec![
            check("a", SafetyStatus::Fail),
            check("b", SafetyStatus::Warn),
            check("c", SafetyStatus::Pass),
        ];
        assert!(EvidenceGroups::new(&fail_warn).pass_collapsed_by_default());

        let fail_only = vec![check("a", SafetyStatus::Fail), check("c", SafetyStatus::Pass)];
        assert!(!EvidenceGroups::new(&fail_only).pass_collapsed_by_default());

        let warn_only = vec![check("b", SafetyStatus::Warn), check("c", SafetyStatus::Pass)];
        assert!(!EvidenceGroups::new(&warn_only).pass_collapsed_by_default());
    }

    #[test]
    fn test_render_tree_collapses_pass_group() {
        let checks = vec![
            check("secrets", SafetyStatus::Fail),
            check("tests", SafetyStatus::Warn),
            check("scope", SafetyStatus::Pass),
            check("lint", SafetyStatus::Pass),
        ];
        let groups = EvidenceGroups::new(&checks);

        let collapsed = groups.render_tree(false);
        assert!(collapsed.contains("FAIL (1)"));
        assert!(collapsed.contains("[FAIL] secrets: secrets check"));
        assert!(collapsed.contains("2 passing checks hidden"));
        assert!(!collapsed.contains("[PASS] scope"));

        // Collapse is display-only: expanding shows everything
        let expanded = groups.render_tree(true);
        assert!(expanded.contains("[PASS] scope: scope check"));
        assert!(expanded.contains("[PASS] lint: lint check"));
        assert!(!expanded.contains("hidden"));
    }

    #[test]
    fn test_render_tree_prints_evidence() {
        let checks = vec![check("scope", SafetyStatus::Warn).with_evidence(serde_json::json!({
            "files_touched": 14,
            "outside_scope": ["build.rs", "Cargo.lock"]
        }))];
        let rendered = EvidenceGroups::new(&checks).render_tree(false);

        assert!(rendered.contains("    files_touched: 14"));
        assert!(rendered.contains("    outside_scope:"));
        assert!(rendered.contains("      - build.rs"));
        assert!(rendered.contains("      - Cargo.lock"));
    }

    #[test]
    fn test_render_tree_empty() {
        assert!(EvidenceGroups::new(&[]).render_tree(false).is_empty());
    }

    #[test]
    fn test_summary_is_pure() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let checks = vec![
            check("scope", SafetyStatus::Pass),
            check("tests", SafetyStatus::Warn),
        ];

        let first = SafetySummary::new(checks.clone(), at);
        let second = SafetySummary::new(checks, at);

        assert_eq!(first, second);
        assert_eq!(first.overall, SafetyStatus::Warn);
        assert_eq!(first.groups().warn.len(), 1);
    }

    #[test]
    fn test_parse_wire_explanations() {
        let json = r#"[
            {"category": "tests", "statement": "suite green", "status": "pass"},
            {"category": "scope", "statement": "touches CI", "status": "warn",
             "evidence": {"paths": [".github/workflows/ci.yml"]}}
        ]"#;
        let checks: Vec<SafetyExplanation> = serde_json::from_str(json).unwrap();

        assert_eq!(checks.len(), 2);
        assert!(checks[0].evidence.is_null());
        assert_eq!(summarize(&checks), SafetyStatus::Warn);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_status() -> impl Strategy<Value = SafetyStatus> {
            prop_oneof![
                Just(SafetyStatus::Pass),
                Just(SafetyStatus::Warn),
                Just(SafetyStatus::Fail),
            ]
        }

        proptest! {
            // Property: summarize is independent of input order
            #[test]
            fn prop_summarize_order_independent(
                statuses in prop::collection::vec(arb_status(), 0..20),
                rotate in 0usize..20,
            ) {
                let checks: Vec<_> = statuses
                    .iter()
                    .enumerate()
                    .map(|(i, s)| check(&format!("c{}", i), *s))
                    .collect();
                let mut shuffled = checks.clone();
                if !shuffled.is_empty() {
                    let n = rotate % shuffled.len();
                    shuffled.rotate_left(n);
                }
                shuffled.reverse();

                prop_assert_eq!(summarize(&checks), summarize(&shuffled));
            }

            // Property: overall equals the worst status and grouping loses nothing
            #[test]
            fn prop_overall_is_worst_and_groups_partition(
                statuses in prop::collection::vec(arb_status(), 0..20)
            ) {
                let checks: Vec<_> = statuses
                    .iter()
                    .map(|s| check("c", *s))
                    .collect();
                let overall = summarize(&checks);
                let expected = if statuses.contains(&SafetyStatus::Fail) {
                    SafetyStatus::Fail
                } else if statuses.contains(&SafetyStatus::Warn) {
                    SafetyStatus::Warn
                } else {
                    SafetyStatus::Pass
                };
                prop_assert_eq!(overall, expected);

                let groups = EvidenceGroups::new(&checks);
                prop_assert_eq!(
                    groups.fail.len() + groups.warn.len() + groups.pass.len(),
                    checks.len()
                );
            }
        }
    }
}
