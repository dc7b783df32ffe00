use serde::Serialize;

use crate::error::AssertionFailure;

/// Outcome of one named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assertion {
    pub field: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub passed: bool,
    pub message: String,
}

/// Ordered assertion outcomes. The harness records, the test runner decides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    assertions: Vec<Assertion>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a check. Returns `passed` so callers can branch on it.
    pub fn check(
        &mut self,
        field: impl Into<String>,
        passed: bool,
        expected: Option<String>,
        actual: Option<String>,
        message: impl Into<String>,
    ) -> bool {
        self.assertions.push(Assertion {
            field: field.into(),
            expected,
            actual,
            passed,
            message: message.into(),
        });
        passed
    }

    pub fn pass(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.check(field, true, None, None, message);
    }

    pub fn fail(
        &mut self,
        field: impl Into<String>,
        expected: Option<String>,
        actual: Option<String>,
        message: impl Into<String>,
    ) {
        self.check(field, false, expected, actual, message);
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    pub fn failures(&self) -> impl Iterator<Item = &Assertion> {
        self.assertions.iter().filter(|a| !a.passed)
    }

    /// `true` when no recorded check failed (vacuously for an empty result).
    pub fn passed(&self) -> bool {
        self.assertions.iter().all(|a| a.passed)
    }

    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.assertions.extend(other.assertions);
    }

    /// Raise the first failure, for frameworks that want one failure per call.
    pub fn into_result(self) -> Result<Self, AssertionFailure> {
        match self.assertions.iter().find(|a| !a.passed) {
            Some(a) => Err(AssertionFailure {
                field: a.field.clone(),
                expected: a.expected.clone(),
                actual: a.actual.clone(),
                message: a.message.clone(),
            }),
            None => Ok(self),
        }
    }

    /// One line per failure: `"<title>: <field> | <message>"`.
    pub fn failure_messages(&self, title: &str) -> String {
        self.failures()
            .map(|a| format!("{title}: {} | {}", a.field, a.message))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
