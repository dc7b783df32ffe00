/// A single failed comparison raised by the validator.
///
/// Produced by [`ValidationResult::into_result`](crate::report::ValidationResult::into_result)
/// when the caller wants one-failure-per-call semantics instead of the
/// batched report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "{field}: {message} (expected {}, actual {})",
    .expected.as_deref().unwrap_or("undefined"),
    .actual.as_deref().unwrap_or("undefined")
)]
pub struct AssertionFailure {
    pub field: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub message: String,
}
