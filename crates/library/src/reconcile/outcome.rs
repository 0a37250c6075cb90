use derive_more::Display;

/// How reconciling a single catalog entry ended.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Outcome {
    /// Nothing to do.
    #[display("skipped: {_0}")]
    Skipped(SkipReason),
    /// Every part of the entry now has a decrypted output (names listed in
    /// part order, including parts that were already present).
    #[display("converted: {}", _0.join(", "))]
    Converted(Vec<String>),
    /// The entry could not be completed; a failure marker was written.
    #[display("failed: {_0}")]
    Failed(FailReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SkipReason {
    #[display("output exists ({_0})")]
    OutputExists(String),
    #[display("previously marked failed ({_0})")]
    PreviouslyFailed(String),
    /// The identifier appeared earlier in the same run.
    #[display("already processed")]
    AlreadyProcessed,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum FailReason {
    #[display("acquire produced no file")]
    AcquireProducedNoFile,
    #[display("no key")]
    KeyUnavailable,
    /// Some parts failed to convert. Parts that did convert are kept.
    #[display("{failed} part(s) failed to convert, {} converted", converted.len())]
    ConvertFailed { converted: Vec<String>, failed: usize },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
