//! Diagnostic events published by the discovery service.

use std::fmt;

/// Which driver operation a fan-out round runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// One-shot `find_peers`
    Lookup,
    /// Continuous `subscribe`
    Watch,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Lookup => "lookup",
            Operation::Watch => "watch",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one driver answered one lookup or watch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverOutcome {
    /// The driver returned a stream that is now being fed
    Started,
    /// The driver does not support this topic or operation
    Skipped,
    /// The driver failed to start
    Failed(String),
}

/// Per-driver result of a fan-out round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEvent {
    pub driver: String,
    pub topic: String,
    pub operation: Operation,
    pub outcome: DriverOutcome,
}

impl DiscoveryEvent {
    pub(crate) fn new(
        driver: &str,
        topic: &str,
        operation: Operation,
        outcome: DriverOutcome,
    ) -> Self {
        Self { driver: driver.to_owned(), topic: topic.to_owned(), operation, outcome }
    }

    /// Whether the driver was left out of the round
    pub fn is_skip_or_failure(&self) -> bool {
        !matches!(self.outcome, DriverOutcome::Started)
    }
}

impl fmt::Display for DiscoveryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} on `{}`: ", self.driver, self.operation, self.topic)?;
        match &self.outcome {
            DriverOutcome::Started => write!(f, "started"),
            DriverOutcome::Skipped => write!(f, "not supported"),
            DriverOutcome::Failed(error) => write!(f, "failed ({error})"),
        }
    }
}
