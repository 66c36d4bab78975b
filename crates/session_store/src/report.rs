//! User-facing collaborators: error display and yes/no/cancel prompts.

use std::sync::Mutex;

/// Shows a failure to the user. Never the only signal of failure: callers
/// still receive an error value.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, text: &str, param: Option<&str>);
}

/// Reports through `tracing` at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, text: &str, param: Option<&str>) {
        match param {
            Some(param) => tracing::error!(param, "{text}"),
            None => tracing::error!("{text}"),
        }
    }
}

/// Keeps every report in memory; used by tests and batch tools.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    reports: Mutex<Vec<String>>,
}

impl CollectingReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn reports(&self) -> Vec<String> {
        match self.reports.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, text: &str, param: Option<&str>) {
        let line = match param {
            Some(param) => format!("{text}: {param}"),
            None => text.to_string(),
        };
        match self.reports.lock() {
            Ok(mut guard) => guard.push(line),
            Err(poisoned) => poisoned.into_inner().push(line),
        }
    }
}

/// Answer to a three-way prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Affirm,
    Decline,
    Cancel,
}

pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> Confirmation;
}

/// Gives the same answer to every prompt.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub Confirmation);

impl Confirm for FixedAnswer {
    fn confirm(&self, _prompt: &str) -> Confirmation {
        self.0
    }
}
