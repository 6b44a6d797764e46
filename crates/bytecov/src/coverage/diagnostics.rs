//! Skip log: what was left uninstrumented and why.
//!
//! A broken class must never stop the host from loading it. Failures that
//! make a whole class untrustworthy skip the class (it loads unmodified);
//! failures confined to one method skip that method and keep the rest.

use crate::result::{BytecovError, ErrorKind};
use serde::{Deserialize, Serialize};

/// How far a failure reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticAction {
    /// The class loads with its original bytes
    SkipClass,
    /// The method keeps its original code, siblings are instrumented
    SkipMethod,
    /// Recorded for the user, nothing was skipped
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub class: String,
    pub method: Option<String>,
    pub kind: Option<ErrorKind>,
    pub message: String,
    pub action: DiagnosticAction,
}

impl Diagnostic {
    /// Class-level failure
    #[must_use]
    pub fn skip_class(class: impl Into<String>, error: &BytecovError) -> Self {
        Self {
            class: class.into(),
            method: None,
            kind: Some(error.kind()),
            message: error.to_string(),
            action: DiagnosticAction::SkipClass,
        }
    }

    /// Class skipped for a reason outside the error taxonomy, e.g. a panic
    #[must_use]
    pub fn aborted(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: None,
            kind: None,
            message: message.into(),
            action: DiagnosticAction::SkipClass,
        }
    }

    #[must_use]
    pub fn skip_method(
        class: impl Into<String>,
        method: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            class: class.into(),
            method: Some(method.into()),
            kind: Some(kind),
            message: message.into(),
            action: DiagnosticAction::SkipMethod,
        }
    }

    #[must_use]
    pub fn warn(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: None,
            kind: None,
            message: message.into(),
            action: DiagnosticAction::Warn,
        }
    }

    /// One-line rendering for logs and the CLI
    #[must_use]
    pub fn description(&self) -> String {
        let target = match &self.method {
            Some(method) => format!("{}.{method}", self.class),
            None => self.class.clone(),
        };
        let action = match self.action {
            DiagnosticAction::SkipClass => "class skipped",
            DiagnosticAction::SkipMethod => "method skipped",
            DiagnosticAction::Warn => "warning",
        };
        format!("{target}: {action}: {}", self.message)
    }
}

/// Diagnostics recorded so far, in arrival order
#[derive(Debug, Default, Clone)]
pub struct DiagnosticLog {
    entries: Vec<Diagnostic>,
}

impl DiagnosticLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `diagnostic` and emit it as a warning
    pub fn record(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(
            class = %diagnostic.class,
            method = diagnostic.method.as_deref().unwrap_or("-"),
            kind = ?diagnostic.kind,
            action = ?diagnostic.action,
            "{}",
            diagnostic.message
        );
        self.entries.push(diagnostic);
    }

    #[must_use]
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    #[must_use]
    pub fn for_class(&self, class: &str) -> Vec<&Diagnostic> {
        self.entries.iter().filter(|d| d.class == class).collect()
    }

    /// Number of classes that loaded unmodified
    #[must_use]
    pub fn skipped_classes(&self) -> usize {
        self.count(DiagnosticAction::SkipClass)
    }

    #[must_use]
    pub fn skipped_methods(&self) -> usize {
        self.count(DiagnosticAction::SkipMethod)
    }

    fn count(&self, action: DiagnosticAction) -> usize {
        self.entries.iter().filter(|d| d.action == action).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
