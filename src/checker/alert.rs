//! Alerts raised by change checkers

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::nid::Nid;

/// How serious an alert is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Information,
    Warning,
    Error,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Information => "INFORMATION",
            AlertSeverity::Warning => "WARNING",
            AlertSeverity::Error => "ERROR",
        }
    }
}

/// The checkpoint at which checkers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckPhase {
    /// A chronology was written with pending edits.
    AddUncommitted,
    /// Pending edits are about to be committed.
    Commit,
}

/// One finding of one checker about one chronology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    /// Name of the checker that raised it.
    pub checker: String,
    pub nid: Option<Nid>,
    pub message: String,
}

impl Alert {
    pub fn new(
        severity: AlertSeverity,
        checker: impl Into<String>,
        nid: Option<Nid>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            checker: checker.into(),
            nid,
            message: message.into(),
        }
    }

    pub fn information(checker: impl Into<String>, nid: Nid, message: impl Into<String>) -> Self {
        Self::new(AlertSeverity::Information, checker, Some(nid), message)
    }

    pub fn warning(checker: impl Into<String>, nid: Nid, message: impl Into<String>) -> Self {
        Self::new(AlertSeverity::Warning, checker, Some(nid), message)
    }

    pub fn error(checker: impl Into<String>, nid: Nid, message: impl Into<String>) -> Self {
        Self::new(AlertSeverity::Error, checker, Some(nid), message)
    }

    /// True if this alert aborts the enclosing write or commit.
    pub fn fail_commit(&self) -> bool {
        self.severity == AlertSeverity::Error
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity.as_str(), self.checker)?;
        if let Some(nid) = self.nid {
            write!(f, " nid {}", nid)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// True if any alert blocks the commit.
pub fn any_blocking(alerts: &[Alert]) -> bool {
    alerts.iter().any(Alert::fail_commit)
}

pub fn blocking_count(alerts: &[Alert]) -> usize {
    alerts.iter().filter(|a| a.fail_commit()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_error_fails_commit() {
        assert!(!Alert::information("c", -1, "m").fail_commit());
        assert!(!Alert::warning("c", -1, "m").fail_commit());
        assert!(Alert::error("c", -1, "m").fail_commit());
    }

    #[test]
    fn test_any_blocking() {
        let mut alerts = vec![Alert::warning("c", -1, "m")];
        assert!(!any_blocking(&alerts));
        alerts.push(Alert::error("c", -2, "m"));
        assert!(any_blocking(&alerts));
        assert_eq!(blocking_count(&alerts), 1);
    }

    #[test]
    fn test_display() {
        let alert = Alert::error("description", -7, "language unset");
        assert_eq!(alert.to_string(), "[ERROR] description nid -7: language unset");
    }
}
