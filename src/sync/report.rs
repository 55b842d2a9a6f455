use std::fmt;

use crate::types::Kind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Pulled,
    Created,
    Updated,
    Unchanged,
    Deleted,
    Skipped,
    Failed { action: &'static str, detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub kind: Kind,
    pub name: String,
    pub outcome: Outcome,
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, name) = (self.kind, &self.name);
        match &self.outcome {
            Outcome::Pulled => write!(f, "Pulled {kind} '{name}'"),
            Outcome::Created => write!(f, "Created {kind} '{name}'"),
            Outcome::Updated => write!(f, "Updated {kind} '{name}'"),
            Outcome::Unchanged => write!(f, "{kind} '{name}' is up to date"),
            Outcome::Deleted => write!(f, "Deleted {kind} '{name}'"),
            Outcome::Skipped => write!(f, "Skipped {kind} '{name}'"),
            Outcome::Failed { action, detail } => {
                write!(f, "Could not {action} {kind} '{name}': {detail}")
            }
        }
    }
}

/// Per-asset outcomes of one engine run, in the order they happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    entries: Vec<Entry>,
}

impl Report {
    pub fn record(&mut self, kind: Kind, name: impl Into<String>, outcome: Outcome) {
        self.entries.push(Entry {
            kind,
            name: name.into(),
            outcome,
        });
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn failures(&self) -> impl Iterator<Item = &Entry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Failed { .. }))
    }

    #[must_use]
    pub fn count(&self, outcome: &Outcome) -> usize {
        self.entries.iter().filter(|e| &e.outcome == outcome).count()
    }

    pub fn extend(&mut self, other: Report) {
        self.entries.extend(other.entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_line_names_kind_and_asset() {
        let mut report = Report::default();
        report.record(
            Kind::Role,
            "Admin",
            Outcome::Failed {
                action: "update",
                detail: "boom".into(),
            },
        );
        report.record(Kind::Service, "A", Outcome::Updated);
        let failures: Vec<String> = report.failures().map(ToString::to_string).collect();
        assert_eq!(failures, ["Could not update role 'Admin': boom"]);
        assert_eq!(report.count(&Outcome::Updated), 1);
    }
}
