use std::collections::BTreeMap;

use crate::types::Kind;

/// Which assets of one kind an operation covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Named(Vec<String>),
}

/// Assets an operation covers, per kind. Iteration follows [`Kind::PUSH_ORDER`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    kinds: BTreeMap<Kind, Scope>,
    everything: bool,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every asset of every kind. Unlike selecting each kind in full, this
    /// is what `export` and `-all` mean, so users stay out of a pull unless
    /// user export is enabled.
    pub fn everything() -> Self {
        let mut sel = Self::new();
        for kind in Kind::PUSH_ORDER {
            sel.add_all(kind);
        }
        sel.everything = true;
        sel
    }

    #[must_use]
    pub fn is_everything(&self) -> bool {
        self.everything
    }

    pub fn add_all(&mut self, kind: Kind) {
        self.kinds.insert(kind, Scope::All);
    }

    /// Adds one named asset. A kind already selected in full stays so.
    pub fn add_name(&mut self, kind: Kind, name: impl Into<String>) {
        let name = name.into();
        match self.kinds.entry(kind).or_insert_with(|| Scope::Named(Vec::new())) {
            Scope::All => {}
            Scope::Named(names) => {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
    }

    pub fn remove(&mut self, kind: Kind) {
        self.kinds.remove(&kind);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    #[must_use]
    pub fn contains(&self, kind: Kind) -> bool {
        self.kinds.contains_key(&kind)
    }

    #[must_use]
    pub fn scope(&self, kind: Kind) -> Option<&Scope> {
        self.kinds.get(&kind)
    }

    /// Selected kinds with their scopes, dependencies first.
    pub fn iter(&self) -> impl Iterator<Item = (Kind, &Scope)> {
        Kind::PUSH_ORDER
            .into_iter()
            .filter_map(|k| self.kinds.get(&k).map(|s| (k, s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_follows_push_order() {
        let mut sel = Selection::new();
        sel.add_name(Kind::Deployment, "d");
        sel.add_name(Kind::Service, "s");
        sel.add_all(Kind::Collection);
        let kinds: Vec<Kind> = sel.iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, [Kind::Collection, Kind::Service, Kind::Deployment]);
    }

    #[test]
    fn test_everything_is_marked_apart_from_each_kind_in_full() {
        let mut each = Selection::new();
        for kind in Kind::PUSH_ORDER {
            each.add_all(kind);
        }
        assert!(!each.is_everything());
        assert!(Selection::everything().is_everything());
        assert_eq!(Selection::everything().scope(Kind::User), Some(&Scope::All));
    }

    #[test]
    fn test_all_absorbs_names() {
        let mut sel = Selection::new();
        sel.add_all(Kind::Role);
        sel.add_name(Kind::Role, "Admin");
        assert_eq!(sel.scope(Kind::Role), Some(&Scope::All));

        sel.add_name(Kind::User, "a@example.com");
        sel.add_name(Kind::User, "a@example.com");
        assert_eq!(
            sel.scope(Kind::User),
            Some(&Scope::Named(vec!["a@example.com".into()]))
        );
    }
}
