use std::collections::{BTreeSet, HashSet};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::remote::{Query, Remote, Table};
use crate::store::MapKind;
use crate::types::{Collection, Column, Kind, Row};

use super::Engine;
use super::report::Outcome;

/// Column changes needed to bring a remote table in line with the local schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    pub add: Vec<Column>,
    pub remove: Vec<String>,
}

impl SchemaDiff {
    /// `add = local - remote - defaults`, `remove = remote - local - defaults`, by column name.
    pub fn between(local: &[Column], remote: &[Column], defaults: &[&str]) -> Self {
        let local_names: BTreeSet<&str> = local.iter().map(|c| c.name.as_str()).collect();
        let remote_names: BTreeSet<&str> = remote.iter().map(|c| c.name.as_str()).collect();
        let is_default = |name: &str| defaults.contains(&name);

        Self {
            add: local
                .iter()
                .filter(|c| !remote_names.contains(c.name.as_str()) && !is_default(&c.name))
                .cloned()
                .collect(),
            remove: remote
                .iter()
                .filter(|c| !local_names.contains(c.name.as_str()) && !is_default(&c.name))
                .map(|c| c.name.clone())
                .collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

impl<R: Remote> Engine<R> {
    /// Reads every row of a collection, one page at a time in `item_id`
    /// order, until the number of distinct rows reaches the remote count or
    /// a page comes back empty. Rows seen on an earlier page are dropped.
    pub(super) fn fetch_rows(&mut self, name: &str, id: &str) -> Result<Vec<Row>> {
        let page_size = self.ctx.options.page_size();
        let total = self.call(|r| r.count(id))?;

        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        let mut page_number = 1;

        while (rows.len() as u64) < total {
            let query = Query::page(page_size, page_number);
            let page = self.call(|r| r.rows(id, &query))?;
            if page.rows.is_empty() {
                break;
            }

            for row in page.rows {
                let item_id = match row.get("item_id") {
                    Some(Value::String(item_id)) => item_id.clone(),
                    Some(other) => {
                        return Err(Error::Protocol(format!(
                            "collection '{name}' has a non-string item_id: {other}"
                        )));
                    }
                    None => {
                        return Err(Error::Protocol(format!(
                            "collection '{name}' returned a row without item_id"
                        )));
                    }
                };
                if seen.insert(item_id) {
                    rows.push(row);
                }
            }
            page_number += 1;
        }

        debug!(collection = name, rows = rows.len(), pages = page_number - 1, "rows fetched");
        Ok(rows)
    }

    /// Applies a schema diff: every drop before any add.
    pub(super) fn apply_schema(&mut self, table: Table<'_>, diff: &SchemaDiff) -> Result<()> {
        for name in &diff.remove {
            self.call(|r| r.delete_column(table, name))?;
            info!(?table, column = %name, "column dropped");
        }
        for column in &diff.add {
            self.call(|r| r.add_column(table, column))?;
            info!(?table, column = %column.name, "column added");
        }
        Ok(())
    }

    /// Pushes the custom-column schema of users, devices or edges.
    pub(super) fn push_table_schema(&mut self, kind: Kind) -> Result<bool> {
        let Some(table) = Table::for_kind(kind) else {
            return Ok(false);
        };
        let local = self.store.read_schema(kind)?;
        let remote = self.call(|r| r.columns(table))?;
        let diff = SchemaDiff::between(&local, &remote, kind.default_columns());
        self.apply_schema(table, &diff)?;
        Ok(!diff.is_empty())
    }

    /// Resolves a collection's ID and reads its columns. A mapped ID the
    /// remote no longer knows is dropped and the name looked up again in the
    /// remote listing. `None` when no collection of that name exists.
    pub(super) fn collection_columns(&mut self, name: &str) -> Result<Option<(String, Vec<Column>)>> {
        let Some(id) = self.collection_id(name)? else {
            return Ok(None);
        };
        match self.call(|r| r.columns(Table::Collection(&id))) {
            Ok(columns) => return Ok(Some((id, columns))),
            Err(err) if err.is_not_found() => {
                warn!(collection = name, stale_id = %id, "mapped ID not found remotely, looking up by name");
                self.store.remove_id(MapKind::Collections, name)?;
                self.listings.collections = None;
            }
            Err(err) => return Err(err),
        }

        let Some(id) = self.collection_id(name)? else {
            return Ok(None);
        };
        let columns = self.call(|r| r.columns(Table::Collection(&id)))?;
        Ok(Some((id, columns)))
    }

    pub(super) fn push_collection(&mut self, name: &str) -> Result<Outcome> {
        let local = self.store.read::<Collection>(name)?;
        let mut outcome = Outcome::Unchanged;

        let (id, remote) = match self.collection_columns(name)? {
            Some(found) => found,
            None => {
                if !self.ask(&format!("Create new collection named '{name}'?"))? {
                    return Ok(Outcome::Skipped);
                }
                let id = self.call(|r| r.create_collection(name))?;
                self.store.put_id(MapKind::Collections, name, &id)?;
                self.listings.collections = None;
                outcome = Outcome::Created;
                let columns = self.call(|r| r.columns(Table::Collection(&id)))?;
                (id, columns)
            }
        };

        let diff = SchemaDiff::between(&local.schema, &remote, Kind::Collection.default_columns());
        if !diff.is_empty() {
            self.apply_schema(Table::Collection(&id), &diff)?;
            if outcome == Outcome::Unchanged {
                outcome = Outcome::Updated;
            }
        }

        let created = self.upsert_rows(&id, &local.items)?;
        if created > 0 && outcome == Outcome::Unchanged {
            outcome = Outcome::Updated;
        }
        Ok(outcome)
    }

    /// Updates each row by `item_id`, creating the rows that matched
    /// nothing. Returns how many rows were created.
    fn upsert_rows(&mut self, id: &str, rows: &[Row]) -> Result<usize> {
        let mut missing = Vec::new();
        for row in rows {
            let Some(Value::String(item_id)) = row.get("item_id") else {
                missing.push(row.clone());
                continue;
            };
            let query = Query::by_item_id(item_id.clone());
            let mut changes = row.clone();
            changes.remove("item_id");
            let matched = self.call(|r| r.update_rows(id, &query, &changes))?;
            if matched == 0 {
                missing.push(row.clone());
            }
        }

        let page_size = self.ctx.options.page_size();
        for chunk in missing.chunks(page_size) {
            self.call(|r| r.create_rows(id, chunk))?;
        }
        Ok(missing.len())
    }
}
