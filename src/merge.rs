//! Record merge engine.
//!
//! Imports are append-only: existing records keep their order and incoming
//! records follow in their own order. Identifiers stay unique because a
//! colliding incoming id is suffixed with a collection-wide sequence number.

use crate::record::Record;
use serde::Serialize;
use std::collections::HashSet;

/// Insertion-ordered records plus the sections seen so far.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Collection {
    records: Vec<Record>,
    sections: Vec<String>,
    #[serde(skip)]
    next_suffix: u64,
}

/// What a single [`Collection::merge`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOutcome {
    pub appended: usize,
    /// `(original id, assigned id)` for every rewritten identifier.
    pub renamed: Vec<(String, String)>,
    pub new_section: bool,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.iter().any(|s| s == section)
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Record> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    /// Appends `incoming` and registers `group_key` as a section.
    pub fn merge(&mut self, incoming: Vec<Record>, group_key: &str) -> MergeOutcome {
        let mut taken: HashSet<String> = self.records.iter().map(|r| r.id.clone()).collect();
        let mut renamed = Vec::new();
        let appended = incoming.len();

        self.records.reserve(appended);
        for mut record in incoming {
            record.normalize();
            if taken.contains(&record.id) {
                let fresh = self.fresh_id(&record.id, &taken);
                log::debug!("identifier '{}' already taken, using '{}'", record.id, fresh);
                renamed.push((record.id.clone(), fresh.clone()));
                record.id = fresh;
            }
            taken.insert(record.id.clone());
            self.records.push(record);
        }

        let new_section = self.add_section(group_key);

        MergeOutcome {
            appended,
            renamed,
            new_section,
        }
    }

    /// Appends one record, renaming it on collision. Returns the id it got.
    pub fn push(&mut self, mut record: Record) -> String {
        record.normalize();
        if self.contains_id(&record.id) {
            let taken: HashSet<String> = self.records.iter().map(|r| r.id.clone()).collect();
            record.id = self.fresh_id(&record.id, &taken);
        }
        let id = record.id.clone();
        self.records.push(record);
        id
    }

    /// Replaces the record with the same id. Returns false when absent.
    pub fn replace(&mut self, mut record: Record) -> bool {
        record.normalize();
        match self.get_mut(&record.id) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    /// Removes the record with `id`. Returns false when absent.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        self.records.len() != before
    }

    /// Adds `section` in first-seen order. Returns true if it was new.
    pub fn add_section(&mut self, section: &str) -> bool {
        if self.has_section(section) {
            return false;
        }
        self.sections.push(section.to_string());
        true
    }

    /// Records whose grouping key is `section`.
    pub fn in_section<'a>(&'a self, section: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records.iter().filter(move |r| r.section == section)
    }

    fn fresh_id(&mut self, base: &str, taken: &HashSet<String>) -> String {
        loop {
            self.next_suffix += 1;
            let candidate = format!("{}~{}", base, self.next_suffix);
            if !taken.contains(&candidate) {
                return candidate;
            }
        }
    }
}
