//! Batch-scoped identifier mapping and reference rewriting.
//!
//! # Responsibility
//! - Hold the `old -> new` identifier translations produced by resolution.
//! - Rewrite every populated reference that targets a translated identifier.
//!
//! # Invariants
//! - Lookups are by exact textual identifier.
//! - References with no mapping entry are left untouched.

use crate::model::id::LogicalId;
use crate::model::walk::{find_references, Walk};
use log::debug;
use std::collections::HashMap;

/// Identifier translations for one bundle, in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMappingTable {
    pairs: Vec<(LogicalId, LogicalId)>,
    index: HashMap<LogicalId, usize>,
}

impl IdMappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a translation. A repeated `old` keeps its position and takes
    /// the latest `new`.
    pub fn insert(&mut self, old: LogicalId, new: LogicalId) {
        match self.index.get(&old) {
            Some(position) => self.pairs[*position].1 = new,
            None => {
                self.index.insert(old.clone(), self.pairs.len());
                self.pairs.push((old, new));
            }
        }
    }

    pub fn get(&self, old: &LogicalId) -> Option<&LogicalId> {
        self.index.get(old).map(|position| &self.pairs[*position].1)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LogicalId, &LogicalId)> {
        self.pairs.iter().map(|(old, new)| (old, new))
    }

    pub fn into_pairs(self) -> Vec<(LogicalId, LogicalId)> {
        self.pairs
    }
}

/// Counters for one rewrite pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub rewritten: usize,
    pub untouched: usize,
}

impl RewriteStats {
    pub fn merge(&mut self, other: RewriteStats) {
        self.rewritten += other.rewritten;
        self.untouched += other.untouched;
    }
}

/// Rewrites every populated reference under `node` found in `table`.
pub fn rewrite_references<W: Walk + ?Sized>(node: &mut W, table: &IdMappingTable) -> RewriteStats {
    let mut stats = RewriteStats::default();

    for reference in find_references(node) {
        let Some(target) = reference.target() else {
            continue;
        };

        match table.get(target) {
            Some(replacement) => {
                debug!(
                    "event=bundle_rewrite module=service status=replaced from={target} to={replacement}"
                );
                let replacement = replacement.clone();
                reference.set_target(replacement);
                stats.rewritten += 1;
            }
            None => {
                debug!("event=bundle_rewrite module=service status=outside_bundle target={target}");
                stats.untouched += 1;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::{rewrite_references, IdMappingTable};
    use crate::model::element::Element;
    use crate::model::id::LogicalId;
    use crate::model::record::Record;

    fn id(value: &str) -> LogicalId {
        LogicalId::parse(value)
    }

    #[test]
    fn mapping_keeps_first_position_and_latest_value() {
        let mut table = IdMappingTable::new();
        table.insert(id("a"), id("Patient/1"));
        table.insert(id("b"), id("Patient/2"));
        table.insert(id("a"), id("Patient/3"));

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&id("a")), Some(&id("Patient/3")));
        let olds: Vec<&str> = table.iter().map(|(old, _)| old.as_str()).collect();
        assert_eq!(olds, vec!["a", "b"]);
    }

    #[test]
    fn rewrites_only_mapped_targets() {
        let mut table = IdMappingTable::new();
        table.insert(id("Patient/temp1"), id("Patient/77"));

        let mut record = Record::new("Observation")
            .field("subject", Element::reference("Patient/temp1"))
            .field("performer", Element::List(vec![Element::reference("Practitioner/9")]));

        let stats = rewrite_references(&mut record, &table);
        assert_eq!(stats.rewritten, 1);
        assert_eq!(stats.untouched, 1);

        let subject = record.get_field("subject").and_then(Element::as_reference);
        assert_eq!(
            subject.and_then(|r| r.target()).map(LogicalId::as_str),
            Some("Patient/77")
        );
    }

    #[test]
    fn empty_table_leaves_record_identical() {
        let mut record = Record::new("Observation")
            .field("subject", Element::reference("Patient/temp1"));
        let before = record.clone();

        let stats = rewrite_references(&mut record, &IdMappingTable::new());
        assert_eq!(stats.rewritten, 0);
        assert_eq!(record, before);
    }
}
