//! Record tree walker.
//!
//! # Responsibility
//! - Collect every populated reference field anywhere in a record tree.
//! - Hand out mutable handles so callers rewrite references in place.
//!
//! # Invariants
//! - Walking never fails; a record without references yields an empty list.
//! - Lists and composites are visited in storage order (lists by index,
//!   composites by field name), so results are deterministic.

use crate::model::element::{Element, Reference};
use crate::model::human_name::HumanName;
use crate::model::record::Record;

/// Structural node that can expose the reference fields it contains.
pub trait Walk {
    /// Appends mutable handles to every populated reference under `self`.
    fn collect_references_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Reference>);

    /// Counts populated references under `self` without borrowing mutably.
    fn count_references(&self) -> usize;
}

impl Walk for Reference {
    fn collect_references_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Reference>) {
        if self.is_populated() {
            out.push(self);
        }
    }

    fn count_references(&self) -> usize {
        usize::from(self.is_populated())
    }
}

impl Walk for HumanName {
    fn collect_references_mut<'a>(&'a mut self, _out: &mut Vec<&'a mut Reference>) {}

    fn count_references(&self) -> usize {
        0
    }
}

impl Walk for Element {
    fn collect_references_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Reference>) {
        match self {
            Self::Reference(reference) => reference.collect_references_mut(out),
            Self::HumanName(name) => name.collect_references_mut(out),
            Self::Composite(children) => {
                for child in children.values_mut() {
                    child.collect_references_mut(out);
                }
            }
            Self::List(items) => {
                for item in items.iter_mut() {
                    item.collect_references_mut(out);
                }
            }
            Self::Bool(_) | Self::Integer(_) | Self::Decimal(_) | Self::Text(_) | Self::Code(_) => {}
        }
    }

    fn count_references(&self) -> usize {
        match self {
            Self::Reference(reference) => reference.count_references(),
            Self::HumanName(name) => name.count_references(),
            Self::Composite(children) => children.values().map(Walk::count_references).sum(),
            Self::List(items) => items.iter().map(Walk::count_references).sum(),
            Self::Bool(_) | Self::Integer(_) | Self::Decimal(_) | Self::Text(_) | Self::Code(_) => 0,
        }
    }
}

impl Walk for Record {
    fn collect_references_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Reference>) {
        for element in self.fields.values_mut() {
            element.collect_references_mut(out);
        }
    }

    fn count_references(&self) -> usize {
        self.fields.values().map(Walk::count_references).sum()
    }
}

/// Returns mutable handles to every populated reference inside `node`.
pub fn find_references<W: Walk + ?Sized>(node: &mut W) -> Vec<&mut Reference> {
    let mut out = Vec::new();
    node.collect_references_mut(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::{find_references, Walk};
    use crate::model::element::{Element, Reference};
    use crate::model::human_name::HumanName;
    use crate::model::id::LogicalId;
    use crate::model::record::Record;

    #[test]
    fn record_without_references_yields_empty() {
        let mut name = HumanName::new();
        name.add_family("Doe");
        let mut record = Record::new("Patient")
            .field("name", Element::List(vec![Element::HumanName(name)]))
            .field("active", Element::Bool(true));

        assert!(find_references(&mut record).is_empty());
        assert_eq!(record.count_references(), 0);
    }

    #[test]
    fn finds_references_in_lists_and_nested_composites() {
        let mut record = Record::new("Encounter")
            .field("subject", Element::reference("Patient/1"))
            .field(
                "participant",
                Element::List(vec![
                    Element::composite([("individual", Element::reference("Practitioner/2"))]),
                    Element::composite([(
                        "detail",
                        Element::composite([("who", Element::reference("Practitioner/3"))]),
                    )]),
                ]),
            );

        let targets: Vec<String> = find_references(&mut record)
            .into_iter()
            .map(|reference| reference.target().unwrap().to_string())
            .collect();
        assert_eq!(
            targets,
            vec!["Practitioner/2", "Practitioner/3", "Patient/1"]
        );
        assert_eq!(record.count_references(), 3);
    }

    #[test]
    fn skips_unpopulated_references() {
        let mut record = Record::new("Observation")
            .field("subject", Element::Reference(Reference::default()))
            .field("performer", Element::reference(""));

        assert!(find_references(&mut record).is_empty());
    }

    #[test]
    fn handles_mutate_the_record_in_place() {
        let mut record = Record::new("Observation").field(
            "focus",
            Element::List(vec![Element::reference("Patient/temp")]),
        );

        for reference in find_references(&mut record) {
            reference.set_target(LogicalId::parse("Patient/10"));
        }

        let Some(Element::List(items)) = record.get_field("focus") else {
            panic!("focus should be a list");
        };
        let target = items[0].as_reference().and_then(Reference::target).unwrap();
        assert_eq!(target.as_str(), "Patient/10");
    }
}
