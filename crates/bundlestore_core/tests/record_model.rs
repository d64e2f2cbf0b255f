use bundlestore_core::model::element::{Element, Reference};
use bundlestore_core::model::human_name::{HumanName, NameUse};
use bundlestore_core::model::id::LogicalId;
use bundlestore_core::model::record::{Record, Tag};
use bundlestore_core::model::walk::{find_references, Walk};

fn observation() -> Record {
    let mut name = HumanName::new();
    name.add_family("Chalmers").add_given("Peter");
    name.name_use = Some(NameUse::Official);

    Record::with_id("Observation", "urn:uuid:obs-1")
        .field("status", Element::Code("final".to_string()))
        .field("subject", Element::reference("Patient/temp1"))
        .field(
            "performer",
            Element::List(vec![
                Element::reference("Practitioner/9"),
                Element::Reference(Reference::default()),
            ]),
        )
        .field(
            "component",
            Element::composite([
                ("code", Element::text("8480-6")),
                ("device", Element::reference("Device/temp2")),
                ("recorder", Element::HumanName(name)),
            ]),
        )
}

#[test]
fn record_json_round_trips_through_bundle_shape() {
    let mut record = observation();
    record.add_tag(Tag::new("http://example.org/tags", "lab").with_label("Lab"));

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["resourceType"], "Observation");
    assert_eq!(json["id"], "urn:uuid:obs-1");
    assert_eq!(json["meta"]["tags"][0]["term"], "lab");
    assert_eq!(
        json["fields"]["component"]["value"]["recorder"]["value"]["use"],
        "official"
    );

    let back: Record = serde_json::from_value(json).unwrap();
    assert_eq!(back, record);
}

#[test]
fn record_parses_from_client_json() {
    let raw = r#"{
        "resourceType": "Observation",
        "fields": {
            "subject": { "kind": "reference", "value": { "reference": "Patient/5", "display": "Peter" } }
        }
    }"#;

    let record: Record = serde_json::from_str(raw).unwrap();
    assert!(record.logical_id().is_none());
    assert!(record.meta.tags.is_empty());

    let subject = record
        .get_field("subject")
        .and_then(Element::as_reference)
        .unwrap();
    assert_eq!(subject.target(), Some(&LogicalId::parse("Patient/5")));
    assert_eq!(subject.display.as_deref(), Some("Peter"));
}

#[test]
fn walker_finds_nested_populated_references_only() {
    let mut record = observation();
    assert_eq!(record.count_references(), 3);

    let targets: Vec<String> = find_references(&mut record)
        .into_iter()
        .filter_map(|reference| reference.target().map(|id| id.as_str().to_string()))
        .collect();

    assert_eq!(
        targets,
        vec![
            "Device/temp2".to_string(),
            "Practitioner/9".to_string(),
            "Patient/temp1".to_string(),
        ]
    );
}

#[test]
fn walker_handles_are_writable_in_place() {
    let mut record = observation();

    for reference in find_references(&mut record) {
        let rewritten = LogicalId::parse(format!("{}-x", reference.target().unwrap()));
        reference.set_target(rewritten);
    }

    let device = record
        .get_field("component")
        .and_then(|component| component.child("device"))
        .and_then(Element::as_reference)
        .unwrap();
    assert_eq!(device.target().map(LogicalId::as_str), Some("Device/temp2-x"));
}

#[test]
fn record_without_references_yields_empty_walk() {
    let mut record = Record::new("Patient")
        .field("active", Element::Bool(true))
        .field("multipleBirth", Element::Integer(2));

    assert!(find_references(&mut record).is_empty());
}
