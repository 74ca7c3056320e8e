//! FILENAME: tests/test_json_store.rs
//! File-backed report store against a temporary directory.

use persistence::{JsonFileStore, PersistenceError, ReportDefinition, ReportStore};
use pivot_engine::{
    AggregationType, Collection, FilterSpec, Granularity, PivotAxisField, PivotConfig,
    Relationship, ValueField,
};

fn full_report() -> ReportDefinition {
    let config = PivotConfig {
        filters: vec![FilterSpec::new("date", ["Apr-24"]).with_date_grouping(Granularity::Month)],
        rows: vec![PivotAxisField::new("customers.parent", "Customer › Parent")],
        columns: vec![PivotAxisField::new("date", "Date").with_date_grouping(Granularity::Quarter)],
        values: vec![ValueField::new("allinventoryentries.amount", AggregationType::Sum)],
    };

    let mut report = ReportDefinition::new("Sales by group");
    report.fields = vec!["date".into(), "partyledgername".into(), "amount".into()];
    report.filters = vec![FilterSpec::new("vouchertypename", ["Sales"])];
    report.relationships = vec![Relationship::new("partyledgernameid", Collection::Customers, "masterid")];
    report.save_pivot("Quarterly", config.clone());
    report.pivot_config = Some(config);
    report.is_pivot_mode = true;
    report
}

#[test]
fn test_save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path()).unwrap();
    let report = full_report();

    store.save("sales-2024", &report).unwrap();
    let loaded = store.load("sales-2024").unwrap();
    assert_eq!(loaded, report);

    // the stored document is stable across a second save
    let first = std::fs::read_to_string(dir.path().join("sales-2024.json")).unwrap();
    store.save("sales-2024", &loaded).unwrap();
    let second = std::fs::read_to_string(dir.path().join("sales-2024.json")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_list_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("reports")).unwrap();

    store.save("b", &ReportDefinition::new("B")).unwrap();
    store.save("a", &ReportDefinition::new("A")).unwrap();
    std::fs::write(dir.path().join("reports").join("notes.txt"), "ignored").unwrap();
    assert_eq!(store.list_ids().unwrap(), vec!["a".to_string(), "b".to_string()]);

    store.delete("a").unwrap();
    assert_eq!(store.list_ids().unwrap(), vec!["b".to_string()]);
    assert!(matches!(store.delete("a"), Err(PersistenceError::NotFound(_))));
    assert!(matches!(store.load("a"), Err(PersistenceError::NotFound(_))));
}

#[test]
fn test_rejects_unsafe_ids_and_bad_json() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path()).unwrap();

    assert!(matches!(
        store.save("../escape", &ReportDefinition::new("x")),
        Err(PersistenceError::InvalidId(_))
    ));

    std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
    assert!(matches!(store.load("broken"), Err(PersistenceError::Json(_))));
}
