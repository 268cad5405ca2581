//! Integration tests for `CatalogStore`: round-trip, the empty marker, and
//! atomic replacement.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use shelfsync_core::ProductRecord;
use shelfsync_store::{CatalogStore, StoreError};

fn record(title: &str, base_cents: i64) -> ProductRecord {
    let base = Decimal::new(base_cents, 2);
    ProductRecord {
        title: title.to_owned(),
        description: format!("{title}, \"quoted\", with commas\nand a newline"),
        base_price: base,
        resale_price: base + Decimal::new(500, 2),
        currency: "USD".to_owned(),
        image_reference: Some(format!("{}.jpg", title.to_lowercase())),
        source_image_url: Some(format!("https://cdn.example.com/{title}.jpg")),
        captured_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
    }
}

#[test]
fn replace_then_load_round_trips_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let store = CatalogStore::new(dir.path().join("products.csv"));
    let records = vec![
        record("Moto G24", 11_000),
        record("Redmi 13", 12_050),
        ProductRecord {
            image_reference: None,
            source_image_url: None,
            description: String::new(),
            ..record("Cable", 0)
        },
    ];

    store.replace(&records).unwrap();
    let loaded = store.load().unwrap().expect("catalog stored");

    assert_eq!(loaded.len(), records.len());
    assert_eq!(loaded, records);
}

#[test]
fn header_row_is_always_written() {
    let dir = tempfile::tempdir().unwrap();
    let store = CatalogStore::new(dir.path().join("products.csv"));

    store.replace(&[record("Phone", 100)]).unwrap();
    let text = std::fs::read_to_string(store.path()).unwrap();
    let first_line = text.lines().next().unwrap();
    assert_eq!(
        first_line,
        "title,description,price_base,price_reseller,price_currency,image_file,image_url,scraped_at"
    );
    assert!(text.contains(",1.00,6.00,USD,"), "{text}");
    assert!(text.contains("2024-03-01T12:30:00Z"), "{text}");
}

#[test]
fn empty_catalog_is_distinguishable_from_never_stored() {
    let dir = tempfile::tempdir().unwrap();
    let store = CatalogStore::new(dir.path().join("nested").join("products.csv"));

    assert_eq!(store.load().unwrap(), None);

    store.replace(&[]).unwrap();
    assert_eq!(store.load().unwrap(), Some(vec![]));
    let text = std::fs::read_to_string(store.path()).unwrap();
    assert_eq!(text.lines().count(), 1, "header only: {text:?}");
}

#[test]
fn replace_swaps_the_whole_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = CatalogStore::new(dir.path().join("products.csv"));

    store
        .replace(&[record("Old A", 100), record("Old B", 200)])
        .unwrap();
    store.replace(&[record("New", 300)]).unwrap();

    let titles: Vec<String> = store
        .load()
        .unwrap()
        .unwrap()
        .into_iter()
        .map(|r| r.title)
        .collect();
    assert_eq!(titles, ["New"]);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1, "temp files left behind: {leftovers:?}");
}

#[test]
fn replace_over_a_directory_fails_and_keeps_it() {
    let dir = tempfile::tempdir().unwrap();
    let store = CatalogStore::new(dir.path().join("products.csv"));
    std::fs::create_dir(store.path()).unwrap();
    std::fs::write(store.path().join("keep"), b"x").unwrap();

    let err = store.replace(&[record("New", 200)]).unwrap_err();

    assert!(matches!(err, StoreError::Persist { .. }), "{err:?}");
    assert_eq!(std::fs::read(store.path().join("keep")).unwrap(), b"x");
    let entries = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(entries, 1, "temp file must be removed");
}

#[test]
fn load_rejects_foreign_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("products.csv");
    std::fs::write(&path, "name,price\nPhone,1\n").unwrap();

    let err = CatalogStore::new(path).load().unwrap_err();
    assert!(matches!(err, StoreError::Parse { line: 1, .. }), "{err:?}");
}
