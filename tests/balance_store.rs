#![allow(non_snake_case)]

use mk_slots::{
    FileStore,
    KeyValueStore,
    Ledger,
    balance::{
        BALANCE_KEY,
        DEFAULT_BALANCE,
    },
};
use tempdir::TempDir;

fn ledger_at(dir: &TempDir) -> Ledger<FileStore> {
    let store = FileStore::open(dir.path().join("state").join("storage.json")).unwrap();
    Ledger::load(store, BALANCE_KEY, DEFAULT_BALANCE)
}

#[test]
fn file_store__open__creates_empty_object() {
    // given
    let dir = TempDir::new("mk-slots").unwrap();
    let path = dir.path().join("nested").join("storage.json");

    // when
    let store = FileStore::open(&path).unwrap();

    // then
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    assert_eq!(store.path(), path.as_path());
    assert_eq!(store.get(BALANCE_KEY).unwrap(), None);
}

#[test]
fn ledger__fresh_store__starts_at_default() {
    let dir = TempDir::new("mk-slots").unwrap();

    let ledger = ledger_at(&dir);

    assert_eq!(ledger.balance(), 100.0);
}

#[test]
fn ledger__balance_survives_restart() {
    // given
    let dir = TempDir::new("mk-slots").unwrap();
    let mut ledger = ledger_at(&dir);

    // when
    ledger.debit(10.0);
    ledger.credit(150.0);
    drop(ledger);
    let reopened = ledger_at(&dir);

    // then
    assert_eq!(reopened.balance(), 240.0);
    assert_eq!(
        reopened.store().get(BALANCE_KEY).unwrap().as_deref(),
        Some("240")
    );
}

#[test]
fn ledger__unusable_stored_values__fall_back_to_default() {
    let dir = TempDir::new("mk-slots").unwrap();

    for raw in ["abc", "-5", "NaN", "inf", "   "] {
        let mut store = FileStore::open(dir.path().join("state").join("storage.json")).unwrap();
        store.set(BALANCE_KEY, raw).unwrap();

        let ledger = ledger_at(&dir);

        assert_eq!(ledger.balance(), DEFAULT_BALANCE, "stored {raw:?}");
    }
}

#[test]
fn ledger__fractional_stored_value__is_kept() {
    let dir = TempDir::new("mk-slots").unwrap();
    let mut store = FileStore::open(dir.path().join("state").join("storage.json")).unwrap();
    store.set(BALANCE_KEY, "12.5").unwrap();

    let ledger = ledger_at(&dir);

    assert_eq!(ledger.balance(), 12.5);
}

#[test]
fn file_store__set__keeps_unrelated_keys() {
    let dir = TempDir::new("mk-slots").unwrap();
    let path = dir.path().join("storage.json");
    std::fs::write(&path, r#"{ "theme": "dark" }"#).unwrap();
    let mut store = FileStore::open(&path).unwrap();

    store.set(BALANCE_KEY, "55").unwrap();

    assert_eq!(store.get("theme").unwrap().as_deref(), Some("dark"));
    assert_eq!(store.get(BALANCE_KEY).unwrap().as_deref(), Some("55"));
}

#[test]
fn ledger__corrupt_file__is_repaired_by_the_next_mutation() {
    // given
    let dir = TempDir::new("mk-slots").unwrap();
    let path = dir.path().join("storage.json");
    std::fs::write(&path, "not json").unwrap();
    let store = FileStore::open(&path).unwrap();

    // when
    let mut ledger = Ledger::load(store, BALANCE_KEY, DEFAULT_BALANCE);
    ledger.debit(30.0);

    // then
    assert_eq!(ledger.balance(), 70.0);
    assert_eq!(
        ledger.store().get(BALANCE_KEY).unwrap().as_deref(),
        Some("70")
    );
    drop(ledger);
    let reopened = Ledger::load(FileStore::open(&path).unwrap(), BALANCE_KEY, DEFAULT_BALANCE);
    assert_eq!(reopened.balance(), 70.0);
}

#[test]
fn ledger__corrupt_file__winnings_survive_restart() {
    let dir = TempDir::new("mk-slots").unwrap();
    let path = dir.path().join("storage.json");
    std::fs::write(&path, "not json").unwrap();
    let mut ledger = Ledger::load(FileStore::open(&path).unwrap(), BALANCE_KEY, DEFAULT_BALANCE);

    ledger.debit(10.0);
    ledger.credit(150.0);
    drop(ledger);
    let reopened = Ledger::load(FileStore::open(&path).unwrap(), BALANCE_KEY, DEFAULT_BALANCE);

    assert_eq!(reopened.balance(), 240.0);
}
