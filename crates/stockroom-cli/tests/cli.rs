//! End-to-end command runs against a temporary data directory.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use clap::Parser;
use pretty_assertions::assert_eq;
use serde_json::Value;
use stockroom_cli::{Cli, run};
use tempfile::TempDir;

fn exec(dir: &TempDir, args: &[&str]) -> anyhow::Result<String> {
    let data_dir = dir.path().to_str().expect("utf-8 temp path");
    let argv = ["stockroom", "--data-dir", data_dir]
        .into_iter()
        .chain(args.iter().copied());
    let cli = Cli::try_parse_from(argv).expect("arguments parse");

    let mut out = Vec::new();
    run(&cli, &mut out)?;
    Ok(String::from_utf8(out).expect("utf-8 output"))
}

fn json(dir: &TempDir, args: &[&str]) -> Value {
    serde_json::from_str(&exec(dir, args).unwrap()).expect("json output")
}

fn add_product(dir: &TempDir, name: &str, category: &str, price: &str) -> Value {
    json(
        dir,
        &[
            "products", "add", "--name", name, "--category", category, "--price", price,
        ],
    )
}

#[test]
fn products_add_get_update_delete() {
    let dir = TempDir::new().expect("tempdir");

    let added = add_product(&dir, "Standing Desk", "Furniture", "450");
    assert_eq!(added["id"], 0);
    assert_eq!(added["currency"], "USD");

    let fetched = json(&dir, &["products", "get", "0"]);
    assert_eq!(fetched["name"], "Standing Desk");

    let updated = json(&dir, &["products", "update", "0", "--price", "399.5"]);
    assert_eq!(updated["price"], 399.5);
    assert_eq!(updated["name"], "Standing Desk");

    exec(&dir, &["products", "delete", "0"]).unwrap();
    assert!(exec(&dir, &["products", "get", "0"]).is_err());
    assert!(exec(&dir, &["products", "delete", "0"]).is_err());
}

#[test]
fn products_add_rejects_invalid_fields() {
    let dir = TempDir::new().expect("tempdir");

    let blank = exec(
        &dir,
        &["products", "add", "--name", "", "--category", "Books", "--price", "5"],
    );
    assert!(blank.is_err());
    let negative = exec(
        &dir,
        &["products", "add", "--name", "Lamp", "--category", "Home", "--price=-5"],
    );
    assert!(negative.is_err());
    assert!(!dir.path().join("products.db").exists());

    add_product(&dir, "Lamp", "Home", "30");
    assert!(exec(&dir, &["products", "update", "0", "--currency", " "]).is_err());
    assert_eq!(json(&dir, &["products", "get", "0"])["currency"], "USD");
}

#[test]
fn products_category_and_search() {
    let dir = TempDir::new().expect("tempdir");
    add_product(&dir, "Laptop Pro 15", "Electronics", "1200");
    add_product(&dir, "Wireless Mouse", "Electronics", "25.5");
    add_product(&dir, "Clean Code", "Books", "38");

    let electronics = json(&dir, &["products", "category", "Electronics"]);
    assert_eq!(electronics.as_array().map(Vec::len), Some(2));

    let found = json(&dir, &["products", "search", "clean"]);
    assert_eq!(found[0]["name"], "Clean Code");

    let all = json(&dir, &["products", "list"]);
    assert_eq!(all.as_array().map(Vec::len), Some(3));
}

#[test]
fn users_lifecycle() {
    let dir = TempDir::new().expect("tempdir");

    let created = json(&dir, &["users", "add", "alice", "--password-hash", "-42"]);
    assert_eq!(created["password_hash"], -42);
    assert!(exec(&dir, &["users", "add", "alice", "--password-hash", "7"]).is_err());

    exec(&dir, &["users", "set-password", "alice", "--password-hash", "7"]).unwrap();
    assert_eq!(json(&dir, &["users", "get", "alice"])["password_hash"], 7);

    exec(&dir, &["users", "delete", "alice"]).unwrap();
    assert!(exec(&dir, &["users", "get", "alice"]).is_err());
    assert!(exec(&dir, &["users", "set-password", "alice", "--password-hash", "1"]).is_err());
}

#[test]
fn inspect_reports_slot_states() {
    let dir = TempDir::new().expect("tempdir");
    add_product(&dir, "Lamp", "Furniture", "30");
    add_product(&dir, "Chair", "Furniture", "80");
    exec(&dir, &["products", "delete", "0"]).unwrap();

    let file = dir.path().join("products.db");
    let file = file.to_str().expect("utf-8 temp path");
    let report = json(&dir, &["inspect", file, "--slots", "--json"]);

    assert_eq!(report["capacity"], 16);
    assert_eq!(report["slot_size"], 117);
    assert_eq!(report["entry_count"], 1);
    assert_eq!(report["serial_count"], 2);
    assert_eq!(report["full"], 1);
    assert_eq!(report["tombstones"], 1);
    assert_eq!(report["empty"], 14);

    let slots = report["slots"].as_array().expect("slot dump");
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0]["index"], 0);
    assert_eq!(slots[0]["state"], "tombstone");
    assert_eq!(slots[1]["state"], "full");
    assert!(slots[1]["hex"].as_str().unwrap().starts_with("0101000000"));

    let text = exec(&dir, &["inspect", file]).unwrap();
    assert!(text.contains("Capacity:     16"));
    assert!(text.contains("1 full, 1 tombstone, 14 empty"));
}

#[test]
fn inspect_rejects_wrong_layout_without_touching_file() {
    let dir = TempDir::new().expect("tempdir");
    add_product(&dir, "Lamp", "Furniture", "30");

    let path = dir.path().join("products.db");
    let before = std::fs::read(&path).unwrap();

    let file = path.to_str().expect("utf-8 temp path");
    assert!(exec(&dir, &["inspect", file, "--kind", "users"]).is_err());
    assert_eq!(std::fs::read(&path).unwrap(), before);

    let missing = dir.path().join("missing.db");
    assert!(exec(&dir, &["inspect", missing.to_str().unwrap()]).is_err());
    assert!(!missing.exists());
}
