//! Loading JSON row sets from disk

use std::io::Write;

use rowscope::data::{load_all, LoadSpec, TABLES_BINDING};
use rowscope::script::Value;

#[test]
fn test_load_all_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let users = dir.path().join("users.json");
    let orders = dir.path().join("orders.json");
    std::fs::File::create(&users)
        .unwrap()
        .write_all(br#"[{"id": 1, "name": "ann"}, {"id": 2, "name": "bob"}]"#)
        .unwrap();
    std::fs::File::create(&orders)
        .unwrap()
        .write_all(br#"[]"#)
        .unwrap();

    let specs: Vec<LoadSpec> = [
        format!("users={}", users.display()),
        format!("orders={}", orders.display()),
    ]
    .iter()
    .map(|s| s.parse().unwrap())
    .collect();

    let tables = load_all(&specs).unwrap();
    assert_eq!(tables.keys().collect::<Vec<_>>(), vec!["users", "orders"]);
    assert_eq!(tables["users"].to_string(), "[[id:1, name:'ann'], [id:2, name:'bob']]");
    assert_eq!(tables["orders"], Value::list(vec![]));
    assert_eq!(TABLES_BINDING, "db");
}

#[test]
fn test_missing_file_fails() {
    let spec: LoadSpec = "rows=/definitely/not/here.json".parse().unwrap();
    assert!(load_all(&[spec]).is_err());
}
