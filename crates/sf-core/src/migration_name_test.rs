use super::*;

#[test]
fn test_parse_plain_version() {
    let parsed = MigrationFileName::parse("1.sql").unwrap();
    assert_eq!(parsed.version, 1);
    assert_eq!(parsed.description, "");
    assert!(!parsed.disable_transaction);
}

#[test]
fn test_parse_with_description() {
    let parsed = MigrationFileName::parse("0042_create_fruit_table.sql").unwrap();
    assert_eq!(parsed.version, 42);
    assert_eq!(parsed.description, "create_fruit_table");
    assert!(!parsed.disable_transaction);
}

#[test]
fn test_parse_disable_transaction_marker() {
    let parsed = MigrationFileName::parse("3_build_index.disable-transaction.sql").unwrap();
    assert_eq!(parsed.version, 3);
    assert!(parsed.disable_transaction);

    let upper = MigrationFileName::parse("4-Disable-Transaction.SQL").unwrap();
    assert_eq!(upper.version, 4);
    assert!(upper.disable_transaction);
}

#[test]
fn test_marker_must_end_the_name() {
    let parsed = MigrationFileName::parse("0005_disable-transaction_flag_cleanup.sql").unwrap();
    assert_eq!(parsed.version, 5);
    assert_eq!(parsed.description, "disable-transaction_flag_cleanup");
    assert!(!parsed.disable_transaction);
}

#[test]
fn test_parse_rejects_missing_version() {
    let err = MigrationFileName::parse("create_table.sql").unwrap_err();
    assert!(err.to_string().contains("[E005]"));
}

#[test]
fn test_parse_rejects_wrong_extension() {
    assert!(MigrationFileName::parse("1_init.txt").is_err());
}

#[test]
fn test_parse_rejects_overflowing_version() {
    assert!(MigrationFileName::parse("99999999999999999999999_big.sql").is_err());
}

#[test]
fn test_is_sql_file() {
    assert!(MigrationFileName::is_sql_file("1_init.sql"));
    assert!(MigrationFileName::is_sql_file("1_init.SQL"));
    assert!(!MigrationFileName::is_sql_file("README.md"));
    assert!(!MigrationFileName::is_sql_file(".sql"));
}
