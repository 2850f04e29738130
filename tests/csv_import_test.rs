// ==========================================
// CSV 端到端导入测试
// ==========================================
// 测试目标: 文件 → open_source → ConfigManager 覆写 → TableImporter
// ==========================================


use rusqlite::Connection;
use sheet_importer::config::config_keys;
use sheet_importer::domain::{ForeignKeyLookup, MappingSpecification, SourceRegion};
use sheet_importer::importer::ErrorKind;
use sheet_importer::{
    open_source, ConfigManager, ImportError, SqliteTableGateway, TableImporter,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use test_helpers::{count_rows, create_test_db, insert_config};

fn write_csv(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

/// 按 默认值 → config_kv 覆写 组装导入器
fn importer_with_overrides(db_path: &str) -> TableImporter<SqliteTableGateway> {
    let gateway = SqliteTableGateway::new(db_path).unwrap();
    let config = {
        let conn = gateway.connection();
        let guard = conn.lock().unwrap();
        ConfigManager::new()
            .with_connection_overrides(&guard)
            .unwrap()
    };
    TableImporter::new(gateway, &config)
}

fn clients_spec(sheet: &str) -> MappingSpecification {
    MappingSpecification::builder("clients", SourceRegion::new(sheet, 1))
        .map("Name", "name")
        .map("Email", "email")
        .fk_lookup(ForeignKeyLookup::new(
            "country_id",
            "Country",
            "countries",
            "id",
            "name",
        ))
        .primary_key("id", true)
        .dedup_on("email")
        .build()
        .unwrap()
}

#[test]
fn test_csv_import_end_to_end() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "clients.csv",
        "Name,Email,Country\nAna,a@x.com,Brazil\nAna,a@x.com,Brazil\nBea,b@x.com, chile\n",
    );

    let importer = importer_with_overrides(&db_path);
    let mut source = open_source(&path).unwrap();
    assert_eq!(source.sheet_names(), vec!["clients".to_string()]);

    let outcome = importer
        .execute(source.as_mut(), &clients_spec("clients"))
        .unwrap();

    assert_eq!(outcome.affected, 2);
    assert_eq!(outcome.report.duplicates_removed, 1);

    let conn = Connection::open(&db_path).unwrap();
    let bea_country: i64 = conn
        .query_row(
            "SELECT country_id FROM clients WHERE email = 'b@x.com'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(bea_country, 2);
}

#[test]
fn test_config_kv_override_bounds_digest() {
    let (_tmp, db_path) = create_test_db().unwrap();
    insert_config(&db_path, config_keys::DIAGNOSTIC_LIMIT, "1").unwrap();
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "clients.csv",
        "Name,Email,Country\nAna,a@x.com,Peru\nBea,b@x.com,Mars\nCia,c@x.com,Oz\n",
    );

    let importer = importer_with_overrides(&db_path);
    assert_eq!(importer.settings().diagnostic_limit, 1);

    let mut source = open_source(&path).unwrap();
    let err = importer
        .execute(source.as_mut(), &clients_spec("clients"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    match err {
        ImportError::UnresolvedReference {
            diagnostics,
            digest,
        } => {
            assert_eq!(diagnostics.len(), 3);
            assert_eq!(digest.len(), 2);
            assert!(digest[0].starts_with("第 2 行"));
            assert_eq!(digest[1], "...还有 2 处");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(count_rows(&db_path, "clients").unwrap(), 0);
}

#[test]
fn test_unsupported_extension_and_missing_file() {
    let dir = TempDir::new().unwrap();
    let txt = write_csv(&dir, "clients.txt", "Name\nAna\n");

    let err = open_source(&txt).err().unwrap();
    assert!(matches!(err, ImportError::UnsupportedFormat(ref ext) if ext == "txt"));
    assert_eq!(err.kind(), ErrorKind::SourceRead);

    let err = open_source(dir.path().join("absent.csv")).err().unwrap();
    assert!(matches!(err, ImportError::FileNotFound(_)));
}
