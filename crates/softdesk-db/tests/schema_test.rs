//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    let applied = softdesk_db::run_migrations(&db).await.unwrap();
    assert_eq!(applied, 2);

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in ["tenant", "user", "project", "issue", "comment"] {
        assert!(info_str.contains(table), "missing {table} table");
    }
    assert!(
        info_str.contains("contributes_to"),
        "missing contributes_to edge"
    );
    assert!(info_str.contains("_migration"), "missing _migration table");
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    softdesk_db::run_migrations(&db).await.unwrap();
    let second = softdesk_db::run_migrations(&db).await.unwrap();
    assert_eq!(second, 0);

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 2, "expected one record per migration");
}

#[tokio::test]
async fn unique_index_prevents_duplicate_domains() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    softdesk_db::run_migrations(&db).await.unwrap();

    db.query("CREATE tenant SET name = 'Acme', domain = 'acme.com'")
        .await
        .unwrap()
        .check()
        .unwrap();

    let result = db
        .query("CREATE tenant SET name = 'Acme 2', domain = 'acme.com'")
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "duplicate domain should be rejected");
}

#[tokio::test]
async fn project_type_is_restricted_to_known_values() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    softdesk_db::run_migrations(&db).await.unwrap();

    let result = db
        .query(
            "CREATE project SET tenant_id = 't', name = 'X', \
             kind = 'Desktop', author_id = 'a'",
        )
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "unknown project type should be rejected");
}
