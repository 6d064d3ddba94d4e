//! SQLite-backed document store.
//!
//! All collections share one `documents` table; record bodies are stored as JSON text and
//! filtered with SQLite's JSON1 functions. Conditional writes use `WHERE version = ?`.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use super::{apply_ops, Comparison, Direction, Document, DocumentStore, Query, Record, Update};
use crate::errors::AppError;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Document store persisting to SQLite.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// A predicate value in a form SQLite can compare against `json_extract` output.
enum SqlValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

fn sql_value(value: &Value) -> Result<SqlValue, AppError> {
    match value {
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        // json_extract yields 1/0 for JSON booleans.
        Value::Bool(b) => Ok(SqlValue::Integer(*b as i64)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(SqlValue::Integer(i)),
            None => Ok(SqlValue::Real(n.as_f64().unwrap_or_default())),
        },
        _ => Err(AppError::Validation(
            "Query values must be strings, numbers or booleans".to_string(),
        )),
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', ""))
}

fn document_from_row(row: &SqliteRow) -> Result<Document, AppError> {
    let body: String = row.get("body");
    let fields = match serde_json::from_str::<Value>(&body) {
        Ok(Value::Object(map)) => map,
        _ => {
            let id: String = row.get("id");
            return Err(AppError::InvalidRecord(format!(
                "Document {} does not hold a JSON object",
                id
            )));
        }
    };
    Ok(Document {
        id: row.get("id"),
        version: row.get("version"),
        fields,
    })
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn create(&self, collection: &str, fields: Record) -> Result<String, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let body = serde_json::to_string(&fields)?;

        sqlx::query(
            "INSERT INTO documents (collection, id, version, body, created_at, updated_at) \
             VALUES (?, ?, 1, ?, ?, ?)",
        )
        .bind(collection)
        .bind(&id)
        .bind(&body)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        let row =
            sqlx::query("SELECT id, version, body FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn update(&self, collection: &str, id: &str, update: &Update) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        // Bumping the version first takes the write lock before the body is read, so
        // concurrent read-modify-writes on one document serialize instead of conflicting.
        let mut sql = String::from(
            "UPDATE documents SET version = version + 1, updated_at = ? \
             WHERE collection = ? AND id = ?",
        );
        if update.expected_version.is_some() {
            sql.push_str(" AND version = ?");
        }
        sql.push_str(" RETURNING body");

        let mut statement = sqlx::query(&sql).bind(&now).bind(collection).bind(id);
        if let Some(expected) = update.expected_version {
            statement = statement.bind(expected);
        }
        let Some(row) = statement.fetch_optional(&mut *tx).await? else {
            tx.rollback().await?;
            return match self.get(collection, id).await? {
                Some(current) => Err(AppError::Conflict {
                    message: format!(
                        "Version mismatch: expected {}, current {}",
                        update.expected_version.unwrap_or_default(),
                        current.version
                    ),
                    current_version: current.version,
                }),
                None => Err(AppError::NotFound(format!(
                    "Document {}/{} not found",
                    collection, id
                ))),
            };
        };

        let body: String = row.get("body");
        let mut fields = match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(map)) => map,
            _ => {
                return Err(AppError::InvalidRecord(format!(
                    "Document {} does not hold a JSON object",
                    id
                )))
            }
        };
        // A failing op drops the transaction, which rolls the version bump back.
        apply_ops(&mut fields, &update.ops)?;

        sqlx::query("UPDATE documents SET body = ? WHERE collection = ? AND id = ?")
            .bind(serde_json::to_string(&fields)?)
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, AppError> {
        let mut sql = String::from("SELECT id, version, body FROM documents WHERE collection = ?");
        let mut binds: Vec<SqlValue> = vec![SqlValue::Text(collection.to_string())];

        for predicate in &query.predicates {
            match predicate.op {
                Comparison::Eq => {
                    sql.push_str(" AND json_extract(body, ?) = ?");
                }
                Comparison::ArrayContains => {
                    sql.push_str(
                        " AND EXISTS (SELECT 1 FROM json_each(body, ?) AS item \
                         WHERE item.value = ?)",
                    );
                }
            }
            binds.push(SqlValue::Text(json_path(&predicate.field)));
            binds.push(sql_value(&predicate.value)?);
        }

        if let Some(order) = &query.order_by {
            let direction = match order.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            sql.push_str(&format!(" ORDER BY json_extract(body, ?) {}", direction));
            binds.push(SqlValue::Text(json_path(&order.field)));
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            binds.push(SqlValue::Integer(limit as i64));
        }

        let mut statement = sqlx::query(&sql);
        for value in binds {
            statement = match value {
                SqlValue::Text(s) => statement.bind(s),
                SqlValue::Integer(i) => statement.bind(i),
                SqlValue::Real(r) => statement.bind(r),
            };
        }

        let rows = statement.fetch_all(&self.pool).await?;
        rows.iter().map(document_from_row).collect()
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn store() -> (SqliteDocumentStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .expect("Failed to init DB");
        (SqliteDocumentStore::new(pool), temp_dir)
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (store, _dir) = store().await;
        let id = store
            .create("ideas", record(json!({ "title": "HealthSync", "maxTeamSize": 4 })))
            .await
            .unwrap();

        let doc = store.get("ideas", &id).await.unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.version, 1);
        assert_eq!(doc.fields["maxTeamSize"], 4);

        // Collections are separate namespaces.
        assert!(store.get("joinRequests", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_ops_and_versioning() {
        let (store, _dir) = store().await;
        let id = store
            .create(
                "ideas",
                record(json!({ "teamMembers": ["owner"], "interestedCount": 0 })),
            )
            .await
            .unwrap();

        store
            .update(
                "ideas",
                &id,
                &Update::new()
                    .increment("interestedCount", 1)
                    .array_union("teamMembers", vec![json!("a"), json!("owner")]),
            )
            .await
            .unwrap();
        store
            .update(
                "ideas",
                &id,
                &Update::new().array_remove("teamMembers", vec![json!("owner")]).if_version(2),
            )
            .await
            .unwrap();

        let doc = store.get("ideas", &id).await.unwrap().unwrap();
        assert_eq!(doc.version, 3);
        assert_eq!(doc.fields["interestedCount"], 1);
        assert_eq!(doc.fields["teamMembers"], json!(["a"]));

        let err = store
            .update("ideas", &id, &Update::new().set("title", "x").if_version(2))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { current_version: 3, .. }));

        let err = store
            .update("ideas", "missing", &Update::new().set("title", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_unconditional_updates_all_land() {
        let (store, _dir) = store().await;
        let id = store
            .create(
                "ideas",
                record(json!({ "teamMembers": ["owner"], "interestedCount": 0 })),
            )
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(
                        "ideas",
                        &id,
                        &Update::new()
                            .increment("interestedCount", 1)
                            .array_union("teamMembers", vec![json!(format!("m{}", i))]),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let doc = store.get("ideas", &id).await.unwrap().unwrap();
        assert_eq!(doc.fields["interestedCount"], 20);
        assert_eq!(doc.fields["teamMembers"].as_array().unwrap().len(), 21);
        assert_eq!(doc.version, 21);
    }

    #[tokio::test]
    async fn test_failed_op_leaves_document_untouched() {
        let (store, _dir) = store().await;
        let id = store
            .create("ideas", record(json!({ "interestedCount": "many" })))
            .await
            .unwrap();

        let err = store
            .update("ideas", &id, &Update::new().increment("interestedCount", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let doc = store.get("ideas", &id).await.unwrap().unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.fields["interestedCount"], "many");
    }

    #[tokio::test]
    async fn test_query_predicates_and_ordering() {
        let (store, _dir) = store().await;
        let rows = [
            ("r1", "idea-1", "alice", "pending", "2026-03-01T10:00:00.000000Z"),
            ("r2", "idea-1", "bob", "rejected", "2026-03-01T11:00:00.000000Z"),
            ("r3", "idea-1", "alice", "rejected", "2026-02-01T09:00:00.000000Z"),
            ("r4", "idea-2", "alice", "pending", "2026-03-02T09:00:00.000000Z"),
        ];
        for (tag, idea, requester, status, created) in rows {
            store
                .create(
                    "joinRequests",
                    record(json!({
                        "tag": tag,
                        "ideaId": idea,
                        "requesterId": requester,
                        "status": status,
                        "createdAt": created,
                    })),
                )
                .await
                .unwrap();
        }

        let results = store
            .query(
                "joinRequests",
                &Query::new()
                    .eq("ideaId", "idea-1")
                    .eq("requesterId", "alice")
                    .order_by("createdAt", Direction::Desc),
            )
            .await
            .unwrap();
        let tags: Vec<_> = results.iter().map(|d| d.fields["tag"].clone()).collect();
        assert_eq!(tags, vec![json!("r1"), json!("r3")]);

        let latest = store
            .query(
                "joinRequests",
                &Query::new()
                    .eq("status", "pending")
                    .order_by("createdAt", Direction::Desc)
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].fields["tag"], "r4");
    }

    #[tokio::test]
    async fn test_query_array_contains_and_scalars() {
        let (store, _dir) = store().await;
        store
            .create(
                "ideas",
                record(json!({
                    "title": "a",
                    "skills": ["AI", "Frontend"],
                    "maxTeamSize": 4,
                    "open": true,
                })),
            )
            .await
            .unwrap();
        store
            .create(
                "ideas",
                record(json!({
                    "title": "b",
                    "skills": ["Hardware"],
                    "maxTeamSize": 3,
                    "open": false,
                })),
            )
            .await
            .unwrap();

        let ai = store
            .query("ideas", &Query::new().array_contains("skills", "AI"))
            .await
            .unwrap();
        assert_eq!(ai.len(), 1);
        assert_eq!(ai[0].fields["title"], "a");

        let sized = store
            .query("ideas", &Query::new().eq("maxTeamSize", 3))
            .await
            .unwrap();
        assert_eq!(sized[0].fields["title"], "b");

        let open = store
            .query("ideas", &Query::new().eq("open", true))
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].fields["title"], "a");

        let err = store
            .query("ideas", &Query::new().eq("skills", json!(["AI"])))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
