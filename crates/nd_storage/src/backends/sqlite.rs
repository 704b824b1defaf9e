use async_trait::async_trait;
use nd_core::{DigestRun, Error, Frequency, Preference, PreferenceStore, Result, RunId, RunStore};
use sqlx::{sqlite::SqlitePool, Row};
use std::path::{Path, PathBuf};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS digest_runs (
        id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        record TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS preferences (
        principal TEXT PRIMARY KEY,
        frequency TEXT NOT NULL,
        record TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS preferences_frequency ON preferences (frequency)",
];

fn storage_error(context: &str, e: sqlx::Error) -> Error {
    Error::Storage(format!("{}: {}", context, e))
}

/// Run records and preferences stored as JSON documents in SQLite.
pub struct SqliteStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteStore {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = SqlitePool::connect(&format!("sqlite://{}?mode=rwc", db_path.display()))
            .await
            .map_err(|e| storage_error("failed to open database", e))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| storage_error(&format!("failed to run migration {}", i), e))?;
        }

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[async_trait]
impl RunStore for SqliteStore {
    async fn insert_run(&self, run: &DigestRun) -> Result<()> {
        let record = serde_json::to_string(run)?;
        sqlx::query(
            "INSERT INTO digest_runs (id, status, record, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(run.id.to_string())
        .bind(run.status.to_string())
        .bind(record)
        .bind(run.created_at.to_rfc3339())
        .bind(run.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("failed to insert run", e))?;
        Ok(())
    }

    async fn save_run(&self, run: &DigestRun) -> Result<()> {
        let record = serde_json::to_string(run)?;
        let result = sqlx::query("UPDATE digest_runs SET status = ?, record = ?, updated_at = ? WHERE id = ?")
            .bind(run.status.to_string())
            .bind(record)
            .bind(run.updated_at.to_rfc3339())
            .bind(run.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("failed to save run", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::RunNotFound(run.id));
        }
        Ok(())
    }

    async fn load_run(&self, id: RunId) -> Result<Option<DigestRun>> {
        let row = sqlx::query("SELECT record FROM digest_runs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("failed to load run", e))?;
        match row {
            Some(row) => {
                let record: String = row.get("record");
                Ok(Some(serde_json::from_str(&record)?))
            }
            None => Ok(None),
        }
    }

    async fn list_runs(&self) -> Result<Vec<DigestRun>> {
        let rows = sqlx::query("SELECT record FROM digest_runs ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("failed to list runs", e))?;
        rows.iter()
            .map(|row| {
                let record: String = row.get("record");
                serde_json::from_str(&record).map_err(Error::from)
            })
            .collect()
    }
}

#[async_trait]
impl PreferenceStore for SqliteStore {
    async fn save_preference(&self, preference: &Preference) -> Result<()> {
        let record = serde_json::to_string(preference)?;
        sqlx::query(
            "INSERT OR REPLACE INTO preferences (principal, frequency, record, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&preference.principal)
        .bind(preference.frequency.as_str())
        .bind(record)
        .bind(preference.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("failed to save preference", e))?;
        Ok(())
    }

    async fn get_preference(&self, principal: &str) -> Result<Option<Preference>> {
        let row = sqlx::query("SELECT record FROM preferences WHERE principal = ?")
            .bind(principal)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("failed to load preference", e))?;
        match row {
            Some(row) => {
                let record: String = row.get("record");
                Ok(Some(serde_json::from_str(&record)?))
            }
            None => Ok(None),
        }
    }

    async fn list_by_frequency(&self, frequency: Frequency) -> Result<Vec<Preference>> {
        let rows = sqlx::query("SELECT record FROM preferences WHERE frequency = ? ORDER BY principal")
            .bind(frequency.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("failed to list preferences", e))?;
        rows.iter()
            .map(|row| {
                let record: String = row.get("record");
                serde_json::from_str(&record).map_err(Error::from)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nd_core::{CategorySet, RunStatus, StepName};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sqlite_run_store_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("runs").join("test.db");

        let mut run = DigestRun::new(CategorySet::new(["technology"]).unwrap());
        {
            let store = SqliteStore::new_with_path(&db_path).await.unwrap();
            store.insert_run(&run).await.unwrap();
            assert!(store.insert_run(&run).await.is_err());

            run.transition(RunStatus::Fetching).unwrap();
            run.record_step(StepName::FetchNews, &vec!["cached".to_string()]).unwrap();
            store.save_run(&run).await.unwrap();
        }

        let store = SqliteStore::new_with_path(&db_path).await.unwrap();
        let loaded = store.load_run(run.id).await.unwrap().unwrap();
        assert_eq!(loaded, run);
        assert_eq!(store.list_runs().await.unwrap().len(), 1);
        assert!(store.load_run(RunId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_save_unknown_run() {
        let temp_dir = tempdir().unwrap();
        let store = SqliteStore::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();
        let run = DigestRun::new(CategorySet::new(["science"]).unwrap());
        assert!(matches!(store.save_run(&run).await, Err(Error::RunNotFound(_))));
    }

    #[tokio::test]
    async fn test_sqlite_preferences() {
        let temp_dir = tempdir().unwrap();
        let store = SqliteStore::new_with_path(&temp_dir.path().join("test.db")).await.unwrap();

        let pref = Preference::new("ana", CategorySet::new(["science"]).unwrap(), Frequency::Weekly).unwrap();
        store.save_preference(&pref).await.unwrap();
        let updated = Preference::new("ana", CategorySet::new(["health"]).unwrap(), Frequency::Daily).unwrap();
        store.save_preference(&updated).await.unwrap();

        assert!(store.list_by_frequency(Frequency::Weekly).await.unwrap().is_empty());
        assert_eq!(store.list_by_frequency(Frequency::Daily).await.unwrap(), vec![updated.clone()]);
        assert_eq!(store.get_preference("ana").await.unwrap(), Some(updated));
    }
}
