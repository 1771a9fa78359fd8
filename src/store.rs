use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::eval::EvaluationRecord;
use crate::schema::Schema;
use crate::table::FeatureTable;

/// SQLite-backed store of per-company feature tables.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    path: PathBuf,
}

impl FeatureStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let store = Self {
            path: path.to_path_buf(),
        };
        store.connect()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS feature_tables (
                company TEXT NOT NULL PRIMARY KEY,
                schema_json TEXT NOT NULL,
                rows INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS feature_values (
                company TEXT NOT NULL,
                date TEXT NOT NULL,
                position INTEGER NOT NULL,
                value REAL,
                PRIMARY KEY(company, date, position)
            );
            "#,
        )?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.path).with_context(|| format!("failed to open {}", self.path.display()))
    }

    /// Replace everything stored for the table's company.
    pub fn save(&self, table: &FeatureTable) -> Result<()> {
        let mut conn = self.connect()?;
        let schema_json =
            serde_json::to_string(table.schema()).context("failed to serialize feature schema")?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM feature_values WHERE company = ?1",
            params![table.company()],
        )?;
        tx.execute(
            r#"
            INSERT INTO feature_tables (company, schema_json, rows, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(company) DO UPDATE SET
                schema_json = excluded.schema_json,
                rows = excluded.rows,
                updated_at_ms = excluded.updated_at_ms
            "#,
            params![
                table.company(),
                schema_json,
                table.len() as i64,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO feature_values (company, date, position, value) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (row, date) in table.dates().iter().enumerate() {
                let date = date.format("%Y-%m-%d").to_string();
                for position in 0..table.schema().len() {
                    stmt.execute(params![
                        table.company(),
                        date,
                        position as i64,
                        table.column_at(position)[row],
                    ])?;
                }
            }
        }
        tx.commit()?;
        tracing::info!(company = table.company(), rows = table.len(), path = %self.path.display(), "Feature table persisted");
        Ok(())
    }

    pub fn load(&self, company: &str) -> Result<Option<FeatureTable>> {
        let conn = self.connect()?;
        let header: Option<(String, i64)> = conn
            .query_row(
                "SELECT schema_json, rows FROM feature_tables WHERE company = ?1",
                params![company],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((schema_json, expected_rows)) = header else {
            return Ok(None);
        };
        let schema: Schema =
            serde_json::from_str(&schema_json).context("failed to parse stored feature schema")?;

        let mut stmt = conn.prepare(
            "SELECT date, position, value FROM feature_values WHERE company = ?1 ORDER BY date, position",
        )?;
        let mut dates: Vec<NaiveDate> = Vec::new();
        let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); schema.len()];
        let mut rows = stmt.query(params![company])?;
        while let Some(row) = rows.next()? {
            let date: String = row.get(0)?;
            let position: i64 = row.get(1)?;
            let value: Option<f64> = row.get(2)?;
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("invalid stored date {}", date))?;
            if dates.last() != Some(&date) {
                dates.push(date);
            }
            let column = columns
                .get_mut(position as usize)
                .with_context(|| format!("stored position {} outside schema", position))?;
            column.push(value);
        }
        if dates.len() as i64 != expected_rows {
            anyhow::bail!(
                "stored feature table for {} is truncated: {} rows recorded, {} found",
                company,
                expected_rows,
                dates.len()
            );
        }
        let table = FeatureTable::new(company, schema, dates, columns)
            .with_context(|| format!("stored feature table for {} is inconsistent", company))?;
        Ok(Some(table))
    }

    pub fn companies(&self) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT company FROM feature_tables ORDER BY company")?;
        let companies = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(companies)
    }
}

fn record_file_name(record: &EvaluationRecord) -> String {
    let run = record.run_id.simple().to_string();
    format!(
        "{}_{}_{}_{}.json",
        record.company,
        record.model_kind.as_str(),
        record.created_at.format("%Y%m%dT%H%M%S"),
        &run[..8]
    )
}

pub fn persist_evaluation_record(dir: &Path, record: &EvaluationRecord) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(record_file_name(record));
    let json =
        serde_json::to_string_pretty(record).context("failed to serialize evaluation record")?;
    std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// All records in `dir`, oldest first. A missing directory yields none.
pub fn load_evaluation_records(dir: &Path) -> Result<Vec<EvaluationRecord>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut records = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let payload = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let record: EvaluationRecord = serde_json::from_str(&payload)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        records.push(record);
    }
    records.sort_by_key(|r| r.created_at);
    Ok(records)
}
