//! Rubric score store
//!
//! Unlike checkpoints, a score save replaces the whole row for the email.

use gabinete_common::db::{Rubric, SparkScore};
use gabinete_common::time::{now, parse_stored, to_stored};
use gabinete_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Column order of the scores CSV export
pub const SCORES_CSV_HEADER: [&str; 8] = [
    "email",
    "sensing",
    "probing",
    "acting",
    "reflecting",
    "knowing",
    "comments",
    "updated_at",
];

#[derive(Clone)]
pub struct ScoreStore {
    pool: SqlitePool,
}

impl ScoreStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a rubric evaluation, overwriting any previous one for the email
    pub async fn upsert_score(&self, email: &str, rubric: Rubric, comments: &str) -> Result<SparkScore> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::InvalidInput("email is required".to_string()));
        }
        rubric.validate()?;

        let score = SparkScore {
            email: email.to_string(),
            rubric,
            comments: comments.trim().to_string(),
            updated_at: now(),
        };

        sqlx::query(
            r#"
            INSERT INTO spark_scores (email, rubric, comments, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET
                rubric = excluded.rubric,
                comments = excluded.comments,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&score.email)
        .bind(serde_json::to_string(&score.rubric)?)
        .bind(&score.comments)
        .bind(to_stored(&score.updated_at))
        .execute(&self.pool)
        .await?;

        info!("Saved rubric for {}: {:?}", score.email, score.rubric.scores());
        Ok(score)
    }

    pub async fn get_score(&self, email: &str) -> Result<Option<SparkScore>> {
        let row = sqlx::query("SELECT email, rubric, comments, updated_at FROM spark_scores WHERE email = ?")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_score).transpose()
    }

    pub async fn list_all(&self) -> Result<Vec<SparkScore>> {
        let rows = sqlx::query("SELECT email, rubric, comments, updated_at FROM spark_scores ORDER BY email")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_score).collect()
    }

    /// CSV with one row per scored email
    pub async fn export_all_csv(&self) -> Result<Vec<u8>> {
        let scores = self.list_all().await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(SCORES_CSV_HEADER).map_err(csv_error)?;
        for score in &scores {
            let r = &score.rubric;
            writer
                .write_record([
                    score.email.clone(),
                    r.sensing.to_string(),
                    r.probing.to_string(),
                    r.acting.to_string(),
                    r.reflecting.to_string(),
                    r.knowing.to_string(),
                    score.comments.clone(),
                    to_stored(&score.updated_at),
                ])
                .map_err(csv_error)?;
        }

        writer
            .into_inner()
            .map_err(|e| Error::Export(format!("Failed to flush scores CSV: {}", e)))
    }
}

fn csv_error(e: csv::Error) -> Error {
    Error::Export(format!("CSV write failed: {}", e))
}

fn row_to_score(row: &SqliteRow) -> Result<SparkScore> {
    let rubric: String = row.try_get("rubric")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(SparkScore {
        email: row.try_get("email")?,
        rubric: serde_json::from_str(&rubric)
            .map_err(|e| Error::Internal(format!("spark_scores.rubric is not valid JSON: {}", e)))?,
        comments: row.try_get("comments")?,
        updated_at: parse_stored(&updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;

    fn rubric(n: u8) -> Rubric {
        Rubric {
            sensing: n,
            probing: n,
            acting: n,
            reflecting: n,
            knowing: n,
        }
    }

    #[tokio::test]
    async fn test_rescoring_overwrites() {
        let (_dir, pool) = test_pool().await;
        let store = ScoreStore::new(pool);

        store.upsert_score("ana@example.com", rubric(2), "Bien").await.unwrap();
        store
            .upsert_score("ana@example.com", Rubric { knowing: 4, ..rubric(1) }, "")
            .await
            .unwrap();

        let score = store.get_score("ana@example.com").await.unwrap().unwrap();
        assert_eq!(score.rubric, Rubric { knowing: 4, ..rubric(1) });
        assert_eq!(score.comments, "");
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_rejected() {
        let (_dir, pool) = test_pool().await;
        let store = ScoreStore::new(pool);

        let result = store.upsert_score("ana@example.com", rubric(5), "").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(store.get_score("ana@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_export_csv() {
        let (_dir, pool) = test_pool().await;
        let store = ScoreStore::new(pool);

        store.upsert_score("bruno@example.com", rubric(3), "Buen uso, de evidencia").await.unwrap();
        store.upsert_score("ana@example.com", rubric(1), "").await.unwrap();

        let csv = String::from_utf8(store.export_all_csv().await.unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "email,sensing,probing,acting,reflecting,knowing,comments,updated_at");
        assert!(lines[1].starts_with("ana@example.com,1,1,1,1,1,,"));
        assert!(lines[2].starts_with("bruno@example.com,3,3,3,3,3,\"Buen uso, de evidencia\","));
    }
}
