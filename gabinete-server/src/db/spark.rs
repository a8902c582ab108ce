//! SPARK checkpoint store
//!
//! One row per student email. Each section save is a read-modify-write of the
//! whole row: load the latest row (or a blank one), overlay the single section
//! being saved, write every column back. The whole sequence runs in one
//! transaction that starts with a write, so two concurrent saves for the same
//! email serialize on SQLite's writer lock instead of losing an update.
//!
//! List and object sub-fields are JSON text in the table and typed values
//! everywhere else; encoding happens only in this module.

use gabinete_common::spark::{
    Acting, Knowing, NextAction, Probing, Reflecting, Sensing, SparkEntry, SparkSection,
};
use gabinete_common::text::non_blank;
use gabinete_common::time::{now, parse_stored, to_stored};
use gabinete_common::{Error, Result};
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

const SELECT_LATEST: &str = r#"
    SELECT id, email, team,
           sensing_snapshot, sensing_valence, sensing_evidence_url,
           probing_hypothesis, probing_data_plan,
           acting_decisions, acting_learnings, acting_changes,
           reflecting_tension, reflecting_assumption,
           knowing_insights, knowing_sdg, knowing_next_action,
           updated_at
    FROM spark_entries
    WHERE email = ?
    ORDER BY id DESC
    LIMIT 1
"#;

/// Store for per-student SPARK checkpoints
#[derive(Clone)]
pub struct CheckpointStore {
    pool: SqlitePool,
}

impl CheckpointStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Validate one section and merge it into the student's record
    ///
    /// `team` replaces the stored team only when it is non-blank. On a
    /// validation failure nothing is written and previously saved sections
    /// are untouched.
    pub async fn save_section(
        &self,
        email: &str,
        team: Option<&str>,
        section: SparkSection,
    ) -> Result<SparkEntry> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::InvalidInput("email is required".to_string()));
        }
        let section = section.validate()?;
        let section_name = section.name();

        let mut tx = self.pool.begin().await?;

        // Take the writer lock before reading the row we are about to rewrite
        sqlx::query("UPDATE spark_entries SET updated_at = updated_at WHERE email = ?")
            .bind(email)
            .execute(&mut *tx)
            .await?;

        let current = sqlx::query(SELECT_LATEST)
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;

        let updated_at = now();
        let mut entry = match current {
            Some(row) => row_to_entry(&row)?,
            None => SparkEntry::blank(email, updated_at),
        };
        entry.apply(section);
        entry.updated_at = updated_at;
        if let Some(team) = non_blank(team) {
            entry.team = Some(team);
        }

        let columns = EncodedColumns::from_entry(&entry)?;

        if entry.id == 0 {
            let id = sqlx::query(
                r#"
                INSERT INTO spark_entries (
                    email, team,
                    sensing_snapshot, sensing_valence, sensing_evidence_url,
                    probing_hypothesis, probing_data_plan,
                    acting_decisions, acting_learnings, acting_changes,
                    reflecting_tension, reflecting_assumption,
                    knowing_insights, knowing_sdg, knowing_next_action,
                    updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.email)
            .bind(&entry.team)
            .bind(&columns.sensing_snapshot)
            .bind(&columns.sensing_valence)
            .bind(&columns.sensing_evidence_url)
            .bind(&columns.probing_hypothesis)
            .bind(&columns.probing_data_plan)
            .bind(&columns.acting_decisions)
            .bind(&columns.acting_learnings)
            .bind(&columns.acting_changes)
            .bind(&columns.reflecting_tension)
            .bind(&columns.reflecting_assumption)
            .bind(&columns.knowing_insights)
            .bind(&columns.knowing_sdg)
            .bind(&columns.knowing_next_action)
            .bind(to_stored(&entry.updated_at))
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
            entry.id = id;
        } else {
            sqlx::query(
                r#"
                UPDATE spark_entries SET
                    team = ?,
                    sensing_snapshot = ?, sensing_valence = ?, sensing_evidence_url = ?,
                    probing_hypothesis = ?, probing_data_plan = ?,
                    acting_decisions = ?, acting_learnings = ?, acting_changes = ?,
                    reflecting_tension = ?, reflecting_assumption = ?,
                    knowing_insights = ?, knowing_sdg = ?, knowing_next_action = ?,
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&entry.team)
            .bind(&columns.sensing_snapshot)
            .bind(&columns.sensing_valence)
            .bind(&columns.sensing_evidence_url)
            .bind(&columns.probing_hypothesis)
            .bind(&columns.probing_data_plan)
            .bind(&columns.acting_decisions)
            .bind(&columns.acting_learnings)
            .bind(&columns.acting_changes)
            .bind(&columns.reflecting_tension)
            .bind(&columns.reflecting_assumption)
            .bind(&columns.knowing_insights)
            .bind(&columns.knowing_sdg)
            .bind(&columns.knowing_next_action)
            .bind(to_stored(&entry.updated_at))
            .bind(entry.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            "Saved SPARK {} for {} ({}/5 sections)",
            section_name,
            entry.email,
            entry.completion()
        );

        Ok(entry)
    }

    /// Latest checkpoint record for an email
    pub async fn get(&self, email: &str) -> Result<Option<SparkEntry>> {
        let row = sqlx::query(SELECT_LATEST)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_entry).transpose()
    }

    /// Portfolio document with every stored column, JSON sub-fields decoded
    pub async fn export(&self, email: &str) -> Result<serde_json::Value> {
        let entry = self
            .get(email)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No SPARK record for {}", email.trim())))?;

        debug!("Exporting SPARK record {} for {}", entry.id, entry.email);
        Ok(serde_json::to_value(&entry)?)
    }

    /// Emails whose latest record has all five sections saved
    pub async fn list_complete(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT email FROM spark_entries s
            WHERE id = (SELECT MAX(id) FROM spark_entries WHERE email = s.email)
              AND sensing_snapshot IS NOT NULL
              AND probing_hypothesis IS NOT NULL
              AND acting_decisions IS NOT NULL
              AND reflecting_tension IS NOT NULL
              AND knowing_insights IS NOT NULL
            ORDER BY email
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("email").map_err(Error::from))
            .collect()
    }
}

/// Column values for one row, sections absent from the entry bind as NULL
#[derive(Default)]
struct EncodedColumns {
    sensing_snapshot: Option<String>,
    sensing_valence: Option<String>,
    sensing_evidence_url: Option<String>,
    probing_hypothesis: Option<String>,
    probing_data_plan: Option<String>,
    acting_decisions: Option<String>,
    acting_learnings: Option<String>,
    acting_changes: Option<String>,
    reflecting_tension: Option<String>,
    reflecting_assumption: Option<String>,
    knowing_insights: Option<String>,
    knowing_sdg: Option<String>,
    knowing_next_action: Option<String>,
}

impl EncodedColumns {
    fn from_entry(entry: &SparkEntry) -> Result<Self> {
        let mut columns = EncodedColumns::default();

        if let Some(s) = &entry.sensing {
            columns.sensing_snapshot = Some(s.snapshot.clone());
            columns.sensing_valence = Some(s.valence.as_str().to_string());
            columns.sensing_evidence_url = Some(s.evidence_url.clone());
        }
        if let Some(p) = &entry.probing {
            columns.probing_hypothesis = Some(p.hypothesis.clone());
            columns.probing_data_plan = Some(serde_json::to_string(&p.data_plan)?);
        }
        if let Some(a) = &entry.acting {
            columns.acting_decisions = Some(serde_json::to_string(&a.decisions)?);
            columns.acting_learnings = Some(serde_json::to_string(&a.learnings)?);
            columns.acting_changes = Some(serde_json::to_string(&a.changes)?);
        }
        if let Some(r) = &entry.reflecting {
            columns.reflecting_tension = Some(r.tension.clone());
            columns.reflecting_assumption = Some(r.assumption.clone());
        }
        if let Some(k) = &entry.knowing {
            columns.knowing_insights = Some(serde_json::to_string(&k.insights)?);
            columns.knowing_sdg = Some(serde_json::to_string(&k.sdgs)?);
            columns.knowing_next_action = Some(serde_json::to_string(&k.next_action)?);
        }

        Ok(columns)
    }
}

fn decode_json<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: Option<String> = row.try_get(column)?;
    let raw = raw.ok_or_else(|| Error::Internal(format!("spark_entries.{} is NULL", column)))?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::Internal(format!("spark_entries.{} is not valid JSON: {}", column, e)))
}

fn text(row: &SqliteRow, column: &str) -> Result<String> {
    let value: Option<String> = row.try_get(column)?;
    Ok(value.unwrap_or_default())
}

fn row_to_entry(row: &SqliteRow) -> Result<SparkEntry> {
    let updated_at: String = row.try_get("updated_at")?;

    let sensing_snapshot: Option<String> = row.try_get("sensing_snapshot")?;
    let sensing = match sensing_snapshot {
        Some(snapshot) => Some(Sensing {
            snapshot,
            valence: text(row, "sensing_valence")?.parse()?,
            evidence_url: text(row, "sensing_evidence_url")?,
        }),
        None => None,
    };

    let probing_hypothesis: Option<String> = row.try_get("probing_hypothesis")?;
    let probing = match probing_hypothesis {
        Some(hypothesis) => Some(Probing {
            hypothesis,
            data_plan: decode_json(row, "probing_data_plan")?,
        }),
        None => None,
    };

    let acting_decisions: Option<String> = row.try_get("acting_decisions")?;
    let acting = match acting_decisions {
        Some(_) => Some(Acting {
            decisions: decode_json(row, "acting_decisions")?,
            learnings: decode_json(row, "acting_learnings")?,
            changes: decode_json(row, "acting_changes")?,
        }),
        None => None,
    };

    let reflecting_tension: Option<String> = row.try_get("reflecting_tension")?;
    let reflecting = match reflecting_tension {
        Some(tension) => Some(Reflecting {
            tension,
            assumption: text(row, "reflecting_assumption")?,
        }),
        None => None,
    };

    let knowing_insights: Option<String> = row.try_get("knowing_insights")?;
    let knowing = match knowing_insights {
        Some(_) => Some(Knowing {
            insights: decode_json(row, "knowing_insights")?,
            sdgs: decode_json(row, "knowing_sdg")?,
            next_action: decode_json::<NextAction>(row, "knowing_next_action")?,
        }),
        None => None,
    };

    Ok(SparkEntry {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        team: row.try_get("team")?,
        sensing,
        probing,
        acting,
        reflecting,
        knowing,
        updated_at: parse_stored(&updated_at)?,
    })
}
