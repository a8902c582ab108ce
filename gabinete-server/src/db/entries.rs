//! Submission store
//!
//! Entries are insert-only: there is no update or delete. Listing is newest
//! first; gallery filters run over the loaded rows.

use gabinete_common::db::{join_image_urls, split_image_urls, Entry, EntryFilter, EntryStats, NewEntry};
use gabinete_common::time::{now, parse_stored, to_stored};
use gabinete_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

const SELECT_ENTRY: &str = r#"
    SELECT id, created_at, student_name, email, grp, artifact_title, artifact_desc,
           tags, reflection_q1, reflection_q2, reflection_q3, image_urls, audio_url, suno_link
    FROM entries
"#;

/// Store for gabinete submissions
#[derive(Clone)]
pub struct SubmissionStore {
    pool: SqlitePool,
}

impl SubmissionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Validate and insert a submission
    ///
    /// Fails with [`Error::Validation`] naming every blank required field;
    /// nothing is written in that case.
    pub async fn create(&self, new_entry: NewEntry) -> Result<Entry> {
        let entry = new_entry.normalize()?;
        let created_at = now();
        let group = entry.group.clone().unwrap_or_default();

        let id = sqlx::query(
            r#"
            INSERT INTO entries (
                created_at, student_name, email, grp, artifact_title, artifact_desc, tags,
                reflection_q1, reflection_q2, reflection_q3, image_urls, audio_url, suno_link
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(to_stored(&created_at))
        .bind(&entry.student_name)
        .bind(&entry.email)
        .bind(&group)
        .bind(&entry.artifact_title)
        .bind(&entry.artifact_desc)
        .bind(&entry.tags)
        .bind(&entry.reflection_q1)
        .bind(&entry.reflection_q2)
        .bind(&entry.reflection_q3)
        .bind(join_image_urls(&entry.image_urls))
        .bind(entry.audio_url.as_deref().unwrap_or_default())
        .bind(entry.suno_link.as_deref().unwrap_or_default())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        info!(
            "Stored entry {} for {} ({} images)",
            id,
            entry.email,
            entry.image_urls.len()
        );

        Ok(Entry {
            id,
            created_at,
            student_name: entry.student_name,
            email: entry.email,
            group,
            artifact_title: entry.artifact_title,
            artifact_desc: entry.artifact_desc,
            tags: entry.tags,
            reflection_q1: entry.reflection_q1,
            reflection_q2: entry.reflection_q2,
            reflection_q3: entry.reflection_q3,
            image_urls: entry.image_urls,
            audio_url: entry.audio_url,
            suno_link: entry.suno_link,
        })
    }

    /// All entries, newest first; equal timestamps fall back to newest id first
    pub async fn list_all(&self) -> Result<Vec<Entry>> {
        let rows = sqlx::query(&format!("{} ORDER BY created_at DESC, id DESC", SELECT_ENTRY))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_entry).collect()
    }

    /// Entries matching every condition set in `filter`, newest first
    pub async fn filter(&self, filter: &EntryFilter) -> Result<Vec<Entry>> {
        let entries = self.list_all().await?;
        Ok(entries.into_iter().filter(|e| filter.matches(e)).collect())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Entry>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_ENTRY))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_entry).transpose()
    }

    pub async fn stats(&self) -> Result<EntryStats> {
        Ok(EntryStats::from_entries(&self.list_all().await?))
    }
}

fn optional(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn row_to_entry(row: &SqliteRow) -> Result<Entry> {
    let created_at: String = row.try_get("created_at")?;
    let image_urls: String = row.try_get("image_urls")?;

    Ok(Entry {
        id: row.try_get("id")?,
        created_at: parse_stored(&created_at)
            .map_err(|e| Error::Internal(format!("entry row: {}", e)))?,
        student_name: row.try_get("student_name")?,
        email: row.try_get("email")?,
        group: row.try_get("grp")?,
        artifact_title: row.try_get("artifact_title")?,
        artifact_desc: row.try_get("artifact_desc")?,
        tags: row.try_get("tags")?,
        reflection_q1: row.try_get("reflection_q1")?,
        reflection_q2: row.try_get("reflection_q2")?,
        reflection_q3: row.try_get("reflection_q3")?,
        image_urls: split_image_urls(&image_urls),
        audio_url: optional(row.try_get("audio_url")?),
        suno_link: optional(row.try_get("suno_link")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;
    use gabinete_common::db::MAX_IMAGES;

    fn submission(name: &str, tags: &str) -> NewEntry {
        NewEntry {
            student_name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            group: Some("Grupo B".into()),
            artifact_title: format!("Obra de {}", name),
            artifact_desc: "Materiales reciclados".into(),
            tags: tags.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_list_preserves_fields() {
        let (_dir, pool) = test_pool().await;
        let store = SubmissionStore::new(pool);

        let mut new_entry = submission("Lucia", " identidad, memoria ");
        new_entry.reflection_q2 = "  Porque sí  ".into();
        new_entry.suno_link = Some("https://suno.com/song/abc".into());
        let created = store.create(new_entry).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], created);
        assert_eq!(all[0].tags, "identidad, memoria");
        assert_eq!(all[0].reflection_q2, "Porque sí");
        assert_eq!(all[0].audio_url, None);
        assert!(all[0].has_audio());
    }

    #[tokio::test]
    async fn test_missing_fields_create_nothing() {
        let (_dir, pool) = test_pool().await;
        let store = SubmissionStore::new(pool);

        let mut bad = submission("Lucia", "");
        bad.artifact_desc = "   ".into();
        bad.email = String::new();

        match store.create(bad).await {
            Err(Error::Validation { missing }) => {
                assert_eq!(missing, vec!["email", "artifact_desc"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (_dir, pool) = test_pool().await;
        let store = SubmissionStore::new(pool);

        let first = store.create(submission("Ana", "")).await.unwrap();
        let second = store.create(submission("Bruno", "")).await.unwrap();
        let third = store.create(submission("Carla", "")).await.unwrap();

        let ids: Vec<i64> = store.list_all().await.unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[tokio::test]
    async fn test_equal_timestamps_list_higher_id_first() {
        let (_dir, pool) = test_pool().await;
        let store = SubmissionStore::new(pool.clone());

        for name in ["Primera", "Segunda"] {
            sqlx::query(
                r#"
                INSERT INTO entries (created_at, student_name, email, grp, artifact_title, artifact_desc)
                VALUES ('2025-05-01T10:00:00.000000Z', ?, 'x@example.com', 'Grupo A', 'Obra', 'Desc')
                "#,
            )
            .bind(name)
            .execute(&pool)
            .await
            .unwrap();
        }

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].created_at, all[1].created_at);
        assert!(all[0].id > all[1].id);
        assert_eq!(all[0].student_name, "Segunda");
    }

    #[tokio::test]
    async fn test_extra_images_truncated_in_order() {
        let (_dir, pool) = test_pool().await;
        let store = SubmissionStore::new(pool);

        let mut new_entry = submission("Ana", "");
        new_entry.image_urls = (1..=8).map(|i| format!("uploads/images/img_{}.jpg", i)).collect();
        let created = store.create(new_entry).await.unwrap();

        let stored = store.get(created.id).await.unwrap().unwrap();
        assert_eq!(stored.image_urls.len(), MAX_IMAGES);
        assert_eq!(stored.image_urls[0], "uploads/images/img_1.jpg");
        assert_eq!(stored.image_urls[5], "uploads/images/img_6.jpg");
    }

    #[tokio::test]
    async fn test_filter_exact_tag_and_free_text() {
        let (_dir, pool) = test_pool().await;
        let store = SubmissionStore::new(pool);

        store.create(submission("Ana", "memoria, archivo")).await.unwrap();
        store.create(submission("Bruno", "memorias")).await.unwrap();
        store.create(submission("Regina", "luz")).await.unwrap();

        let by_tag = store
            .filter(&EntryFilter {
                exact_tag: Some("memoria".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].student_name, "Ana");

        let by_text = store
            .filter(&EntryFilter {
                free_text: Some("regina".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_text.len(), 1);
        assert_eq!(by_text[0].student_name, "Regina");

        let combined = store
            .filter(&EntryFilter {
                group: Some("Grupo A".into()),
                free_text: Some("regina".into()),
                exact_tag: None,
            })
            .await
            .unwrap();
        assert!(combined.is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let (_dir, pool) = test_pool().await;
        let store = SubmissionStore::new(pool);
        assert!(store.get(42).await.unwrap().is_none());
    }
}
