//! Teacher-panel exports
//!
//! - `gabinetes.csv`: one row per entry, fixed column order
//! - `gabinetes_media.zip`: the CSV plus every referenced media file that
//!   exists on disk, stored under `media/<relative path>`

use gabinete_common::db::{join_image_urls, Entry};
use gabinete_common::time::to_stored;
use gabinete_common::{Error, Result};
use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::media::MediaStore;

/// File name of the CSV inside the archive and for downloads
pub const ENTRIES_CSV_NAME: &str = "gabinetes.csv";
/// Download name of the media archive
pub const ARCHIVE_NAME: &str = "gabinetes_media.zip";
/// Archive directory that holds media files
pub const MEDIA_PREFIX: &str = "media";

/// Column order of the entries CSV
pub const ENTRIES_CSV_HEADER: [&str; 14] = [
    "id",
    "created_at",
    "student_name",
    "email",
    "group",
    "artifact_title",
    "artifact_desc",
    "tags",
    "reflection_q1",
    "reflection_q2",
    "reflection_q3",
    "image_urls",
    "audio_url",
    "suno_link",
];

/// Encode entries as CSV
pub fn entries_csv(entries: &[Entry]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(ENTRIES_CSV_HEADER).map_err(csv_error)?;

    for e in entries {
        writer
            .write_record([
                e.id.to_string(),
                to_stored(&e.created_at),
                e.student_name.clone(),
                e.email.clone(),
                e.group.clone(),
                e.artifact_title.clone(),
                e.artifact_desc.clone(),
                e.tags.clone(),
                e.reflection_q1.clone(),
                e.reflection_q2.clone(),
                e.reflection_q3.clone(),
                join_image_urls(&e.image_urls),
                e.audio_url.clone().unwrap_or_default(),
                e.suno_link.clone().unwrap_or_default(),
            ])
            .map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| Error::Export(format!("Failed to flush entries CSV: {}", e)))
}

/// Build the deflated ZIP archive of the CSV and media files
///
/// Media files that are missing or unsafe to resolve are skipped with a
/// warning; a file referenced by several entries is stored once.
pub fn entries_archive(entries: &[Entry], media: &MediaStore) -> Result<Vec<u8>> {
    let csv = entries_csv(entries)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    append_bytes(&mut zip, ENTRIES_CSV_NAME, &csv)?;

    let referenced: BTreeSet<&str> = entries.iter().flat_map(|e| e.media_paths()).collect();
    let mut stored = 0usize;
    for rel in referenced {
        let Some(path) = media.resolve(rel) else {
            warn!("Skipping unsafe media path in export: {}", rel);
            continue;
        };
        if !path.is_file() {
            warn!("Skipping missing media file in export: {}", rel);
            continue;
        }
        let bytes = std::fs::read(&path)?;
        append_bytes(&mut zip, &format!("{}/{}", MEDIA_PREFIX, rel), &bytes)?;
        stored += 1;
    }

    let archive = zip.finish().map_err(archive_error)?.into_inner();

    info!(
        "Built export archive: {} entries, {} media files, {} bytes",
        entries.len(),
        stored,
        archive.len()
    );
    Ok(archive)
}

fn append_bytes(zip: &mut ZipWriter<Cursor<Vec<u8>>>, path: &str, bytes: &[u8]) -> Result<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(path, options).map_err(archive_error)?;
    zip.write_all(bytes)?;
    Ok(())
}

fn csv_error(e: csv::Error) -> Error {
    Error::Export(format!("CSV write failed: {}", e))
}

fn archive_error(e: zip::result::ZipError) -> Error {
    Error::Export(format!("Archive write failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::tests::png_bytes;
    use chrono::Utc;
    use std::io::Read;
    use zip::ZipArchive;

    fn entry(id: i64, images: Vec<String>, audio: Option<String>) -> Entry {
        Entry {
            id,
            created_at: Utc::now(),
            student_name: "Ana".into(),
            email: "ana@example.com".into(),
            group: "Grupo A".into(),
            artifact_title: "Caja, de luz".into(),
            artifact_desc: "Línea uno\nLínea dos".into(),
            tags: "memoria".into(),
            reflection_q1: String::new(),
            reflection_q2: String::new(),
            reflection_q3: String::new(),
            image_urls: images,
            audio_url: audio,
            suno_link: None,
        }
    }

    fn archive_contents(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut reader = ZipArchive::new(Cursor::new(archive)).unwrap();
        (0..reader.len())
            .map(|i| {
                let mut file = reader.by_index(i).unwrap();
                let mut data = Vec::new();
                file.read_to_end(&mut data).unwrap();
                (file.name().to_string(), data)
            })
            .collect()
    }

    #[test]
    fn test_csv_header_and_quoting() {
        let csv = entries_csv(&[entry(7, vec!["a.jpg".into(), "b.jpg".into()], None)]).unwrap();
        let text = String::from_utf8(csv).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, ENTRIES_CSV_HEADER.join(","));
        assert!(text.contains("\"Caja, de luz\""));
        assert!(text.contains("a.jpg||b.jpg"));
    }

    #[test]
    fn test_archive_has_csv_and_media() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path().to_path_buf());
        let image = media.save_image(&png_bytes()).unwrap();
        let audio = media.save_audio(b"RIFFdata", Some("voz.wav")).unwrap();

        let archive = entries_archive(&[entry(1, vec![image.clone()], Some(audio.clone()))], &media).unwrap();
        let contents = archive_contents(&archive);

        let names: Vec<&str> = contents.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names[0], ENTRIES_CSV_NAME);
        let media_files: Vec<&&str> = names.iter().filter(|n| n.starts_with("media/")).collect();
        assert_eq!(media_files.len(), 2);
        assert!(names.contains(&format!("media/{}", image).as_str()));

        let (_, audio_bytes) = contents
            .iter()
            .find(|(n, _)| *n == format!("media/{}", audio))
            .unwrap();
        assert_eq!(audio_bytes, b"RIFFdata");
    }

    #[test]
    fn test_archive_skips_missing_media() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path().to_path_buf());

        let archive = entries_archive(
            &[entry(1, vec!["uploads/images/gone.jpg".into(), "../escape.jpg".into()], None)],
            &media,
        )
        .unwrap();
        let contents = archive_contents(&archive);
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].0, ENTRIES_CSV_NAME);
    }
}
