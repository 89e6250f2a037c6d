//! IngestionPipeline - drop-directory intake
//!
//! ## Responsibilities
//!
//! - Walk the origin tree and filter out non-image files
//! - Derive the alias (SHA-256 of the input path string)
//! - Normalize color mode and re-encode at the configured quality
//! - Record the alias mapping and retire the source file
//!
//! Runs once, to completion, before the server starts accepting requests.
//! A file that fails to decode or encode is skipped and left in place; an
//! alias conflict skips the insert but the source is still removed, matching
//! the established intake contract.

use crate::error::Result;
use crate::index::ImageIndex;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use walkdir::WalkDir;

/// Output format for re-encoded images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    /// Lossless; the quality setting does not apply
    WebP,
}

impl OutputFormat {
    /// File extension used for processed files (`<alias>.<extension>`)
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }

    /// Content type sent with successful image responses
    pub fn media_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
        }
    }
}

/// Outcome counters for one ingestion run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Files compressed, indexed and retired
    pub ingested: usize,
    /// Files that did not decode as images, left untouched
    pub skipped: usize,
    /// Files whose alias was already indexed (source still retired)
    pub duplicates: usize,
    /// Files that decoded but failed to re-encode, left untouched
    pub failed: usize,
}

/// Derive the stable alias for an input path.
///
/// The digest covers the path *string* as presented at ingestion time, not
/// the file contents: re-running over the same path reproduces the alias,
/// while identical bytes at two paths get two aliases.
pub fn alias_for_path(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Normalize to a 3-channel representation and write at `quality`.
fn write_compressed(
    img: &DynamicImage,
    output: &Path,
    quality: u8,
    format: OutputFormat,
) -> Result<()> {
    // JPEG carries no alpha; flatten everything to RGB8 up front so all
    // formats produce the same color mode.
    let rgb = img.to_rgb8();

    let file = File::create(output)?;
    let mut writer = BufWriter::new(file);
    match format {
        OutputFormat::Jpeg => {
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))?
        }
        OutputFormat::Png => rgb.write_with_encoder(PngEncoder::new(&mut writer))?,
        OutputFormat::WebP => rgb.write_with_encoder(WebPEncoder::new_lossless(&mut writer))?,
    }
    writer.flush()?;
    Ok(())
}

/// Process every regular file under `origin`, writing compressed copies into
/// `processed` and recording alias mappings in `index`.
///
/// Blocks (is awaited) until the entire tree is consumed. Returns the
/// per-outcome counters for the run.
pub async fn run(
    origin: &Path,
    processed: &Path,
    index: &ImageIndex,
    quality: u8,
    format: OutputFormat,
) -> Result<IngestReport> {
    tracing::info!(
        origin = %origin.display(),
        processed = %processed.display(),
        quality = quality,
        format = format.extension(),
        "Starting ingestion"
    );

    let mut report = IngestReport::default();

    for entry in WalkDir::new(origin).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let input = entry.path();

        let img = match ImageReader::open(input)
            .map_err(image::ImageError::from)
            .and_then(|r| r.with_guessed_format().map_err(image::ImageError::from))
            .and_then(|r| r.decode())
        {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!(input = %input.display(), error = %e, "Skipping non-image file");
                report.skipped += 1;
                continue;
            }
        };

        let alias = alias_for_path(input);
        let output = processed.join(format!("{alias}.{}", format.extension()));

        match write_compressed(&img, &output, quality, format) {
            Ok(()) => {
                let inserted = index.insert(&alias, &output.to_string_lossy()).await?;
                if inserted {
                    report.ingested += 1;
                } else {
                    tracing::warn!(alias = %alias, "Alias already indexed, keeping existing mapping");
                    report.duplicates += 1;
                }
                // Move semantics: the source is retired even on an alias
                // conflict, so a duplicate original is not preserved.
                std::fs::remove_file(input)?;
                tracing::info!(
                    input = %input.display(),
                    output = %output.display(),
                    alias = %alias,
                    "Ingested"
                );
            }
            Err(e) => {
                tracing::error!(input = %input.display(), error = %e, "Re-encode failed, source retained");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        ingested = report.ingested,
        skipped = report.skipped,
        duplicates = report.duplicates,
        failed = report.failed,
        "Ingestion complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_test_image(path: &Path) {
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 40, 40]));
        img.save(path).unwrap();
    }

    async fn test_index(dir: &TempDir) -> ImageIndex {
        let index = ImageIndex::new(&dir.path().join("index.db"), 256);
        index.ensure_schema().await.unwrap();
        index
    }

    #[test]
    fn alias_is_deterministic_per_path_string() {
        let a = alias_for_path(Path::new("Origin/a.jpg"));
        let b = alias_for_path(Path::new("Origin/a.jpg"));
        let c = alias_for_path(Path::new("Origin/b.jpg"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn single_file_scenario() {
        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("origin");
        let processed = dir.path().join("processed");
        std::fs::create_dir_all(&origin).unwrap();
        std::fs::create_dir_all(&processed).unwrap();

        let input = origin.join("a.jpg");
        write_test_image(&input);
        let expected_alias = alias_for_path(&input);

        let index = test_index(&dir).await;
        let report = run(&origin, &processed, &index, 75, OutputFormat::Jpeg)
            .await
            .unwrap();

        assert_eq!(report.ingested, 1);
        assert_eq!(report.skipped, 0);

        // Exactly one row, alias is the path digest
        let records = index.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].alias, expected_alias);

        // Processed file exists under <alias>.jpeg, source is gone
        let output = processed.join(format!("{expected_alias}.jpeg"));
        assert!(output.exists());
        assert!(!input.exists());
        assert_eq!(records[0].storage_path, output.to_string_lossy());
    }

    #[tokio::test]
    async fn non_image_files_are_left_untouched() {
        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("origin");
        let processed = dir.path().join("processed");
        std::fs::create_dir_all(&origin).unwrap();
        std::fs::create_dir_all(&processed).unwrap();

        let stray = origin.join("notes.txt");
        std::fs::write(&stray, "not an image").unwrap();

        let index = test_index(&dir).await;
        let report = run(&origin, &processed, &index, 75, OutputFormat::Jpeg)
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.ingested, 0);
        assert!(stray.exists());
        assert!(index.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_run_over_drained_origin_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("origin");
        let processed = dir.path().join("processed");
        std::fs::create_dir_all(&origin).unwrap();
        std::fs::create_dir_all(&processed).unwrap();
        write_test_image(&origin.join("a.jpg"));

        let index = test_index(&dir).await;
        run(&origin, &processed, &index, 75, OutputFormat::Jpeg)
            .await
            .unwrap();
        let after_first = index.list_all().await.unwrap().len();

        let report = run(&origin, &processed, &index, 75, OutputFormat::Jpeg)
            .await
            .unwrap();

        assert_eq!(report, IngestReport::default());
        assert_eq!(index.list_all().await.unwrap().len(), after_first);
    }

    #[tokio::test]
    async fn alias_conflict_still_retires_the_source() {
        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("origin");
        let processed = dir.path().join("processed");
        std::fs::create_dir_all(&origin).unwrap();
        std::fs::create_dir_all(&processed).unwrap();

        let input = origin.join("a.jpg");
        write_test_image(&input);
        let alias = alias_for_path(&input);

        let index = test_index(&dir).await;
        // Pre-claim the alias, as a previous run over the same path would
        index.insert(&alias, "/elsewhere/old.jpeg").await.unwrap();

        let report = run(&origin, &processed, &index, 75, OutputFormat::Jpeg)
            .await
            .unwrap();

        assert_eq!(report.duplicates, 1);
        assert_eq!(report.ingested, 0);
        assert!(!input.exists());
        // Existing mapping wins
        let path = index.lookup(&alias).await.unwrap();
        assert_eq!(path.as_deref(), Some("/elsewhere/old.jpeg"));
    }

    #[tokio::test]
    async fn recurses_into_subdirectories() {
        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("origin");
        let processed = dir.path().join("processed");
        let nested = origin.join("trip").join("day2");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir_all(&processed).unwrap();
        write_test_image(&nested.join("b.png"));

        let index = test_index(&dir).await;
        let report = run(&origin, &processed, &index, 75, OutputFormat::Jpeg)
            .await
            .unwrap();

        assert_eq!(report.ingested, 1);
    }
}
