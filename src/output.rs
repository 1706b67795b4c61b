use crate::models::{Listing, ScrapeRun, COLUMNS};
use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Csv,
    Json,
}

impl Format {
    pub fn default_path(self) -> PathBuf {
        match self {
            Format::Csv => PathBuf::from("rv_listings.csv"),
            Format::Json => PathBuf::from("rv_listings.json"),
        }
    }
}

/// Write rows as CSV with the fixed column header.
pub fn write_csv(path: &Path, rows: &[Listing]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    // header written explicitly so an empty run still gets one
    writer.write_record(COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub async fn write_json(path: &Path, run: &ScrapeRun) -> Result<()> {
    let json = serde_json::to_string_pretty(run)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub async fn write_output(format: Format, path: &Path, run: &ScrapeRun) -> Result<()> {
    match format {
        Format::Csv => {
            let path = path.to_path_buf();
            let rows = run.rows.clone();
            tokio::task::spawn_blocking(move || write_csv(&path, &rows))
                .await
                .context("CSV writer task panicked")?
        }
        Format::Json => write_json(path, run).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row() -> Listing {
        Listing {
            title: "2019 Jayco Eagle, HT".into(),
            tagline: "Bunkhouse Ready!".into(),
            list_price: "$39,995".into(),
            payments_from: "$289".into(),
            payments_disclaimer: "20% down, 180 mos".into(),
            image_url: "https://cdn.x.com/a.jpg".into(),
            detail_url: "https://x.com/product/used-a".into(),
        }
    }

    #[test]
    fn csv_has_header_and_quoted_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_csv(&path, &[row()]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("title,tagline,list_price,payments_from,payments_disclaimer,image_url,detail_url")
        );
        assert_eq!(
            lines.next(),
            Some("\"2019 Jayco Eagle, HT\",Bunkhouse Ready!,\"$39,995\",$289,\"20% down, 180 mos\",https://cdn.x.com/a.jpg,https://x.com/product/used-a")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_run_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_csv(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn json_round_trips_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let run = ScrapeRun {
            listing_url: "https://x.com/used".into(),
            scraped_at: Utc::now(),
            detail_urls_found: 1,
            disclaimers_found: 1,
            rows: vec![row()],
        };
        write_output(Format::Json, &path, &run).await.unwrap();

        let back: ScrapeRun =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.rows, vec![row()]);
    }

    #[tokio::test]
    async fn csv_output_from_async_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");
        let run = ScrapeRun {
            listing_url: "https://x.com/used".into(),
            scraped_at: Utc::now(),
            detail_urls_found: 2,
            disclaimers_found: 0,
            rows: vec![row(), row()],
        };
        write_output(Format::Csv, &path, &run).await.unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.headers().unwrap(), COLUMNS.to_vec());
        let back: Vec<Listing> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(back, vec![row(), row()]);
    }

    #[test]
    fn default_paths() {
        assert_eq!(Format::Csv.default_path(), PathBuf::from("rv_listings.csv"));
        assert_eq!(Format::Json.default_path(), PathBuf::from("rv_listings.json"));
    }
}
