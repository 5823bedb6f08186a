use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::case::{CaseRecord, TrackEntry};

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub cases_path: PathBuf,
    pub tracks_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let cases_path = data_dir.join("cases.data");
        let tracks_path = data_dir.join("tracks.data");

        if !cases_path.exists() {
            fs::write(&cases_path, "")?;
        }
        if !tracks_path.exists() {
            fs::write(&tracks_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            cases = %cases_path.display(),
            tracks = %tracks_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            cases_path,
            tracks_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_cases(&self) -> anyhow::Result<Vec<CaseRecord>> {
        load_jsonl(&self.cases_path).context("failed to load cases.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_tracks(&self) -> anyhow::Result<Vec<TrackEntry>> {
        load_jsonl(&self.tracks_path).context("failed to load tracks.data")
    }

    /// Movement history of one case, in file order.
    #[tracing::instrument(skip(self))]
    pub fn tracks_for(&self, case_no: u32) -> anyhow::Result<Vec<TrackEntry>> {
        Ok(self
            .load_tracks()?
            .into_iter()
            .filter(|entry| entry.case_no == case_no)
            .collect())
    }

    #[tracing::instrument(skip(self, cases))]
    pub fn save_cases(&self, cases: &[CaseRecord]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.cases_path, cases).context("failed to save cases.data")
    }

    #[tracing::instrument(skip(self, tracks))]
    pub fn save_tracks(&self, tracks: &[TrackEntry]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tracks_path, tracks).context("failed to save tracks.data")
    }
}

fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let row: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(row);
    }

    debug!(count = out.len(), "loaded rows from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, rows))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = rows.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for row in rows {
        let serialized = serde_json::to_string(row)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|e| anyhow!("failed to persist {}: {}", path.display(), e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::NaiveDate;
    use tempfile::tempdir;

    use super::DataStore;
    use crate::case::{CaseRecord, TrackEntry};
    use crate::labels::Localized;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 2, d).expect("valid date")
    }

    #[test]
    fn open_creates_empty_files() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(&temp.path().join("nested")).expect("open datastore");
        assert!(store.cases_path.exists());
        assert!(store.load_cases().expect("load cases").is_empty());
        assert!(store.load_tracks().expect("load tracks").is_empty());
    }

    #[test]
    fn tracks_are_filtered_by_case() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        let entry = |case_no, d| TrackEntry {
            case_no,
            start_date: day(d),
            end_date: day(d),
            action: Localized::new("到訪", "Visited"),
            location: Localized::default(),
            remarks: Localized::default(),
        };
        store
            .save_tracks(&[entry(1, 3), entry(2, 4), entry(1, 5)])
            .expect("save tracks");

        let tracks = store.tracks_for(1).expect("tracks for case 1");
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].start_date, day(5));
    }

    #[test]
    fn parse_errors_name_the_line() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");
        let good = serde_json::to_string(&CaseRecord::new(1, day(1))).expect("serialize");
        fs::write(&store.cases_path, format!("{good}\n\n{{\"case_no\": 2}}\n"))
            .expect("write cases");

        let err = store.load_cases().expect_err("missing date should fail");
        assert!(format!("{err:#}").contains("line 3"));
    }
}
