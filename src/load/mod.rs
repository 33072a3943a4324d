pub mod date_parser;
pub mod records;

pub use records::{EnrolmentRecord, Transaction, UpdateRecord};

use crate::discover::{discover_files, Category, DiscoveredFiles};
use anyhow::Result;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{info, warn};

/// Outcome of loading one category: the concatenated rows plus file
/// accounting, so skipped files are visible to the operator instead of
/// silently dropped.
#[derive(Debug)]
pub struct LoadOutcome<T> {
    pub rows: Vec<T>,
    pub files_loaded: usize,
    pub files_skipped: usize,
}

impl<T> Default for LoadOutcome<T> {
    fn default() -> Self {
        LoadOutcome {
            rows: Vec::new(),
            files_loaded: 0,
            files_skipped: 0,
        }
    }
}

/// Everything one run works from: the three normalized collections plus
/// per-category file accounting.
#[derive(Debug, Default)]
pub struct Dataset {
    pub enrolment: LoadOutcome<EnrolmentRecord>,
    pub biometric: LoadOutcome<UpdateRecord>,
    pub demographic: LoadOutcome<UpdateRecord>,
}

impl Dataset {
    /// True when no category produced any rows, the only fatal condition.
    pub fn is_empty(&self) -> bool {
        self.enrolment.rows.is_empty()
            && self.biometric.rows.is_empty()
            && self.demographic.rows.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.enrolment.rows.len() + self.biometric.rows.len() + self.demographic.rows.len()
    }

    pub fn files_loaded(&self) -> usize {
        self.enrolment.files_loaded + self.biometric.files_loaded + self.demographic.files_loaded
    }

    pub fn files_skipped(&self) -> usize {
        self.enrolment.files_skipped + self.biometric.files_skipped + self.demographic.files_skipped
    }
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Load every discovered file for `category`. Files parse in parallel;
/// row order stays file-then-row in discovery order. A file that fails to
/// read or parse is skipped, warned about and counted, never fatal.
pub fn load_category<T>(files: &DiscoveredFiles, category: Category) -> LoadOutcome<T>
where
    T: DeserializeOwned + Send,
{
    let per_file: Vec<(&Path, Result<Vec<T>>)> = files
        .for_category(category)
        .par_iter()
        .map(|path| (path.as_path(), read_rows::<T>(path)))
        .collect();

    let mut outcome = LoadOutcome::default();
    for (path, result) in per_file {
        match result {
            Ok(mut rows) => {
                outcome.files_loaded += 1;
                outcome.rows.append(&mut rows);
            }
            Err(e) => {
                outcome.files_skipped += 1;
                warn!("skipping {} ({}): {}", path.display(), category.as_str(), e);
            }
        }
    }
    outcome
}

/// Discover, load and normalize everything under `root`. A category with no
/// matching files yields an empty collection; callers decide whether an
/// entirely empty dataset is fatal.
pub fn load_dataset(root: impl AsRef<Path>) -> Result<Dataset> {
    let found = discover_files(&root)?;
    info!(
        enrolment = found.enrolment.len(),
        biometric = found.biometric.len(),
        demographic = found.demographic.len(),
        "discovered extract files under {}",
        root.as_ref().display()
    );

    let mut dataset = Dataset {
        enrolment: load_category(&found, Category::Enrolment),
        biometric: load_category(&found, Category::Biometric),
        demographic: load_category(&found, Category::Demographic),
    };
    crate::normalize::normalize_dataset(&mut dataset);

    info!(
        rows = dataset.total_rows(),
        files = dataset.files_loaded(),
        skipped = dataset.files_skipped(),
        "load complete"
    );
    if dataset.files_skipped() > 0 {
        warn!(
            "{} file(s) could not be read and were skipped",
            dataset.files_skipped()
        );
    }
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;

    const ENROL_HEADER: &str = "date,state,district,pincode,age_0_5,age_5_17,age_18_greater\n";

    fn write_csv(dir: &Path, name: &str, body: &str) -> Result<()> {
        fs::write(dir.join(name), body)?;
        Ok(())
    }

    #[test]
    fn concatenation_preserves_duplicates_and_row_counts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let row = "15-06-2025,Bihar,Sitamarhi,843302,1,2,3\n";
        write_csv(
            dir.path(),
            "api_data_aadhar_enrolment_a.csv",
            &format!("{ENROL_HEADER}{row}{row}"),
        )?;
        write_csv(
            dir.path(),
            "api_data_aadhar_enrolment_b.csv",
            &format!("{ENROL_HEADER}{row}"),
        )?;

        let found = discover_files(dir.path())?;
        let outcome: LoadOutcome<EnrolmentRecord> = load_category(&found, Category::Enrolment);
        // 2 + 1 rows, no implicit deduplication
        assert_eq!(outcome.rows.len(), 3);
        assert_eq!(outcome.files_loaded, 2);
        assert_eq!(outcome.files_skipped, 0);
        Ok(())
    }

    #[test]
    fn malformed_file_is_skipped_and_counted() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_csv(
            dir.path(),
            "api_data_aadhar_enrolment_good.csv",
            &format!("{ENROL_HEADER}15-06-2025,Bihar,Sitamarhi,843302,1,2,3\n"),
        )?;
        // wrong field count on the data row
        write_csv(
            dir.path(),
            "api_data_aadhar_enrolment_bad.csv",
            &format!("{ENROL_HEADER}15-06-2025,Bihar\n"),
        )?;

        let found = discover_files(dir.path())?;
        let outcome: LoadOutcome<EnrolmentRecord> = load_category(&found, Category::Enrolment);
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.files_loaded, 1);
        assert_eq!(outcome.files_skipped, 1);
        Ok(())
    }

    #[test]
    fn category_with_no_files_yields_empty_outcome() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let found = discover_files(dir.path())?;
        let outcome: LoadOutcome<UpdateRecord> = load_category(&found, Category::Biometric);
        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.files_loaded, 0);
        Ok(())
    }

    #[test]
    fn load_dataset_normalizes_states() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_csv(
            dir.path(),
            "api_data_aadhar_enrolment_x.csv",
            &format!("{ENROL_HEADER}15-06-2025,Westbengal,Howrah,711101,1,2,3\n"),
        )?;

        let dataset = load_dataset(dir.path())?;
        assert_eq!(dataset.enrolment.rows[0].state, "West Bengal");
        assert!(!dataset.is_empty());
        Ok(())
    }
}
