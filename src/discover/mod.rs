use anyhow::{Context, Result};
use glob::glob;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The three transaction categories the registry publishes extracts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Enrolment,
    Biometric,
    Demographic,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::Enrolment,
        Category::Biometric,
        Category::Demographic,
    ];

    /// Substring that identifies a category's extracts by file name.
    pub fn keyword(self) -> &'static str {
        match self {
            Category::Enrolment => "api_data_aadhar_enrolment",
            Category::Biometric => "api_data_aadhar_biometric",
            Category::Demographic => "api_data_aadhar_demographic",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Enrolment => "enrolment",
            Category::Biometric => "biometric",
            Category::Demographic => "demographic",
        }
    }

    pub fn from_str(s: &str) -> Option<Category> {
        match s {
            "enrolment" => Some(Category::Enrolment),
            "biometric" => Some(Category::Biometric),
            "demographic" => Some(Category::Demographic),
            _ => None,
        }
    }
}

/// CSV paths found under the scan root, one list per category.
#[derive(Debug, Default)]
pub struct DiscoveredFiles {
    pub enrolment: Vec<PathBuf>,
    pub biometric: Vec<PathBuf>,
    pub demographic: Vec<PathBuf>,
}

impl DiscoveredFiles {
    pub fn for_category(&self, category: Category) -> &[PathBuf] {
        match category {
            Category::Enrolment => &self.enrolment,
            Category::Biometric => &self.biometric,
            Category::Demographic => &self.demographic,
        }
    }

    fn push(&mut self, category: Category, path: PathBuf) {
        match category {
            Category::Enrolment => self.enrolment.push(path),
            Category::Biometric => self.biometric.push(path),
            Category::Demographic => self.demographic.push(path),
        }
    }

    pub fn total(&self) -> usize {
        self.enrolment.len() + self.biometric.len() + self.demographic.len()
    }
}

/// Recursively scan `root` for `.csv` files whose names contain one of the
/// category keywords. Entries the glob cannot read are skipped.
pub fn discover_files(root: impl AsRef<Path>) -> Result<DiscoveredFiles> {
    let pattern = format!("{}/**/*.csv", root.as_ref().display());
    let mut found = DiscoveredFiles::default();

    for entry in glob(&pattern).context("invalid glob pattern for discover_files")? {
        let path = match entry {
            Ok(p) => p,
            Err(e) => {
                debug!("cannot read glob entry: {:?}", e);
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let file_name = match path.file_name().and_then(|f| f.to_str()) {
            Some(n) => n,
            None => continue,
        };

        for category in Category::ALL {
            if file_name.contains(category.keyword()) {
                found.push(category, path.clone());
                break;
            }
        }
    }

    debug!(
        enrolment = found.enrolment.len(),
        biometric = found.biometric.len(),
        demographic = found.demographic.len(),
        "discovery complete"
    );
    Ok(found)
}
