use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::Result,
    observation::{parse_history, Observation},
};

/// Where observations come from, newest first.
pub trait DataSource: Send + Sync {
    fn observations(&self) -> Result<Vec<Observation>>;
}

impl DataSource for Vec<Observation> {
    fn observations(&self) -> Result<Vec<Observation>> {
        Ok(self.clone())
    }
}

/// Reads the history from a text file of digits separated by whitespace or commas, newest
/// first. The file is read again on every call.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DataSource for FileSource {
    fn observations(&self) -> Result<Vec<Observation>> {
        let text = fs::read_to_string(&self.path)?;
        Ok(parse_history(&text)?)
    }
}
