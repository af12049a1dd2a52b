use crate::ingest;
use crate::table::DataTable;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// A loaded dataset with the label it was loaded under.
#[derive(Debug)]
pub struct Dataset {
    pub label: String,
    pub table: DataTable,
}

/// Per-session dataset slot.
///
/// Operations take a snapshot before reading, so replacing the dataset
/// mid-stream never gives a reader a half-swapped view. Running with no
/// dataset loaded is an operation-level error, not a panic.
#[derive(Debug, Default)]
pub struct SessionContext {
    dataset: Option<Arc<Dataset>>,
}

impl SessionContext {
    pub fn new() -> Self {
        SessionContext::default()
    }

    /// Load a CSV file and make it the session dataset.
    pub fn load_csv(&mut self, path: &Path) -> Result<Arc<Dataset>> {
        let table = ingest::load_csv(path)?;
        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(self.replace(Dataset { label, table }))
    }

    /// Swap in an already-built dataset, returning the new snapshot.
    pub fn replace(&mut self, dataset: Dataset) -> Arc<Dataset> {
        let handle = Arc::new(dataset);
        self.dataset = Some(Arc::clone(&handle));
        handle
    }

    pub fn clear(&mut self) {
        self.dataset = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.dataset.is_some()
    }

    /// Stable view of the current dataset, if one is loaded.
    pub fn snapshot(&self) -> Option<Arc<Dataset>> {
        self.dataset.as_ref().map(Arc::clone)
    }
}
