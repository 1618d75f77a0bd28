use crate::error::GateError;
use serde_json::Value;
use std::{fs, path::Path};
use tracing::info;

/// Class index -> human readable label.
#[derive(Debug, Clone, Default)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn from_labels(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Load a label table from disk.
    ///
    /// `.json` files use the Keras class index layout
    /// (`{"0": ["n01440764", "tench"], ...}`); anything else is read as one
    /// label per line.
    pub fn load(path: &Path) -> Result<Self, GateError> {
        let contents = fs::read_to_string(path)?;
        let set = if is_json_file(path) {
            Self::from_class_index(&contents)?
        } else {
            Self::from_lines(&contents)
        };
        info!(path = %path.display(), count = set.len(), "label table loaded");
        Ok(set)
    }

    pub fn from_lines(contents: &str) -> Self {
        let labels = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { labels }
    }

    pub fn from_class_index(contents: &str) -> Result<Self, GateError> {
        let value: Value = serde_json::from_str(contents)?;
        let Some(entries) = value.as_object() else {
            return Err(GateError::InvalidInput(
                "class index must be a JSON object".to_string(),
            ));
        };

        let mut slots: Vec<Option<String>> = vec![None; entries.len()];
        for (key, entry) in entries {
            let idx: usize = key
                .parse()
                .ok()
                .filter(|i| *i < slots.len())
                .ok_or_else(|| GateError::InvalidInput(format!("bad class index `{key}`")))?;
            let name = match entry {
                Value::Array(parts) => parts.last().and_then(Value::as_str),
                Value::String(s) => Some(s.as_str()),
                _ => None,
            }
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| GateError::InvalidInput(format!("bad label for class `{key}`")))?;
            if slots[idx].replace(name.to_string()).is_some() {
                return Err(GateError::InvalidInput(format!(
                    "class index {idx} assigned twice"
                )));
            }
        }
        // every key is in range and unique, so each slot is filled
        let labels = slots.into_iter().flatten().collect();
        Ok(Self { labels })
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        == Some(true)
}
