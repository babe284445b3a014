use std::{fs, path::Path};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Last selection made against each backend, so `count` and `show` can be
/// run again without flags.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LocalState {
    pub recent: Vec<RecentEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentEntry {
    pub base_url: String,
    pub warehouse: String,
    pub date: NaiveDate,
}

impl LocalState {
    pub fn load(path: &str) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        fs::write(path, payload)?;
        Ok(())
    }

    pub fn recent_for(&self, base_url: &str) -> Option<&RecentEntry> {
        self.recent.iter().find(|entry| entry.base_url == base_url)
    }

    pub fn remember(&mut self, base_url: &str, warehouse: &str, date: NaiveDate) {
        if let Some(entry) = self.recent.iter_mut().find(|entry| entry.base_url == base_url) {
            entry.warehouse = warehouse.to_string();
            entry.date = date;
            return;
        }

        self.recent.push(RecentEntry {
            base_url: base_url.to_string(),
            warehouse: warehouse.to_string(),
            date,
        });
    }
}
