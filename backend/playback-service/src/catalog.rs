/// Catalog lookup
///
/// The service only reads the catalog. `JsonCatalog` loads `channels.json`
/// and `events.json` once at startup; a record that fails to parse is skipped
/// with a warning and behaves exactly like an absent record.
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::models::{ChannelRecord, EVENT_ID_PREFIX};

pub const CHANNELS_FILE: &str = "channels.json";
pub const EVENTS_FILE: &str = "events.json";

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn find(&self, id: &str) -> Option<ChannelRecord>;

    /// Channels first, then events, in file order
    async fn list(&self) -> Vec<ChannelRecord>;
}

#[derive(Debug, Default)]
pub struct JsonCatalog {
    records: Vec<ChannelRecord>,
    index: HashMap<String, usize>,
}

impl JsonCatalog {
    /// Load both catalog files from `dir`. A missing file counts as empty.
    pub fn load(dir: &Path) -> Result<Self> {
        let channels = read_optional(&dir.join(CHANNELS_FILE))?;
        let events = read_optional(&dir.join(EVENTS_FILE))?;

        let catalog = Self::from_json(channels.as_deref(), events.as_deref())?;
        info!(
            dir = %dir.display(),
            records = catalog.records.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_json(channels: Option<&str>, events: Option<&str>) -> Result<Self> {
        let mut records = Vec::new();
        if let Some(raw) = channels {
            records.extend(parse_records(raw, CHANNELS_FILE)?);
        }
        if let Some(raw) = events {
            records.extend(
                parse_records(raw, EVENTS_FILE)?
                    .into_iter()
                    .map(into_event),
            );
        }
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<ChannelRecord>) -> Self {
        let mut catalog = Self::default();

        for record in records {
            if catalog.index.contains_key(&record.id) {
                warn!(id = %record.id, "Duplicate catalog id, keeping first record");
                continue;
            }
            catalog.index.insert(record.id.clone(), catalog.records.len());
            catalog.records.push(record);
        }

        catalog
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CatalogSource for JsonCatalog {
    async fn find(&self, id: &str) -> Option<ChannelRecord> {
        self.index.get(id).map(|&i| self.records[i].clone())
    }

    async fn list(&self) -> Vec<ChannelRecord> {
        self.records.clone()
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Catalog file missing, treating as empty");
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// The file itself must be a JSON array; individual bad entries are dropped.
fn parse_records(raw: &str, source: &str) -> Result<Vec<ChannelRecord>> {
    let entries: Vec<Value> =
        serde_json::from_str(raw).with_context(|| format!("{} is not a JSON array", source))?;

    let mut records = Vec::with_capacity(entries.len());
    for (position, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<ChannelRecord>(entry) {
            Ok(record) if record.id.trim().is_empty() => {
                warn!(source, position, "Catalog record without id skipped");
            }
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(source, position, error = %e, "Unreadable catalog record skipped");
            }
        }
    }

    Ok(records)
}

fn into_event(mut record: ChannelRecord) -> ChannelRecord {
    if !record.is_event() {
        record.id = format!("{}{}", EVENT_ID_PREFIX, record.id);
    }
    record
}
