use crate::core::normalizer::DateNormalizer;
use crate::domain::model::{PersistReport, RawSlotMap, ResultSet};
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;

/// Normalizes scraped availability and writes it as the published JSON file.
pub struct ResultStore<S: Storage> {
    storage: S,
    normalizer: DateNormalizer,
    path: String,
}

impl<S: Storage> ResultStore<S> {
    pub fn new(storage: S, normalizer: DateNormalizer, path: impl Into<String>) -> Self {
        Self {
            storage,
            normalizer,
            path: path.into(),
        }
    }

    /// Entries whose label cannot be normalized are logged and left out.
    pub fn build(&self, raw: &RawSlotMap, today: NaiveDate) -> (ResultSet, Vec<String>) {
        let mut entries = ResultSet::with_capacity(raw.len());
        let mut dropped = Vec::new();

        for (label, times) in raw.iter() {
            match self.normalizer.normalize_entry(label, times, today) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("⚠️ Could not process date '{}': {}", label, e);
                    dropped.push(label.to_string());
                }
            }
        }

        // Stable sort: entries sharing a date stay in reading order.
        entries.sort_by(|a, b| a.date.cmp(&b.date));

        // Two spellings of one day ("14 jul" / "14 Jul") resolve to the same
        // date; keep the one read first.
        let mut seen = HashSet::new();
        entries.retain(|entry| {
            let fresh = seen.insert(entry.date);
            if !fresh {
                tracing::warn!("duplicate date {} in scrape, keeping first", entry.date);
            }
            fresh
        });

        (entries, dropped)
    }

    pub async fn persist(&self, raw: &RawSlotMap, today: NaiveDate) -> Result<PersistReport> {
        tracing::info!("💾 Processing and saving availability as JSON...");

        let (entries, dropped) = self.build(raw, today);
        let data = to_pretty_json(&entries)?;

        tracing::debug!("Writing {} bytes to {}", data.len(), self.path);
        self.storage.write_file(&self.path, &data).await?;

        let location = self.storage.describe(&self.path);
        tracing::info!("✅ Availability saved to '{}'", location);

        Ok(PersistReport {
            path: location,
            written: entries.len(),
            dropped,
        })
    }
}

/// Four-space indented JSON; non-ASCII text is written as is.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(buffer)
}
