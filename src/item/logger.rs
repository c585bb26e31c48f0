use log::info;
use serde::Serialize;

use crate::{
    core::item::{ItemWriter, ItemWriterResult},
    BatchError,
};

/// Writes every item to the log as one JSON line and stores nothing.
#[derive(Debug, Clone)]
pub struct LoggerWriter {
    label: String,
}

impl LoggerWriter {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
        }
    }
}

impl Default for LoggerWriter {
    fn default() -> Self {
        Self::new("record")
    }
}

impl<T> ItemWriter<T> for LoggerWriter
where
    T: Serialize,
{
    fn write(&self, items: &[T]) -> ItemWriterResult {
        for item in items {
            let json = serde_json::to_string(item)
                .map_err(|error| BatchError::ItemWriter(error.to_string()))?;
            info!("[{}] {}", self.label, json);
        }
        Ok(())
    }
}
