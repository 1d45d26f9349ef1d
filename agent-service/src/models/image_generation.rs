use serde::{Deserialize, Serialize};
use service_core::repository::{Entity, Record};

/// A text-to-image request and the file it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGeneration {
    #[serde(flatten)]
    pub record: Record,
    pub prompt: String,
    pub steps: u32,
    pub width: u32,
    pub height: u32,
    /// Path of the written PNG.
    pub output: String,
    pub duration_ms: u64,
}

impl Entity for ImageGeneration {
    const COLLECTION: &'static str = "image_generations";
    const UNIQUE_FIELDS: &'static [&'static str] = &["output"];

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }
}
