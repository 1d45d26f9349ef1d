use serde::{Deserialize, Serialize};
use service_core::repository::{Entity, Record};

/// One prompt sent to the agent runtime and the answer it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    #[serde(flatten)]
    pub record: Record,
    pub prompt: String,
    pub output: String,
    pub model: String,
    pub duration_ms: u64,
}

impl Entity for AgentRun {
    const COLLECTION: &'static str = "agent_runs";

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }
}
