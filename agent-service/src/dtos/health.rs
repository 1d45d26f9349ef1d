use serde::Serialize;
use service_core::envelope::Status;

/// State of one backing dependency.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: Status,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub version: String,
    pub db: ComponentHealth,
    pub cache: ComponentHealth,
}
