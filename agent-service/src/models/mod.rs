pub mod agent_run;
pub mod image_generation;

pub use agent_run::AgentRun;
pub use image_generation::ImageGeneration;
