//! Configuration types.

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model-API selector name. Empty string resolves the registry default.
    pub model_api: String,
    /// Maximum nesting depth for sub-task frames (root = 0).
    pub max_depth: u32,
    /// Maximum think/act steps per frame (0 = unbounded).
    pub max_steps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_api: String::new(),
            max_depth: 10,
            max_steps: 10,
        }
    }
}
