use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::EngineError;

/// Engine limits and switches. Every key is optional in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Operand stack capacity, in values.
    pub stack_size: usize,
    pub object_capacity: usize,
    /// First slot scanned when a program is created without an explicit slot.
    pub program_slots_start: usize,
    pub max_class_depth: usize,
    /// Nested SEND/PASS depth.
    pub max_call_depth: usize,
    /// Fault on messages without a handler instead of ignoring them.
    pub strict_dispatch: bool,
    /// Reuse one linked class per class id.
    pub share_thunks: bool,
    /// Decoded resources kept in memory; 0 disables the cache.
    pub resource_cache: usize,
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stack_size: 4096,
            object_capacity: 2048,
            program_slots_start: 2000,
            max_class_depth: 16,
            max_call_depth: 64,
            strict_dispatch: false,
            share_thunks: true,
            resource_cache: 0,
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        let cfg: EngineConfig = toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.stack_size < 16 {
            return Err(EngineError::Config(format!("stack_size {} is below 16", self.stack_size)));
        }
        if self.object_capacity == 0 {
            return Err(EngineError::Config("object_capacity must be positive".into()));
        }
        if self.program_slots_start >= self.object_capacity {
            return Err(EngineError::Config(format!(
                "program_slots_start {} is not below object_capacity {}",
                self.program_slots_start, self.object_capacity
            )));
        }
        if self.max_class_depth == 0 || self.max_call_depth == 0 {
            return Err(EngineError::Config("depth limits must be positive".into()));
        }
        Ok(())
    }
}
