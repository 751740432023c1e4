//! FlexFlow project configuration.
//!
//! Handles parsing and management of `flexflow.toml` configuration files,
//! covering every option the compile API recognizes. Mirrors the shape of
//! the teacher's `neurlang.toml` handling: a default-able root struct loaded
//! from a file or discovered by walking up from a directory.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config file not found: {0}")]
    NotFound(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Execution mode: whether the compiled graph carries a backward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputationMode {
    Training,
    Inference,
}

impl Default for ComputationMode {
    fn default() -> Self {
        ComputationMode::Training
    }
}

/// Root configuration structure matching `flexflow.toml`.
///
/// Field defaults follow the "Configuration (recognized options)" list.
/// Fields this core crate doesn't act on directly (dataset paths, strategy
/// import/export, the data-loader type) are still parsed and carried so
/// that an external collaborator consuming the same config doesn't need a
/// separate schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlexFlowConfig {
    pub epochs: u32,
    pub batch_size: u32,
    pub profiling: bool,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub work_space_size: u64,
    pub num_nodes: Option<u32>,
    pub workers_per_node: u32,
    pub cpus_per_node: u32,
    pub simulator_work_space_size: u64,
    pub search_budget: Option<u64>,
    pub search_alpha: f64,
    pub search_overlap_backward_update: bool,
    pub computation_mode: ComputationMode,
    pub only_data_parallel: bool,
    pub enable_sample_parallel: bool,
    pub enable_parameter_parallel: bool,
    pub enable_attribute_parallel: bool,
    pub enable_inplace_optimizations: bool,
    pub allow_tensor_op_math_conversion: bool,
    pub perform_fusion: bool,
    pub enable_control_replication: bool,
    pub base_optimize_threshold: u32,
    pub machine_model_version: u32,
    pub simulator_segment_size: u64,
    pub simulator_max_num_segments: u32,
    pub python_data_loader_type: u32,
    pub machine_model_file: Option<String>,
    pub import_strategy_file: Option<String>,
    pub export_strategy_file: Option<String>,
    pub export_strategy_task_graph_file: Option<String>,
    pub export_strategy_computation_graph_file: Option<String>,
    pub include_costs_dot_graph: bool,
    pub dataset_path: Option<String>,
    pub substitution_json_path: Option<String>,
    pub synthetic_input: bool,

    /// Escape hatch for options this struct doesn't model explicitly yet.
    #[serde(flatten)]
    pub extra: HashMap<String, toml::Value>,
}

impl Default for FlexFlowConfig {
    fn default() -> Self {
        Self {
            epochs: 1,
            batch_size: 64,
            profiling: false,
            learning_rate: 0.01,
            weight_decay: 1e-4,
            work_space_size: 1 << 30, // 1 GiB
            num_nodes: None,          // auto from machine
            workers_per_node: 0,
            cpus_per_node: 0,
            simulator_work_space_size: 2 << 30, // 2 GiB
            search_budget: None,
            search_alpha: 1.2,
            search_overlap_backward_update: false,
            computation_mode: ComputationMode::Training,
            only_data_parallel: false,
            enable_sample_parallel: false,
            enable_parameter_parallel: false,
            enable_attribute_parallel: false,
            enable_inplace_optimizations: false,
            allow_tensor_op_math_conversion: false,
            perform_fusion: false,
            enable_control_replication: true,
            base_optimize_threshold: 10,
            machine_model_version: 0,
            simulator_segment_size: 16 << 20, // 16 MiB
            simulator_max_num_segments: 1,
            python_data_loader_type: 2,
            machine_model_file: None,
            import_strategy_file: None,
            export_strategy_file: None,
            export_strategy_task_graph_file: None,
            export_strategy_computation_graph_file: None,
            include_costs_dot_graph: false,
            dataset_path: None,
            substitution_json_path: None,
            synthetic_input: false,
            extra: HashMap::new(),
        }
    }
}

impl FlexFlowConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: FlexFlowConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Find and load configuration by searching up from the given directory
    /// for a `flexflow.toml`, falling back to defaults if none is found.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join("flexflow.toml");
            if candidate.exists() {
                return Self::load(&candidate);
            }
            if !dir.pop() {
                return Ok(Self::default());
            }
        }
    }

    /// Resolve the reset span `R` used by the MCMC search driver: `clamp(B/100, 1, 1000)`.
    pub fn reset_span(&self, budget: u64) -> u64 {
        (budget / 100).clamp(1, 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_recognized_options() {
        let cfg = FlexFlowConfig::default();
        assert_eq!(cfg.epochs, 1);
        assert_eq!(cfg.batch_size, 64);
        assert!(!cfg.profiling);
        assert_eq!(cfg.learning_rate, 0.01);
        assert_eq!(cfg.weight_decay, 1e-4);
        assert_eq!(cfg.work_space_size, 1 << 30);
        assert_eq!(cfg.search_alpha, 1.2);
        assert!(cfg.enable_control_replication);
        assert_eq!(cfg.base_optimize_threshold, 10);
    }

    #[test]
    fn parses_partial_toml_over_defaults() {
        let toml_str = r#"
            only_data_parallel = true
            search_budget = 500
        "#;
        let cfg: FlexFlowConfig = toml::from_str(toml_str).unwrap();
        assert!(cfg.only_data_parallel);
        assert_eq!(cfg.search_budget, Some(500));
        assert_eq!(cfg.batch_size, 64); // untouched default
    }

    #[test]
    fn reset_span_is_clamped() {
        let cfg = FlexFlowConfig::default();
        assert_eq!(cfg.reset_span(50), 1);
        assert_eq!(cfg.reset_span(500), 5);
        assert_eq!(cfg.reset_span(1_000_000), 1000);
    }

    #[test]
    fn missing_file_is_not_found_error() {
        let err = FlexFlowConfig::load(Path::new("/nonexistent/flexflow.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
