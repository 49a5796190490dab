//! JSON configuration file for a run.

use crate::domain::filter::CallFilter;
use crate::domain::render::{OutputDetail, RenderOptions};
use anyhow::{Context as _, Result, ensure};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Entry list: `Class`, `Class:method` or `Class:lineNumber`, optionally
    /// with a ` start-end` depth-0 line window.
    pub entry_methods: Vec<String>,
    pub ignore: IgnoreConfig,
    pub output: OutputConfig,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct IgnoreConfig {
    /// Gate for the per-edge ignore rules below.
    pub support_ignore: bool,
    pub entry_method_prefixes: Vec<String>,
    pub full_method_prefixes: Vec<String>,
    pub class_keywords: Vec<String>,
    pub method_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub detail: OutputDetail,
    pub show_caller_line: bool,
    pub show_annotations: bool,
    pub dedup_callee_in_caller: bool,
    /// Expand multi-implementation dispatch points inline instead of
    /// deferring them to separate artifacts in a later wave.
    pub multi_impl_in_place: bool,
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            detail: OutputDetail::default(),
            show_caller_line: false,
            show_annotations: false,
            dedup_callee_in_caller: false,
            multi_impl_in_place: false,
            dir: PathBuf::from("call-chain-output"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Maximum worker threads per wave; the pool never exceeds this.
    pub threads: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { threads: 4 }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse configuration {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.entry_methods.is_empty(),
            "the configuration lists no entry methods"
        );
        ensure!(self.pool.threads > 0, "pool.threads must be positive");
        Ok(())
    }

    pub fn call_filter(&self) -> CallFilter {
        CallFilter {
            support_ignore: self.ignore.support_ignore,
            entry_method_prefixes: self.ignore.entry_method_prefixes.clone(),
            full_method_prefixes: self.ignore.full_method_prefixes.clone(),
            class_keywords: self.ignore.class_keywords.clone(),
            method_prefixes: self.ignore.method_prefixes.clone(),
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            detail: self.output.detail,
            show_caller_line: self.output.show_caller_line,
            show_annotations: self.output.show_annotations,
            dedup_callee_in_caller: self.output.dedup_callee_in_caller,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config: AppConfig =
            serde_json::from_str(r#"{"entry_methods": ["Service1:test1"]}"#).unwrap();
        assert_eq!(config.entry_methods.len(), 1);
        assert_eq!(config.pool.threads, 4);
        assert_eq!(config.output.detail, OutputDetail::Full);
        assert!(!config.output.multi_impl_in_place);
        config.validate().unwrap();
    }

    #[test]
    fn test_full_config() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "entry_methods": ["Service1:test1 10-20", "Service2"],
                "ignore": {
                    "support_ignore": true,
                    "full_method_prefixes": ["java.lang."],
                    "class_keywords": ["Mock"],
                    "method_prefixes": ["toString("]
                },
                "output": {
                    "detail": "simple",
                    "show_caller_line": true,
                    "show_annotations": true,
                    "dedup_callee_in_caller": true,
                    "multi_impl_in_place": false,
                    "dir": "out"
                },
                "pool": {"threads": 8}
            }"#,
        )
        .unwrap();
        assert_eq!(config.output.detail, OutputDetail::Simple);
        assert!(config.call_filter().support_ignore);
        assert!(config.render_options().dedup_callee_in_caller);
        assert_eq!(config.pool.threads, 8);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_json::from_str::<AppConfig>(r#"{"entry": []}"#).is_err());
    }

    #[test]
    fn test_validation() {
        let empty = AppConfig::default();
        assert!(empty.validate().is_err());
    }
}
