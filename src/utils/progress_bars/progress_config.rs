// src/utils/progress_bars/progress_config.rs

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::utils::env::{parse_var, process_env};

const BAR_TEMPLATE: &str = "  {spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";
const BAR_CHARS: &str = "█▉▊▋▌▍▎▏  ";

/// Configuration for progress tracking throughout the pipeline
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to show progress bars at all
    pub enabled: bool,
    /// Whether to show per-stage bars under the overall bar
    pub detailed: bool,
    /// Whether to log process memory after each stage
    pub show_memory: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed: true,
            show_memory: true,
        }
    }
}

impl ProgressConfig {
    /// Create progress configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Self {
            enabled: parse_var(&lookup, "PROGRESS_ENABLED", d.enabled),
            detailed: parse_var(&lookup, "PROGRESS_DETAILED", d.detailed),
            show_memory: parse_var(&lookup, "PROGRESS_SHOW_MEMORY", d.show_memory),
        }
    }

    /// Create a MultiProgress instance if progress is enabled, None otherwise
    pub fn create_multi_progress(&self) -> Option<MultiProgress> {
        if self.enabled {
            Some(MultiProgress::new())
        } else {
            None
        }
    }

    /// Check if detailed progress should be shown
    pub fn should_show_detailed(&self) -> bool {
        self.enabled && self.detailed
    }

    /// Check if memory usage should be shown
    pub fn should_show_memory(&self) -> bool {
        self.enabled && self.show_memory
    }
}

/// Adds a styled bar of `len` steps to `multi_progress`, if there is one.
pub fn stage_bar(multi_progress: Option<&MultiProgress>, len: u64, message: &str) -> Option<ProgressBar> {
    let mp = multi_progress?;
    let pb = mp.add(ProgressBar::new(len));
    if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
        pb.set_style(style.progress_chars(BAR_CHARS));
    }
    pb.set_message(message.to_string());
    Some(pb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProgressConfig::default();
        assert!(config.enabled);
        assert!(config.detailed);
        assert!(config.show_memory);
    }

    #[test]
    fn test_lookup_config() {
        let config = ProgressConfig::from_lookup(|key| match key {
            "PROGRESS_ENABLED" => Some("false".to_string()),
            "PROGRESS_SHOW_MEMORY" => Some("false".to_string()),
            _ => None,
        });
        assert!(!config.enabled);
        assert!(config.detailed);
        assert!(!config.show_memory);
    }

    #[test]
    fn test_multi_progress_creation() {
        let mut config = ProgressConfig::default();

        config.enabled = true;
        assert!(config.create_multi_progress().is_some());

        config.enabled = false;
        assert!(config.create_multi_progress().is_none());
        assert!(stage_bar(None, 10, "idle").is_none());
    }

    #[test]
    fn test_should_show_methods() {
        let mut config = ProgressConfig::default();
        assert!(config.should_show_detailed());
        assert!(config.should_show_memory());

        config.enabled = false;
        assert!(!config.should_show_detailed());
        assert!(!config.should_show_memory());

        config.enabled = true;
        config.detailed = false;
        config.show_memory = false;
        assert!(!config.should_show_detailed());
        assert!(!config.should_show_memory());
    }

    #[test]
    fn test_stage_bar_is_attached() {
        let mp = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        let pb = stage_bar(Some(&mp), 5, "Signing...").unwrap();
        pb.inc(2);
        assert_eq!(pb.position(), 2);
        assert_eq!(pb.length(), Some(5));
    }
}
