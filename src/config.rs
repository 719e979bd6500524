//! YAML filter-chain configuration.
//!
//! ```yaml
//! filters:
//!   - type: levels
//!     min_in: 0.1
//!     max_in: 0.9
//!     gamma: 1.2
//!   - type: polar_pixellate
//!     fractional_size: [0.05, 0.05]
//!   - type: vignette
//!     colour: [0.0, 0.0, 0.0]
//!     start: 0.3
//!     end: 0.75
//! ```
//!
//! Omitted fields fall back to the filter defaults.

use crate::filters::{Filter, FilterStage, LevelsFilter, PolarPixellateFilter, VignetteFilter};
use anyhow::{Context, Result};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("invalid filter configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("parsing config {:?}", path))
    }

    /// One stage per configured filter, in order.
    pub fn stages(&self) -> Vec<FilterStage> {
        self.filters.iter().map(|f| FilterStage::new(f.build())).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterConfig {
    Levels(LevelsConfig),
    PolarPixellate(PolarPixellateConfig),
    Vignette(VignetteConfig),
}

impl FilterConfig {
    pub fn build(&self) -> Box<dyn Filter> {
        match self {
            FilterConfig::Levels(c) => Box::new(LevelsFilter::new(c.min_in, c.max_in, c.gamma, c.min_out, c.max_out)),
            FilterConfig::PolarPixellate(c) => Box::new(PolarPixellateFilter::new(
                Vec2::from_array(c.center),
                Vec2::from_array(c.fractional_size),
            )),
            FilterConfig::Vignette(c) => Box::new(VignetteFilter::new(
                Vec2::from_array(c.center),
                Vec3::from_array(c.colour),
                c.start,
                c.end,
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LevelsConfig {
    pub min_in: f32,
    pub max_in: f32,
    pub gamma: f32,
    pub min_out: f32,
    pub max_out: f32,
}

impl Default for LevelsConfig {
    fn default() -> Self {
        Self {
            min_in: 0.0,
            max_in: 1.0,
            gamma: 1.0,
            min_out: 0.0,
            max_out: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PolarPixellateConfig {
    pub center: [f32; 2],
    pub fractional_size: [f32; 2],
}

impl Default for PolarPixellateConfig {
    fn default() -> Self {
        Self {
            center: [0.5, 0.5],
            fractional_size: [0.05, 0.05],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VignetteConfig {
    pub center: [f32; 2],
    pub colour: [f32; 3],
    pub start: f32,
    pub end: f32,
}

impl Default for VignetteConfig {
    fn default() -> Self {
        Self {
            center: [0.5, 0.5],
            colour: [0.0, 0.0, 0.0],
            start: 0.3,
            end: 0.75,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chain_with_defaults() {
        let config = Config::from_yaml(
            r#"
filters:
  - type: levels
    gamma: -1.5
    max_in: 0.8
  - type: polar_pixellate
    fractional_size: [0.1, 0.2]
  - type: vignette
    colour: [1.0, 0.0, 0.0]
"#,
        )
        .unwrap();

        assert_eq!(
            config.filters[0],
            FilterConfig::Levels(LevelsConfig { gamma: -1.5, max_in: 0.8, ..Default::default() })
        );
        assert_eq!(
            config.filters[1],
            FilterConfig::PolarPixellate(PolarPixellateConfig { center: [0.5, 0.5], fractional_size: [0.1, 0.2] })
        );
        assert_eq!(
            config.filters[2],
            FilterConfig::Vignette(VignetteConfig { colour: [1.0, 0.0, 0.0], ..Default::default() })
        );

        let stages = config.stages();
        let names: Vec<&str> = stages.iter().map(|s| s.filter().name()).collect();
        assert_eq!(names, vec!["levels", "polar_pixellate", "vignette"]);
        assert_eq!(stages[0].filter().uniforms()[0].value.as_float(), Some(0.0));
    }

    #[test]
    fn test_empty_document_has_no_filters() {
        assert!(Config::from_yaml("{}").unwrap().filters.is_empty());
    }

    #[test]
    fn test_unknown_filter_type_is_rejected() {
        assert!(Config::from_yaml("filters:\n  - type: sepia\n").is_err());
    }
}
