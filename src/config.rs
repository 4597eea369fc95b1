// src/config.rs
//
// Layered configuration: built-in defaults → YAML file → explicit overrides.
// Each layer is a YAML value; mappings merge key by key and the later layer
// wins. The merged value is deserialized once and validated before any frame
// is processed.

use crate::pipeline::registry::PassKind;
use crate::types::{Config, FilterConfig};
use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("unknown pass `{name}` in `{field}`")]
    UnknownPass { field: String, name: String },

    #[error("unknown variant `{0}`")]
    UnknownVariant(String),

    #[error("malformed override `{0}` (expected dotted.key=value)")]
    MalformedOverride(String),

    #[error("failed to deserialize merged configuration: {0}")]
    Deserialize(#[from] serde_yaml::Error),
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// The offending configuration key, when the error names one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Invalid { field, .. } | Self::UnknownPass { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl Config {
    /// Load a single YAML file on top of the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = read_yaml(path.as_ref())?;
        let config = Self::layered(Some(file), Value::Null)?;
        Ok(config)
    }

    /// Merge defaults, an optional file layer and an override layer.
    pub fn layered(file: Option<Value>, overrides: Value) -> Result<Self, ConfigError> {
        let mut merged = serde_yaml::to_value(Config::default())?;
        if let Some(file) = file {
            merge_values(&mut merged, file);
        }
        merge_values(&mut merged, overrides);
        let config: Config = serde_yaml::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Produce the configuration of a named variant: this config with the
    /// variant's overlay merged on top.
    pub fn variant(&self, name: &str) -> Result<Self, ConfigError> {
        let overlay = self
            .variants
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownVariant(name.to_string()))?;

        let mut base = self.clone();
        base.variants.clear();
        let mut merged = serde_yaml::to_value(base)?;
        merge_values(&mut merged, overlay);
        let config: Config = serde_yaml::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Setup-time checks. Errors name the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let k = &self.kinematics;
        if !(k.fps.is_finite() && k.fps > 0.0) {
            return Err(ConfigError::invalid(
                "kinematics.fps",
                format!("must be positive, got {}", k.fps),
            ));
        }
        if !(0.0..=1.0).contains(&k.confidence_threshold) {
            return Err(ConfigError::invalid(
                "kinematics.confidence_threshold",
                format!("must be within [0, 1], got {}", k.confidence_threshold),
            ));
        }
        validate_filter(&k.filter)?;

        if let Some(height) = self.subject.height_m {
            if !(height.is_finite() && height > 0.0) {
                return Err(ConfigError::invalid(
                    "subject.height_m",
                    format!("must be positive, got {}", height),
                ));
            }
        }
        if let Some(px) = self.subject.reference_pixel_height {
            if !(px.is_finite() && px > 0.0) {
                return Err(ConfigError::invalid(
                    "subject.reference_pixel_height",
                    format!("must be positive, got {}", px),
                ));
            }
        }

        let trails_enabled = self.visuals.trail.enabled || self.visuals.glow_trail.enabled;
        if trails_enabled {
            if self.trail.points.is_empty() {
                return Err(ConfigError::invalid(
                    "trail.points",
                    "at least one point is required when a trail pass is enabled",
                ));
            }
            for id in &self.trail.points {
                let (capacity, max_age) = self.trail.limits_for(*id);
                if capacity == 0 {
                    return Err(ConfigError::invalid(
                        &format!("trail.capacity ({})", id.as_str()),
                        "must be positive",
                    ));
                }
                if max_age == 0 {
                    return Err(ConfigError::invalid(
                        &format!("trail.max_age_frames ({})", id.as_str()),
                        "must be positive",
                    ));
                }
            }
        }

        for name in &self.visuals.order {
            if PassKind::from_name(name).is_none() {
                return Err(ConfigError::UnknownPass {
                    field: "visuals.order".to_string(),
                    name: name.clone(),
                });
            }
        }

        let heatmap = &self.visuals.heatmap;
        if heatmap.enabled && heatmap.max_speed <= heatmap.min_speed {
            return Err(ConfigError::invalid(
                "visuals.heatmap.max_speed",
                format!(
                    "must exceed min_speed ({} <= {})",
                    heatmap.max_speed, heatmap.min_speed
                ),
            ));
        }
        let vectors = &self.visuals.vectors;
        if vectors.enabled && vectors.max_length < vectors.min_length {
            return Err(ConfigError::invalid(
                "visuals.vectors.max_length",
                "must not be below min_length",
            ));
        }
        let hud = &self.visuals.hud;
        if hud.enabled && !(hud.gauge_max_speed.is_finite() && hud.gauge_max_speed > 0.0) {
            return Err(ConfigError::invalid(
                "visuals.hud.gauge_max_speed",
                format!("must be positive, got {}", hud.gauge_max_speed),
            ));
        }
        if hud.enabled && !(hud.angular_gauge_max.is_finite() && hud.angular_gauge_max > 0.0) {
            return Err(ConfigError::invalid(
                "visuals.hud.angular_gauge_max",
                format!("must be positive, got {}", hud.angular_gauge_max),
            ));
        }

        Ok(())
    }
}

pub fn validate_filter(filter: &FilterConfig) -> Result<(), ConfigError> {
    match *filter {
        FilterConfig::Ema { alpha } => {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(ConfigError::invalid(
                    "kinematics.filter.alpha",
                    format!("must be within (0, 1], got {}", alpha),
                ));
            }
        }
        FilterConfig::SavitzkyGolay { window, degree } => {
            if window % 2 == 0 {
                return Err(ConfigError::invalid(
                    "kinematics.filter.window",
                    format!("must be odd, got {}", window),
                ));
            }
            if degree >= window {
                return Err(ConfigError::invalid(
                    "kinematics.filter.degree",
                    format!("must be below window ({} >= {})", degree, window),
                ));
            }
        }
    }
    Ok(())
}

pub fn read_yaml(path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&contents)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    Ok(value)
}

/// Recursively merge `overlay` into `base`. Mappings merge per key; any other
/// overlay value (including sequences) replaces the base value. A null
/// overlay leaves the base untouched.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Explicit overrides, highest precedence. Built from CLI flags and
/// `dotted.key=value` assignments.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    root: Mapping,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value at a dotted path, creating intermediate mappings.
    pub fn set(&mut self, dotted_key: &str, value: Value) {
        let mut parts = dotted_key.split('.').peekable();
        let mut current = &mut self.root;
        while let Some(part) = parts.next() {
            let key = Value::String(part.to_string());
            if parts.peek().is_none() {
                current.insert(key, value);
                return;
            }
            let entry = current
                .entry(key)
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if !entry.is_mapping() {
                *entry = Value::Mapping(Mapping::new());
            }
            current = match entry {
                Value::Mapping(map) => map,
                _ => return,
            };
        }
    }

    /// Parse `dotted.key=value`; the value is read as a YAML scalar/flow node
    /// so `true`, `1.8` and `[a, b]` keep their types.
    pub fn set_assignment(&mut self, assignment: &str) -> Result<(), ConfigError> {
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedOverride(assignment.to_string()))?;
        let key = key.trim();
        if key.is_empty() || key.split('.').any(str::is_empty) {
            return Err(ConfigError::MalformedOverride(assignment.to_string()));
        }
        let value: Value = serde_yaml::from_str(raw.trim())
            .unwrap_or_else(|_| Value::String(raw.trim().to_string()));
        self.set(key, value);
        Ok(())
    }

    pub fn into_value(self) -> Value {
        if self.root.is_empty() {
            Value::Null
        } else {
            Value::Mapping(self.root)
        }
    }
}
