//! Bullet server configuration
//!
//! Loaded from JSON and validated before it is applied; a rejected config
//! never reaches a running server.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_MAX_COLLISIONS, DEFAULT_POOL_SIZE};
use crate::error::{DanmakuError, Result};
use crate::sim::geometry::Rect;

/// How the play-area rect is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlayAreaMode {
    /// Viewport rect grown by the margin, refreshed every tick
    #[default]
    Viewport,
    /// Fixed rect from the config
    Manual,
    /// No bounds
    Infinite,
}

impl PlayAreaMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayAreaMode::Viewport => "Viewport",
            PlayAreaMode::Manual => "Manual",
            PlayAreaMode::Infinite => "Infinite",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "viewport" => Some(PlayAreaMode::Viewport),
            "manual" | "manual_rect" => Some(PlayAreaMode::Manual),
            "infinite" => Some(PlayAreaMode::Infinite),
            _ => None,
        }
    }
}

/// Server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Number of preallocated bullet slots
    pub pool_size: usize,
    /// Server-wide bullet lifetime in seconds (0 = unbounded)
    pub max_lifetime: f32,
    /// Pop bullets whose shape query returns any hit
    pub pop_on_collide: bool,
    /// Cap on shape-query results per bullet
    pub max_collisions_per_bullet: usize,

    // === Play area ===
    pub play_area_mode: PlayAreaMode,
    /// Fixed rect (manual mode)
    pub play_area_rect: Rect,
    /// Grow applied to the viewport rect (viewport mode)
    pub play_area_margin: f32,
    /// Keep out-of-area bullets that are heading into the area
    pub play_area_allow_incoming: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            max_lifetime: 0.0,
            pop_on_collide: true,
            max_collisions_per_bullet: DEFAULT_MAX_COLLISIONS,

            play_area_mode: PlayAreaMode::Viewport,
            play_area_rect: Rect::default(),
            play_area_margin: 0.0,
            play_area_allow_incoming: true,
        }
    }
}

impl ServerConfig {
    /// Check every field; the first problem found is reported
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(invalid("pool_size must be at least 1"));
        }
        if !self.max_lifetime.is_finite() || self.max_lifetime < 0.0 {
            return Err(invalid(format!(
                "max_lifetime must be finite and >= 0, got {}",
                self.max_lifetime
            )));
        }
        if self.max_collisions_per_bullet == 0 {
            return Err(invalid("max_collisions_per_bullet must be at least 1"));
        }
        if !self.play_area_margin.is_finite() {
            return Err(invalid("play_area_margin must be finite"));
        }
        if self.play_area_mode == PlayAreaMode::Manual && !self.play_area_rect.is_valid() {
            return Err(invalid(format!(
                "manual play area needs a finite rect with positive size, got {:?}",
                self.play_area_rect
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ServerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded server config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn invalid(msg: impl Into<String>) -> DanmakuError {
    DanmakuError::InvalidConfiguration(msg.into())
}
