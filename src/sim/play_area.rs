//! Play-area clipping
//!
//! Bullets outside the play area are normally despawned. With
//! `allow_incoming`, a bullet outside the area survives as long as its
//! heading could still carry it into the area (segment clipping with
//! Cohen–Sutherland outcodes).

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geometry::Rect;
use crate::settings::{PlayAreaMode, ServerConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayArea {
    pub mode: PlayAreaMode,
    /// Active rect. In viewport mode this is recomputed from the viewport.
    pub rect: Rect,
    /// Grow applied to the viewport rect (viewport mode only)
    pub margin: f32,
    pub allow_incoming: bool,
}

impl Default for PlayArea {
    fn default() -> Self {
        Self {
            mode: PlayAreaMode::Viewport,
            rect: Rect::default(),
            margin: 0.0,
            allow_incoming: true,
        }
    }
}

impl PlayArea {
    pub fn manual(rect: Rect, allow_incoming: bool) -> Self {
        Self {
            mode: PlayAreaMode::Manual,
            rect,
            margin: 0.0,
            allow_incoming,
        }
    }

    pub fn infinite() -> Self {
        Self {
            mode: PlayAreaMode::Infinite,
            ..Default::default()
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            mode: config.play_area_mode,
            rect: config.play_area_rect,
            margin: config.play_area_margin,
            allow_incoming: config.play_area_allow_incoming,
        }
    }

    /// Recompute the rect from the current viewport (viewport mode only)
    pub fn update_viewport(&mut self, viewport: Rect) {
        if self.mode == PlayAreaMode::Viewport {
            self.rect = viewport.grow(self.margin);
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        match self.mode {
            PlayAreaMode::Infinite => true,
            PlayAreaMode::Viewport | PlayAreaMode::Manual => self.rect.has_point(point),
        }
    }

    /// Whether a bullet at `point` heading along `direction` may stay alive.
    ///
    /// Inside the area this is always true. Outside, it requires
    /// `allow_incoming` and that no single rect edge has both the point and
    /// a far projection along the heading on its outer side.
    pub fn trajectory_entering(&self, point: Vec2, direction: Vec2) -> bool {
        if self.mode == PlayAreaMode::Infinite {
            return true;
        }

        let clip_pos = self.rect.outcode(point);
        if clip_pos == 0 {
            return true;
        }
        if !self.allow_incoming {
            return false;
        }

        // Far enough that the projection cannot stop short of the rect
        let reach = (self.rect.center() - point).length() + self.rect.diagonal();
        let clip_dest = self.rect.outcode(point + direction * reach);

        clip_pos & clip_dest == 0
    }
}
