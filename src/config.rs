//! Session Configuration
//!
//! Defaults suit a table-top match. Every field can be overridden from
//! `SWIFTSHOT_*` environment variables or a JSON document; anything not
//! given keeps its default.

use std::time::Duration;
use serde::{Serialize, Deserialize};

use crate::core::transform::Vec3;
use crate::game::store::WorldBounds;

/// How the host answers a board location request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardLocatingMode {
    /// Send the compressed world map with the board anchor.
    #[default]
    WorldMap,
    /// Tell clients to find the surface themselves.
    Manual,
}

impl BoardLocatingMode {
    /// Parse `world_map` / `manual` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "world_map" | "worldmap" => Some(Self::WorldMap),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Coordinator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Host answer to board location requests.
    pub board_locating_mode: BoardLocatingMode,
    /// Ack round trip above which the network is reported as delayed.
    pub network_delay_threshold_ms: u64,
    /// Initial placement ignores surface hits closer than this (meters).
    pub min_surface_distance: f32,
    /// Catapults per team at game start.
    pub catapults_per_team: u32,
    /// Board height / width.
    pub board_aspect_ratio: f32,
    /// Board scale when first placed.
    pub default_board_scale: f32,
    /// Logic ticks per second.
    pub tick_rate: u32,
    /// Unacknowledged messages tracked per peer.
    pub max_pending_acks: usize,
    /// Fall-out box minimum corner.
    pub entity_bounds_min: Vec3,
    /// Fall-out box maximum corner.
    pub entity_bounds_max: Vec3,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let bounds = WorldBounds::default();
        Self {
            board_locating_mode: BoardLocatingMode::WorldMap,
            network_delay_threshold_ms: 250,
            min_surface_distance: 0.5,
            catapults_per_team: crate::DEFAULT_CATAPULTS_PER_TEAM,
            board_aspect_ratio: 1.5,
            default_board_scale: 1.0,
            tick_rate: crate::TICK_RATE,
            max_pending_acks: 256,
            entity_bounds_min: bounds.min,
            entity_bounds_max: bounds.max,
        }
    }
}

impl SessionConfig {
    /// Load overrides from `SWIFTSHOT_*` environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(mode) = env_var("SWIFTSHOT_BOARD_LOCATING_MODE")
            .and_then(|v| BoardLocatingMode::parse(&v))
        {
            config.board_locating_mode = mode;
        }
        if let Some(v) = env_parse("SWIFTSHOT_NETWORK_DELAY_THRESHOLD_MS") {
            config.network_delay_threshold_ms = v;
        }
        if let Some(v) = env_parse("SWIFTSHOT_MIN_SURFACE_DISTANCE") {
            config.min_surface_distance = v;
        }
        if let Some(v) = env_parse("SWIFTSHOT_CATAPULTS_PER_TEAM") {
            config.catapults_per_team = v;
        }
        if let Some(v) = env_parse("SWIFTSHOT_BOARD_ASPECT_RATIO") {
            config.board_aspect_ratio = v;
        }
        if let Some(v) = env_parse("SWIFTSHOT_DEFAULT_BOARD_SCALE") {
            config.default_board_scale = v;
        }
        if let Some(v) = env_parse("SWIFTSHOT_TICK_RATE") {
            config.tick_rate = v;
        }
        if let Some(v) = env_parse("SWIFTSHOT_MAX_PENDING_ACKS") {
            config.max_pending_acks = v;
        }

        config
    }

    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Delay threshold as a duration.
    pub fn network_delay_threshold(&self) -> Duration {
        Duration::from_millis(self.network_delay_threshold_ms)
    }

    /// Time between logic ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.tick_rate.max(1) as u64)
    }

    /// Fall-out box for the game state store.
    pub fn entity_bounds(&self) -> WorldBounds {
        WorldBounds {
            min: self.entity_bounds_min,
            max: self.entity_bounds_max,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|v| v.trim().parse().ok())
}
