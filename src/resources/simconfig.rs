//! Simulation runtime configuration.
//!
//! Loaded from an INI file. Missing keys keep their defaults.
//!
//! # Configuration File Format
//!
//! ```ini
//! [physics]
//! step_time = 0.01
//! gravity_x = 0
//! gravity_y = 0
//! gravity_z = -9.8
//!
//! [threads]
//! parallel = true
//! workers = 4
//!
//! [interfaces]
//! capacity = 65536
//! ```

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use glam::DVec3;
use log::info;
use std::path::{Path, PathBuf};

use crate::error::{Result, SimError};
use crate::events::interface::DEFAULT_CAPACITY;

/// Default safe values for startup
const DEFAULT_STEP_TIME: f64 = 0.01;
const DEFAULT_GRAVITY: DVec3 = DVec3::new(0.0, 0.0, -9.8);
const DEFAULT_PARALLEL: bool = false;
const DEFAULT_WORKERS: usize = 0;
const DEFAULT_CONFIG_PATH: &str = "./robosim.ini";

/// Simulation configuration resource.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Seconds advanced per tick.
    pub step_time: f64,
    pub gravity: DVec3,
    /// Update bodies and controllers on a worker pool.
    pub parallel: bool,
    /// Pool size; 0 lets the pool pick one worker per core.
    pub workers: usize,
    /// Interface samples kept between drains.
    pub interface_capacity: usize,
    pub config_path: PathBuf,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SimConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            step_time: DEFAULT_STEP_TIME,
            gravity: DEFAULT_GRAVITY,
            parallel: DEFAULT_PARALLEL,
            workers: DEFAULT_WORKERS,
            interface_capacity: DEFAULT_CAPACITY,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a new configuration with a custom config file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from `config_path`.
    pub fn load_from_file(&mut self) -> Result<()> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| SimError::Config(format!("Failed to load config file: {}", e)))?;
        self.apply(&config)?;
        info!(
            "Loaded config: step_time={}, gravity=({}, {}, {}), parallel={}, workers={}",
            self.step_time, self.gravity.x, self.gravity.y, self.gravity.z, self.parallel, self.workers
        );
        Ok(())
    }

    /// Load configuration from INI text.
    pub fn load_from_str(&mut self, text: &str) -> Result<()> {
        let mut config = Ini::new();
        config
            .read(text.to_string())
            .map_err(|e| SimError::Config(format!("Failed to parse config: {}", e)))?;
        self.apply(&config)
    }

    fn apply(&mut self, config: &Ini) -> Result<()> {
        // [physics] section
        if let Some(step) = config.getfloat("physics", "step_time").map_err(SimError::Config)? {
            if step <= 0.0 {
                return Err(SimError::Config(format!("step_time must be positive, got {step}")));
            }
            self.step_time = step;
        }
        if let Some(x) = config.getfloat("physics", "gravity_x").map_err(SimError::Config)? {
            self.gravity.x = x;
        }
        if let Some(y) = config.getfloat("physics", "gravity_y").map_err(SimError::Config)? {
            self.gravity.y = y;
        }
        if let Some(z) = config.getfloat("physics", "gravity_z").map_err(SimError::Config)? {
            self.gravity.z = z;
        }

        // [threads] section
        if let Some(parallel) = config.getbool("threads", "parallel").map_err(SimError::Config)? {
            self.parallel = parallel;
        }
        if let Some(workers) = config.getuint("threads", "workers").map_err(SimError::Config)? {
            self.workers = workers as usize;
        }

        // [interfaces] section
        if let Some(capacity) = config.getuint("interfaces", "capacity").map_err(SimError::Config)? {
            if capacity == 0 {
                return Err(SimError::Config("interface capacity must be positive".to_string()));
            }
            self.interface_capacity = capacity as usize;
        }
        Ok(())
    }

    /// Save configuration to `config_path`.
    pub fn save_to_file(&self) -> Result<()> {
        self.save_to(&self.config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let mut config = Ini::new();

        // [physics] section
        config.set("physics", "step_time", Some(self.step_time.to_string()));
        config.set("physics", "gravity_x", Some(self.gravity.x.to_string()));
        config.set("physics", "gravity_y", Some(self.gravity.y.to_string()));
        config.set("physics", "gravity_z", Some(self.gravity.z.to_string()));

        // [threads] section
        config.set("threads", "parallel", Some(self.parallel.to_string()));
        config.set("threads", "workers", Some(self.workers.to_string()));

        // [interfaces] section
        config.set("interfaces", "capacity", Some(self.interface_capacity.to_string()));

        config.write(path)?;
        info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_keep_defaults() {
        let mut cfg = SimConfig::new();
        cfg.load_from_str("[physics]\nstep_time = 0.002\n").unwrap();
        assert_eq!(cfg.step_time, 0.002);
        assert_eq!(cfg.gravity, DEFAULT_GRAVITY);
        assert!(!cfg.parallel);
    }

    #[test]
    fn threads_section_is_read() {
        let mut cfg = SimConfig::new();
        cfg.load_from_str("[threads]\nparallel = true\nworkers = 3\n")
            .unwrap();
        assert!(cfg.parallel);
        assert_eq!(cfg.workers, 3);
    }

    #[test]
    fn interface_capacity_is_read() {
        let mut cfg = SimConfig::new();
        assert_eq!(cfg.interface_capacity, DEFAULT_CAPACITY);
        cfg.load_from_str("[interfaces]\ncapacity = 128\n").unwrap();
        assert_eq!(cfg.interface_capacity, 128);
        assert!(matches!(
            cfg.load_from_str("[interfaces]\ncapacity = 0\n"),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn bad_values_are_config_errors() {
        let mut cfg = SimConfig::new();
        assert!(matches!(
            cfg.load_from_str("[physics]\nstep_time = fast\n"),
            Err(SimError::Config(_))
        ));
        assert!(matches!(
            cfg.load_from_str("[physics]\nstep_time = -1\n"),
            Err(SimError::Config(_))
        ));
    }
}
