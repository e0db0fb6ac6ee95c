use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::framebuffer::{ResolutionScale, ScaleError};
use crate::util::rgb_to_bgra;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Scale(#[from] ScaleError),
}

/// Render settings, loadable from TOML. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Display width in pixels
    pub width: u32,
    /// Display height in pixels
    pub height: u32,
    /// Vertical field of view in degrees
    pub fov_degrees: f64,
    pub near: f64,
    pub far: f64,
    /// Direction the light shines from, need not be normalized
    pub light_direction: [f64; 3],
    /// Clear color as RGB
    pub background: [u8; 3],
    /// RGB used for triangles without a texture
    pub fallback_color: [u8; 3],
    /// Display to render resolution ratio: 1, 2, 4, 8 or 16
    pub scale: u32,
    /// Expand low resolution frames with one rayon task per row
    pub parallel_expand: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fov_degrees: 90.0,
            near: 0.1,
            far: 1000.0,
            light_direction: [0.0, 1.0, 1.0],
            background: [0x20, 0x20, 0x20],
            fallback_color: [255, 0, 255],
            scale: 1,
            parallel_expand: true,
        }
    }
}

impl RenderConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        log::info!("Loaded config {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "display size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "fov_degrees must be between 0 and 180, got {}",
                self.fov_degrees
            )));
        }
        if !(self.near > 0.0 && self.near < self.far && self.far.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "need 0 < near < far, got near {} and far {}",
                self.near, self.far
            )));
        }
        let [x, y, z] = self.light_direction;
        let length_squared = x * x + y * y + z * z;
        if !(length_squared > 0.0 && length_squared.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "light_direction must be a finite non-zero vector, got {:?}",
                self.light_direction
            )));
        }
        self.resolution_scale()?;
        Ok(())
    }

    pub fn resolution_scale(&self) -> Result<ResolutionScale, ScaleError> {
        ResolutionScale::try_from(self.scale)
    }

    pub fn background_bgra(&self) -> [u8; 4] {
        rgb_to_bgra(self.background)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        let config = RenderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolution_scale(), Ok(ResolutionScale::X1));
        assert_eq!(config.background_bgra(), [0x20, 0x20, 0x20, 0xFF]);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let config = RenderConfig::from_toml_str("width = 640\nscale = 4\n").unwrap();
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 720);
        assert_eq!(config.resolution_scale(), Ok(ResolutionScale::X4));
        assert_eq!(config.fallback_color, [255, 0, 255]);
    }

    #[test]
    fn rejects_invalid_values() {
        for bad in [
            "width = 0",
            "near = 10.0\nfar = 1.0",
            "near = 0.0",
            "fov_degrees = 180.0",
            "light_direction = [0.0, 0.0, 0.0]",
        ] {
            let err = RenderConfig::from_toml_str(bad).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{bad}: {err}");
        }
        assert!(matches!(
            RenderConfig::from_toml_str("scale = 3"),
            Err(ConfigError::Scale(ScaleError(3)))
        ));
        assert!(matches!(
            RenderConfig::from_toml_str("width = \"wide\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = RenderConfig::default();
        config.light_direction = [1.0, -1.0, 0.5];
        config.parallel_expand = false;
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(RenderConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "fov_degrees = 60.0").unwrap();
        writeln!(file, "background = [0, 0, 255]").unwrap();
        let config = RenderConfig::load(file.path()).unwrap();
        assert_eq!(config.fov_degrees, 60.0);
        assert_eq!(config.background_bgra(), [255, 0, 0, 255]);

        let missing = RenderConfig::load(Path::new("/nonexistent/swview.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
