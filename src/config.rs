use serde::Deserialize;
use thiserror::Error;

/// Tunables for the checker, the normaliser and the coherence checker.
/// Missing keys take their default.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Highest derivative order an oracle must produce to certify a leaf.
    pub derivative_order: usize,
    /// Evaluation steps allowed per normalisation.
    pub fuel: usize,
    /// Interior points sampled when checking transport.
    pub transport_samples: usize,
    /// Relative tolerance for the continuity check on sampled derivatives.
    pub continuity_tolerance: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            derivative_order: 5,
            fuel: 100_000,
            transport_samples: 8,
            continuity_tolerance: 1e-3,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Configuration key \"{0}\" must be positive")]
    NotPositive(&'static str),
}

impl Config {
    pub fn from_toml(src: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.derivative_order == 0 {
            return Err(ConfigError::NotPositive("derivative_order"));
        }
        if self.fuel == 0 {
            return Err(ConfigError::NotPositive("fuel"));
        }
        if self.continuity_tolerance.is_nan() || self.continuity_tolerance <= 0.0 {
            return Err(ConfigError::NotPositive("continuity_tolerance"));
        }
        Ok(())
    }
}
