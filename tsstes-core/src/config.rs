use std::fs::read_to_string;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

pub const DEFAULT_LOWCOV: f64 = 10.0;
pub const DEFAULT_SPLICENOISE: f64 = 0.01;
pub const DEFAULT_PERCNOISE: f64 = 0.2;
pub const DEFAULT_HIGHNOISE: f64 = 0.005;
pub const DEFAULT_SMALLCOV: f64 = 50.0;
pub const DEFAULT_HIGHCOV: f64 = 100.0;
pub const DEFAULT_DELTA: i64 = 5;
pub const DEFAULT_WIN: i64 = 150;
pub const DEFAULT_SMALLWIN: i64 = 25;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

///
/// Tunable thresholds shared by junction admission and candidate detection.
///
/// Every field has a default, so a TOML file only needs the values it changes:
///
/// ```toml
/// win = 200
/// percnoise = 0.15
/// ```
///
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DetectionParams {
    /// minimum mean coverage of a reported (sub-)bundle
    pub lowcov: f64,
    pub splicenoise: f64,
    /// drop detection threshold on the retained coverage fraction
    pub percnoise: f64,
    pub highnoise: f64,
    /// junction coverage regime in which weaker overlapping junctions are suppressed
    pub smallcov: f64,
    pub highcov: f64,
    /// flank width for junction boundary tests, and scan step on flat coverage
    pub delta: i64,
    pub win: i64,
    pub smallwin: i64,
}

impl Default for DetectionParams {
    fn default() -> Self {
        DetectionParams {
            lowcov: DEFAULT_LOWCOV,
            splicenoise: DEFAULT_SPLICENOISE,
            percnoise: DEFAULT_PERCNOISE,
            highnoise: DEFAULT_HIGHNOISE,
            smallcov: DEFAULT_SMALLCOV,
            highcov: DEFAULT_HIGHCOV,
            delta: DEFAULT_DELTA,
            win: DEFAULT_WIN,
            smallwin: DEFAULT_SMALLWIN,
        }
    }
}

impl DetectionParams {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.win <= 0 {
            return Err(ConfigError::InvalidParameter(format!(
                "win must be positive, got {}",
                self.win
            )));
        }
        if self.smallwin <= 0 || self.smallwin >= self.win {
            return Err(ConfigError::InvalidParameter(format!(
                "smallwin must be in (0, win={}), got {}",
                self.win, self.smallwin
            )));
        }
        if self.delta <= 0 {
            return Err(ConfigError::InvalidParameter(format!(
                "delta must be positive, got {}",
                self.delta
            )));
        }

        let thresholds = [
            ("lowcov", self.lowcov),
            ("splicenoise", self.splicenoise),
            ("percnoise", self.percnoise),
            ("highnoise", self.highnoise),
            ("smallcov", self.smallcov),
            ("highcov", self.highcov),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidParameter(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        Ok(())
    }
}

impl TryFrom<&Path> for DetectionParams {
    type Error = ConfigError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let toml_str = read_to_string(path)?;
        let params: DetectionParams = toml::from_str(&toml_str)?;
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use pretty_assertions::assert_eq;
    use rstest::*;
    use tempfile::NamedTempFile;

    #[rstest]
    fn test_defaults_are_valid() {
        let params = DetectionParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.win, 150);
        assert_eq!(params.smallwin, 25);
        assert_eq!(params.delta, 5);
    }

    #[rstest]
    fn test_partial_toml_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "win = 200\npercnoise = 0.15").unwrap();

        let params = DetectionParams::try_from(file.path()).unwrap();
        assert_eq!(params.win, 200);
        assert_eq!(params.percnoise, 0.15);
        assert_eq!(params.lowcov, DEFAULT_LOWCOV);
        assert_eq!(params.smallwin, DEFAULT_SMALLWIN);
    }

    #[rstest]
    fn test_invalid_toml_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "win = \"wide\"").unwrap();
        assert!(matches!(
            DetectionParams::try_from(file.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    #[rstest]
    fn test_missing_file_is_an_error() {
        let result = DetectionParams::try_from(Path::new("does/not/exist.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[rstest]
    #[case(DetectionParams { win: 0, ..Default::default() })]
    #[case(DetectionParams { smallwin: 150, ..Default::default() })]
    #[case(DetectionParams { delta: 0, ..Default::default() })]
    #[case(DetectionParams { lowcov: -1.0, ..Default::default() })]
    #[case(DetectionParams { percnoise: f64::NAN, ..Default::default() })]
    fn test_validation_rejects(#[case] params: DetectionParams) {
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InvalidParameter(_))
        ));
    }
}
