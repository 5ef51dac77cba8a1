//! Run configuration (spec.md §6 defaults table).

use crate::error::{Error, Result};

/// How a tear stream's guessed value is updated between sweeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TearMethod {
    /// Substitute the freshly computed value directly (§4.5.4).
    Direct,
    /// Wegstein-accelerated substitution (§4.5.5).
    Wegstein,
}

impl Default for TearMethod {
    fn default() -> Self {
        TearMethod::Direct
    }
}

impl TearMethod {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "direct" => Ok(TearMethod::Direct),
            "wegstein" => Ok(TearMethod::Wegstein),
            _ => Err(Error::InvalidOption {
                option: "tear_method",
                value: value.to_string(),
            }),
        }
    }
}

/// How the tear set is chosen when the caller does not supply one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectTearMethod {
    Heuristic,
    Mip,
}

impl Default for SelectTearMethod {
    fn default() -> Self {
        SelectTearMethod::Mip
    }
}

impl SelectTearMethod {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "heuristic" => Ok(SelectTearMethod::Heuristic),
            "mip" => Ok(SelectTearMethod::Mip),
            _ => Err(Error::InvalidOption {
                option: "select_tear_method",
                value: value.to_string(),
            }),
        }
    }
}

/// Whether a convergence tolerance is interpreted as absolute or relative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TolType {
    Absolute,
    Relative,
}

impl Default for TolType {
    fn default() -> Self {
        TolType::Absolute
    }
}

impl TolType {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "abs" => Ok(TolType::Absolute),
            "rel" => Ok(TolType::Relative),
            _ => Err(Error::InvalidOption {
                option: "tol_type",
                value: value.to_string(),
            }),
        }
    }
}

/// All knobs the convergence driver (C5) reads, mirroring spec.md §6's
/// defaults table.
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub select_tear_method: SelectTearMethod,
    pub tear_method: TearMethod,
    pub iterlim: usize,
    pub tol: f64,
    pub tol_type: TolType,
    /// Equality agreement tolerance used when both sides of an arc
    /// constraint are already fixed (§4.5.3).
    pub almost_equal_tol: f64,
    /// Wegstein acceleration factor clamp, applied elementwise (§4.5.5).
    pub accel_min: f64,
    pub accel_max: f64,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            select_tear_method: SelectTearMethod::default(),
            tear_method: TearMethod::default(),
            iterlim: 40,
            tol: 1e-5,
            tol_type: TolType::default(),
            almost_equal_tol: 1e-8,
            accel_min: -5.0,
            accel_max: 0.0,
        }
    }
}

impl RunOptions {
    /// Apply a single string-valued override, as a dynamic configuration
    /// surface (e.g. parsed from a config file or CLI flag) would. Numeric
    /// options parse with [`str::parse`]; mis-typed values and unknown
    /// option names both surface as [`Error::InvalidOption`].
    pub fn set(&mut self, option: &'static str, value: &str) -> Result<()> {
        match option {
            "select_tear_method" => self.select_tear_method = SelectTearMethod::parse(value)?,
            "tear_method" => self.tear_method = TearMethod::parse(value)?,
            "iterlim" => {
                self.iterlim = value.parse().map_err(|_| Error::InvalidOption {
                    option,
                    value: value.to_string(),
                })?
            }
            "tol" => {
                self.tol = value.parse().map_err(|_| Error::InvalidOption {
                    option,
                    value: value.to_string(),
                })?
            }
            "tol_type" => self.tol_type = TolType::parse(value)?,
            "almost_equal_tol" => {
                self.almost_equal_tol = value.parse().map_err(|_| Error::InvalidOption {
                    option,
                    value: value.to_string(),
                })?
            }
            "accel_min" => {
                self.accel_min = value.parse().map_err(|_| Error::InvalidOption {
                    option,
                    value: value.to_string(),
                })?
            }
            "accel_max" => {
                self.accel_max = value.parse().map_err(|_| Error::InvalidOption {
                    option,
                    value: value.to_string(),
                })?
            }
            _ => {
                return Err(Error::InvalidOption {
                    option: "option",
                    value: option.to_string(),
                })
            }
        }
        Ok(())
    }
}
