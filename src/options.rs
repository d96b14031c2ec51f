//! Option parsing and validation
//!
//! Every value is checked on its own before any image I/O happens, so a bad
//! command line never touches the input or output files.

use std::fmt;
use std::str::FromStr;

use crate::{AutocolorError, AutocolorResult};

/// Default percentage clipped at the dark end of the histogram
pub const DEFAULT_CLIP_LOW: f32 = 0.1;

/// How each channel's mean is moved toward the neutral gray target
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Method {
    /// Power-law correction per channel: `v' = v^(1/gamma)`
    #[default]
    Gamma,
    /// Linear scaling per channel through a diagonal color matrix
    Recolor,
    /// No mean correction, only the contrast stretch
    None,
}

impl Method {
    pub const NAMES: [&'static str; 3] = ["gamma", "recolor", "none"];
}

impl FromStr for Method {
    type Err = AutocolorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gamma" => Ok(Method::Gamma),
            "recolor" => Ok(Method::Recolor),
            "none" => Ok(Method::None),
            _ => Err(AutocolorError::invalid_option(
                "method",
                s,
                format!("expected one of {}", Method::NAMES.join(", ")),
            )),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Gamma => "gamma",
            Method::Recolor => "recolor",
            Method::None => "none",
        };
        f.write_str(name)
    }
}

/// Whether the contrast stretch runs per channel or on the recombined image
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ClipMode {
    /// One pair of bounds, shared by all channels
    #[default]
    Together,
    /// Independent bounds for each of R, G and B
    Separate,
}

impl ClipMode {
    pub const NAMES: [&'static str; 2] = ["together", "separate"];
}

impl FromStr for ClipMode {
    type Err = AutocolorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "together" => Ok(ClipMode::Together),
            "separate" => Ok(ClipMode::Separate),
            _ => Err(AutocolorError::invalid_option(
                "clipmode",
                s,
                format!("expected one of {}", ClipMode::NAMES.join(", ")),
            )),
        }
    }
}

impl fmt::Display for ClipMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClipMode::Together => "together",
            ClipMode::Separate => "separate",
        })
    }
}

/// Parse a percentage in `[0, 100]`
///
/// `name` only feeds the error message.
pub fn parse_percent(name: &'static str, text: &str) -> AutocolorResult<f32> {
    let value: f32 = text
        .trim()
        .parse()
        .map_err(|_| AutocolorError::invalid_option(name, text, "not a number"))?;
    check_percent(name, value)
}

fn check_percent(name: &'static str, value: f32) -> AutocolorResult<f32> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(AutocolorError::invalid_option(
            name,
            value.to_string(),
            "must be a value between 0 and 100",
        ));
    }
    Ok(value)
}

/// Validated processing options
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Options {
    pub method: Method,
    pub clip_mode: ClipMode,
    /// Percent of samples clipped to black
    pub clip_low: f32,
    /// Percent of samples clipped to white
    pub clip_high: f32,
    /// Target mean on the 0-100 scale; the luminance mean when unset
    pub neutral_gray: Option<f32>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            method: Method::default(),
            clip_mode: ClipMode::default(),
            clip_low: DEFAULT_CLIP_LOW,
            clip_high: DEFAULT_CLIP_LOW,
            neutral_gray: None,
        }
    }
}

impl Options {
    /// Build options, falling back to `clip_low` when `clip_high` is unset
    ///
    /// # Errors
    ///
    /// Returns [`AutocolorError::InvalidOption`] if any percentage lies
    /// outside `[0, 100]`.
    pub fn new(
        method: Method,
        clip_mode: ClipMode,
        clip_low: f32,
        clip_high: Option<f32>,
        neutral_gray: Option<f32>,
    ) -> AutocolorResult<Self> {
        let options = Options {
            method,
            clip_mode,
            clip_low,
            clip_high: clip_high.unwrap_or(clip_low),
            neutral_gray,
        };
        options.validate()?;
        Ok(options)
    }

    /// Check that every percentage lies in `[0, 100]`
    pub fn validate(&self) -> AutocolorResult<()> {
        check_percent("cliplow", self.clip_low)?;
        check_percent("cliphigh", self.clip_high)?;
        if let Some(gray) = self.neutral_gray {
            check_percent("neutralgray", gray)?;
        }
        Ok(())
    }
}
