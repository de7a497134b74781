//! Domain checks for the two constrained numeric props.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Allowed render scale.
pub const SCALE_RANGE: RangeInclusive<f64> = 0.25..=1.0;

/// Allowed frame rates.
pub const VALID_FPS: [u32; 5] = [15, 24, 30, 60, 120];

/// Check `scale` then `fps`, returning the first failure's message.
pub fn validate(scale: f64, fps: u32) -> Option<String> {
    if !SCALE_RANGE.contains(&scale) {
        return Some(format!(
            "Invalid scale: {scale}. Scale must be between 0.25 and 1.0"
        ));
    }
    if !VALID_FPS.contains(&fps) {
        let allowed: Vec<String> = VALID_FPS.iter().map(|f| f.to_string()).collect();
        return Some(format!(
            "Invalid fps: {fps}. fps must be one of {}",
            allowed.join(", ")
        ));
    }
    None
}

/// A frame rate the scene runtime accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum Fps {
    F15,
    F24,
    F30,
    F60,
    F120,
}

impl Fps {
    pub fn as_u32(self) -> u32 {
        match self {
            Fps::F15 => 15,
            Fps::F24 => 24,
            Fps::F30 => 30,
            Fps::F60 => 60,
            Fps::F120 => 120,
        }
    }
}

impl From<Fps> for u32 {
    fn from(fps: Fps) -> u32 {
        fps.as_u32()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFps(pub u32);

impl fmt::Display for InvalidFps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported frame rate: {}", self.0)
    }
}

impl TryFrom<u32> for Fps {
    type Error = InvalidFps;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            15 => Ok(Fps::F15),
            24 => Ok(Fps::F24),
            30 => Ok(Fps::F30),
            60 => Ok(Fps::F60),
            120 => Ok(Fps::F120),
            other => Err(InvalidFps(other)),
        }
    }
}
