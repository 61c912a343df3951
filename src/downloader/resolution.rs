// Resolution helpers
//
// Renditions describe their size as a "WxH" string. Everything that orders
// or labels renditions goes through these two functions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse quality bucket for a vertical resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    Sd,
    Hd720,
    Hd1080,
    Qhd,
    Uhd4k,
    Uhd8k,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uhd8k => "8K",
            Self::Uhd4k => "4K",
            Self::Qhd => "2K",
            Self::Hd1080 => "1080p",
            Self::Hd720 => "720p",
            Self::Sd => "SD",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vertical resolution of a "WxH" string.
///
/// Returns 0 when the value is missing, does not split into exactly two
/// parts on `x`, or the height part is not an integer.
pub fn height_of(resolution: Option<&str>) -> i64 {
    let Some(resolution) = resolution else {
        return 0;
    };

    let parts: Vec<&str> = resolution.split('x').collect();
    if parts.len() != 2 {
        return 0;
    }

    parts[1].trim().parse().unwrap_or(0)
}

/// Thresholds are checked highest first
pub fn tier_of(height: i64) -> QualityTier {
    if height >= 4320 {
        QualityTier::Uhd8k
    } else if height >= 2160 {
        QualityTier::Uhd4k
    } else if height >= 1440 {
        QualityTier::Qhd
    } else if height >= 1080 {
        QualityTier::Hd1080
    } else if height >= 720 {
        QualityTier::Hd720
    } else {
        QualityTier::Sd
    }
}
