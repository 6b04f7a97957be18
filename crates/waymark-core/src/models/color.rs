use serde::{Deserialize, Serialize};

/// Number of entries in the marker palette.
pub const MARKER_COLORS_COUNT: usize = 7;

/// Fixed marker palette. Consecutive markers rotate through it so that
/// neighbours on the map are told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MarkerColor {
    Blue = 0,
    Green = 1,
    Orange = 2,
    Red = 3,
    Yellow = 4,
    Teal = 5,
    Purple = 6,
}

impl MarkerColor {
    pub const ALL: [MarkerColor; MARKER_COLORS_COUNT] = [
        MarkerColor::Blue,
        MarkerColor::Green,
        MarkerColor::Orange,
        MarkerColor::Red,
        MarkerColor::Yellow,
        MarkerColor::Teal,
        MarkerColor::Purple,
    ];

    /// Palette entry for an index. Out-of-range indices fall back to blue.
    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or(MarkerColor::Blue)
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The following palette entry, wrapping after purple.
    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % MARKER_COLORS_COUNT]
    }

    pub fn name(&self) -> &'static str {
        match self {
            MarkerColor::Blue => "blue",
            MarkerColor::Green => "green",
            MarkerColor::Orange => "orange",
            MarkerColor::Red => "red",
            MarkerColor::Yellow => "yellow",
            MarkerColor::Teal => "teal",
            MarkerColor::Purple => "purple",
        }
    }

    /// RGB hex string for UI layers.
    pub fn hex(&self) -> &'static str {
        match self {
            MarkerColor::Blue => "#2196f3",
            MarkerColor::Green => "#4caf50",
            MarkerColor::Orange => "#ff9800",
            MarkerColor::Red => "#f44336",
            MarkerColor::Yellow => "#ffeb3b",
            MarkerColor::Teal => "#009688",
            MarkerColor::Purple => "#9c27b0",
        }
    }
}

impl From<MarkerColor> for u8 {
    fn from(color: MarkerColor) -> Self {
        color as u8
    }
}

impl TryFrom<u8> for MarkerColor {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        MarkerColor::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| format!("color index {} out of range 0..{}", value, MARKER_COLORS_COUNT))
    }
}

impl std::fmt::Display for MarkerColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Colors for a batch of `count` new markers.
///
/// The first entry follows `seed` (the color of the last existing active
/// marker), or is blue when there is none. Each later entry follows the one
/// before it.
pub fn assign_colors(seed: Option<MarkerColor>, count: usize) -> Vec<MarkerColor> {
    let mut colors = Vec::with_capacity(count);
    let mut current = seed;
    for _ in 0..count {
        let color = match current {
            Some(previous) => previous.next(),
            None => MarkerColor::Blue,
        };
        colors.push(color);
        current = Some(color);
    }
    colors
}
