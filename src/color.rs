//! Nearest-color classification against a fixed named palette

use serde::{Deserialize, Serialize};

use crate::models::ColorHex;

/// Name used when no palette entry is close enough
pub const CUSTOM_COLOR_NAME: &str = "Custom";

/// Default match threshold (redmean units)
pub const DEFAULT_THRESHOLD: f64 = 50.0;

/// A named palette swatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    pub name: &'static str,
    pub rgb: (u8, u8, u8),
}

impl PaletteEntry {
    const fn new(name: &'static str, r: u8, g: u8, b: u8) -> Self {
        Self { name, rgb: (r, g, b) }
    }

    pub fn hex(&self) -> ColorHex {
        ColorHex::from_rgb(self.rgb.0, self.rgb.1, self.rgb.2)
    }
}

/// The palette offered as swatches. The first entry is the default color of new variants.
pub static PALETTE: [PaletteEntry; 16] = [
    PaletteEntry::new("Red", 0xFF, 0x00, 0x00),
    PaletteEntry::new("Black", 0x00, 0x00, 0x00),
    PaletteEntry::new("White", 0xFF, 0xFF, 0xFF),
    PaletteEntry::new("Navy", 0x00, 0x00, 0x80),
    PaletteEntry::new("Blue", 0x00, 0x00, 0xFF),
    PaletteEntry::new("Green", 0x00, 0x80, 0x00),
    PaletteEntry::new("Yellow", 0xFF, 0xFF, 0x00),
    PaletteEntry::new("Orange", 0xFF, 0xA5, 0x00),
    PaletteEntry::new("Pink", 0xFF, 0xC0, 0xCB),
    PaletteEntry::new("Purple", 0x80, 0x00, 0x80),
    PaletteEntry::new("Maroon", 0x80, 0x00, 0x00),
    PaletteEntry::new("Brown", 0xA5, 0x2A, 0x2A),
    PaletteEntry::new("Beige", 0xF5, 0xF5, 0xDC),
    PaletteEntry::new("Grey", 0x80, 0x80, 0x80),
    PaletteEntry::new("Olive", 0x80, 0x80, 0x00),
    PaletteEntry::new("Teal", 0x00, 0x80, 0x80),
];

/// A color name paired with the hex value the caller chose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorMatch {
    pub name: String,
    pub hex: ColorHex,
}

impl ColorMatch {
    /// Direct swatch selection: palette name and hex verbatim
    pub fn from_swatch(entry: &PaletteEntry) -> Self {
        Self {
            name: entry.name.to_string(),
            hex: entry.hex(),
        }
    }

    pub fn is_custom(&self) -> bool {
        self.name == CUSTOM_COLOR_NAME
    }
}

/// The default color for freshly added variants
pub fn default_color() -> ColorMatch {
    ColorMatch::from_swatch(&PALETTE[0])
}

/// Look up a swatch by name (case-insensitive)
pub fn swatch(name: &str) -> Option<&'static PaletteEntry> {
    PALETTE
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name.trim()))
}

/// Redmean perceptual distance between two colors
pub fn redmean_distance(a: (u8, u8, u8), b: (u8, u8, u8)) -> f64 {
    let (r1, g1, b1) = (a.0 as i64, a.1 as i64, a.2 as i64);
    let (r2, g2, b2) = (b.0 as i64, b.1 as i64, b.2 as i64);

    let rmean = (r1 + r2) / 2;
    let dr = r1 - r2;
    let dg = g1 - g2;
    let db = b1 - b2;

    let weighted =
        (((512 + rmean) * dr * dr) >> 8) + 4 * dg * dg + (((767 - rmean) * db * db) >> 8);
    (weighted as f64).sqrt()
}

/// Classifies free-picked colors against [`PALETTE`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classifier {
    threshold: f64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl Classifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Closest palette entry and its distance
    pub fn nearest(&self, hex: &ColorHex) -> (&'static PaletteEntry, f64) {
        let rgb = hex.rgb();
        let mut best = (&PALETTE[0], f64::INFINITY);
        for entry in PALETTE.iter() {
            let distance = redmean_distance(rgb, entry.rgb);
            if distance < best.1 {
                best = (entry, distance);
            }
        }
        best
    }

    /// Name the color, keeping the requested hex value untouched
    pub fn classify(&self, hex: &ColorHex) -> ColorMatch {
        let (entry, distance) = self.nearest(hex);
        let name = if distance < self.threshold {
            entry.name
        } else {
            CUSTOM_COLOR_NAME
        };

        tracing::debug!(hex = %hex, nearest = entry.name, distance, name, "Classified color");

        ColorMatch {
            name: name.to_string(),
            hex: hex.clone(),
        }
    }
}

/// Classify with the default threshold
pub fn classify(hex: &ColorHex) -> ColorMatch {
    Classifier::default().classify(hex)
}
