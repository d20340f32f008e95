use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Plain RGBA colour that serializes as a hex string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            3 => {
                let mut out = [0u8; 3];
                for (i, c) in digits.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    out[i] = v * 16 + v;
                }
                Some(Self::rgb(out[0], out[1], out[2]))
            }
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }

    /// Hex notation or one of a handful of CSS colour names
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.starts_with('#') {
            return Self::from_hex(s);
        }
        let hex = match s.to_ascii_lowercase().as_str() {
            "black" => "#000000",
            "white" => "#ffffff",
            "red" => "#ff0000",
            "green" => "#008000",
            "blue" => "#0000ff",
            "yellow" => "#ffff00",
            "orange" => "#ffa500",
            "purple" => "#800080",
            "grey" | "gray" => "#808080",
            _ => return None,
        };
        Self::from_hex(hex)
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Linear RGB interpolation towards `other`
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        let mix = |a: u8, b: u8| (a as f64 + t * (b as f64 - a as f64)).round() as u8;
        Self::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }
}

impl fmt::Display for SerializableColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for SerializableColor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SerializableColor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid color '{s}'")))
    }
}

/// Named colour schemes. Sequential schemes interpolate their stops, the
/// categorical ones cycle through a palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Viridis,
    Magma,
    Inferno,
    Plasma,
    Cividis,
    Turbo,
    Blues,
    Greens,
    Reds,
    Oranges,
    Purples,
    Greys,
    Observable10,
    Category10,
    Tableau10,
    Set1,
    Set2,
    Dark2,
    Paired,
    Accent,
}

pub const DEFAULT_LINEAR_SCHEME: ColorScheme = ColorScheme::Viridis;
pub const DEFAULT_CATEGORICAL_SCHEME: ColorScheme = ColorScheme::Observable10;

impl ColorScheme {
    pub fn parse(name: &str) -> Result<Self> {
        serde_json::from_value(serde_json::Value::String(name.to_ascii_lowercase()))
            .map_err(|_| MapError::Configuration(format!("unknown color scheme '{name}'")))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Viridis => "viridis",
            Self::Magma => "magma",
            Self::Inferno => "inferno",
            Self::Plasma => "plasma",
            Self::Cividis => "cividis",
            Self::Turbo => "turbo",
            Self::Blues => "blues",
            Self::Greens => "greens",
            Self::Reds => "reds",
            Self::Oranges => "oranges",
            Self::Purples => "purples",
            Self::Greys => "greys",
            Self::Observable10 => "observable10",
            Self::Category10 => "category10",
            Self::Tableau10 => "tableau10",
            Self::Set1 => "set1",
            Self::Set2 => "set2",
            Self::Dark2 => "dark2",
            Self::Paired => "paired",
            Self::Accent => "accent",
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(
            self,
            Self::Observable10
                | Self::Category10
                | Self::Tableau10
                | Self::Set1
                | Self::Set2
                | Self::Dark2
                | Self::Paired
                | Self::Accent
        )
    }

    fn stops(&self) -> &'static [&'static str] {
        match self {
            Self::Viridis => &[
                "#440154", "#482878", "#3e4989", "#31688e", "#26828e", "#1f9e89", "#35b779",
                "#6ece58", "#b5de2b", "#fde725",
            ],
            Self::Magma => &[
                "#000004", "#1c1044", "#4f127b", "#812581", "#b5367a", "#e55064", "#fb8761",
                "#fec287", "#fcfdbf",
            ],
            Self::Inferno => &[
                "#000004", "#1b0c41", "#4a0c6b", "#781c6d", "#a52c60", "#cf4446", "#ed6925",
                "#fb9b06", "#f7d13d", "#fcffa4",
            ],
            Self::Plasma => &[
                "#0d0887", "#5302a3", "#8b0aa5", "#b83289", "#db5c68", "#f48849", "#febd2a",
                "#f0f921",
            ],
            Self::Cividis => &[
                "#00224e", "#123570", "#3b496c", "#575d6d", "#707173", "#8a8678", "#a59c74",
                "#c3b369", "#e1cc55", "#fee838",
            ],
            Self::Turbo => &[
                "#23171b", "#4a58dd", "#2f9df5", "#27d7c4", "#4df884", "#95fb51", "#dedd32",
                "#ffa423", "#f65f18", "#ba2208", "#900c00",
            ],
            Self::Blues => &["#f7fbff", "#c6dbef", "#6baed6", "#2171b5", "#08306b"],
            Self::Greens => &["#f7fcf5", "#c7e9c0", "#74c476", "#238b45", "#00441b"],
            Self::Reds => &["#fff5f0", "#fcbba1", "#fb6a4a", "#cb181d", "#67000d"],
            Self::Oranges => &["#fff5eb", "#fdd0a2", "#fd8d3c", "#d94801", "#7f2704"],
            Self::Purples => &["#fcfbfd", "#dadaeb", "#9e9ac8", "#6a51a3", "#3f007d"],
            Self::Greys => &["#ffffff", "#d9d9d9", "#969696", "#525252", "#000000"],
            Self::Observable10 => &[
                "#4269d0", "#efb118", "#ff725c", "#6cc5b0", "#3ca951", "#ff8ab7", "#a463f2",
                "#97bbf5", "#9c6b4e", "#9498a0",
            ],
            Self::Category10 => &[
                "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2",
                "#7f7f7f", "#bcbd22", "#17becf",
            ],
            Self::Tableau10 => &[
                "#4e79a7", "#f28e2c", "#e15759", "#76b7b2", "#59a14f", "#edc949", "#af7aa1",
                "#ff9da7", "#9c755f", "#bab0ab",
            ],
            Self::Set1 => &[
                "#e41a1c", "#377eb8", "#4daf4a", "#984ea3", "#ff7f00", "#ffff33", "#a65628",
                "#f781bf", "#999999",
            ],
            Self::Set2 => &[
                "#66c2a5", "#fc8d62", "#8da0cb", "#e78ac3", "#a6d854", "#ffd92f", "#e5c494",
                "#b3b3b3",
            ],
            Self::Dark2 => &[
                "#1b9e77", "#d95f02", "#7570b3", "#e7298a", "#66a61e", "#e6ab02", "#a6761d",
                "#666666",
            ],
            Self::Paired => &[
                "#a6cee3", "#1f78b4", "#b2df8a", "#33a02c", "#fb9a99", "#e31a1c", "#fdbf6f",
                "#ff7f00", "#cab2d6", "#6a3d9a", "#ffff99", "#b15928",
            ],
            Self::Accent => &[
                "#7fc97f", "#beaed4", "#fdc086", "#ffff99", "#386cb0", "#f0027f", "#bf5b17",
                "#666666",
            ],
        }
    }

    fn stop(&self, i: usize) -> SerializableColor {
        let stops = self.stops();
        SerializableColor::from_hex(stops[i % stops.len()]).unwrap_or(SerializableColor::rgb(0, 0, 0))
    }

    /// Colour at position `t` in [0, 1] along the scheme's ramp
    pub fn interpolate(&self, t: f64) -> SerializableColor {
        let stops = self.stops();
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let segs = (stops.len() - 1) as f64;
        let x = t * segs;
        let i = x.floor() as usize;
        if i >= stops.len() - 1 {
            return self.stop(stops.len() - 1);
        }
        self.stop(i).lerp(&self.stop(i + 1), x - i as f64)
    }

    /// The `index`-th categorical colour, cycling through the palette
    pub fn ordinal(&self, index: usize) -> SerializableColor {
        self.stop(index)
    }

    /// `n` evenly spaced samples of the ramp, for legends
    pub fn sample(&self, n: usize) -> Vec<SerializableColor> {
        match n {
            0 => Vec::new(),
            1 => vec![self.interpolate(0.0)],
            _ => (0..n)
                .map(|i| self.interpolate(i as f64 / (n - 1) as f64))
                .collect(),
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let c = SerializableColor::from_hex("#DD0000").unwrap();
        assert_eq!(c, SerializableColor::rgb(0xdd, 0, 0));
        assert_eq!(c.to_hex(), "#dd0000");
        assert_eq!(SerializableColor::from_hex("#fff").unwrap().to_hex(), "#ffffff");
        assert_eq!(
            SerializableColor::from_hex("#00000080").unwrap(),
            SerializableColor::new(0, 0, 0, 128)
        );
        assert!(SerializableColor::from_hex("red").is_none());
        assert_eq!(SerializableColor::parse("Red"), Some(SerializableColor::rgb(255, 0, 0)));
        assert_eq!(SerializableColor::parse("#00f"), Some(SerializableColor::rgb(0, 0, 255)));
        assert_eq!(SerializableColor::parse("chartreuse-ish"), None);
    }

    #[test]
    fn test_interpolate_endpoints() {
        assert_eq!(ColorScheme::Viridis.interpolate(0.0).to_hex(), "#440154");
        assert_eq!(ColorScheme::Viridis.interpolate(1.0).to_hex(), "#fde725");
        assert_eq!(ColorScheme::Viridis.interpolate(7.0).to_hex(), "#fde725");
        assert_eq!(ColorScheme::Viridis.interpolate(f64::NAN).to_hex(), "#440154");
    }

    #[test]
    fn test_ordinal_cycles() {
        let s = ColorScheme::Observable10;
        assert_eq!(s.ordinal(0), s.ordinal(10));
        assert_ne!(s.ordinal(0), s.ordinal(1));
    }

    #[test]
    fn test_parse_scheme() {
        assert_eq!(ColorScheme::parse("Viridis").unwrap(), ColorScheme::Viridis);
        assert_eq!(ColorScheme::parse("observable10").unwrap(), ColorScheme::Observable10);
        assert!(ColorScheme::Tableau10.is_categorical());
        assert!(!ColorScheme::Magma.is_categorical());
        assert!(matches!(
            ColorScheme::parse("rainbow-unicorn"),
            Err(MapError::Configuration(_))
        ));
    }
}
