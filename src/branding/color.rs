use std::sync::OnceLock;

use regex::Regex;

/// Opaque sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// YIQ perceived brightness, `(299R + 587G + 114B) / 1000`.
    pub fn yiq(self) -> f64 {
        (299.0 * f64::from(self.r) + 587.0 * f64::from(self.g) + 114.0 * f64::from(self.b))
            / 1000.0
    }

    /// Near-grey, near-white, or near-black: useless as a brand color.
    pub fn is_neutral(self) -> bool {
        let (r, g, b) = (i16::from(self.r), i16::from(self.g), i16::from(self.b));
        let greyish = (r - g).abs() < 15 && (g - b).abs() < 15 && (r - b).abs() < 15;
        let white = r > 248 && g > 248 && b > 248;
        let black = r < 15 && g < 15 && b < 15;
        greyish || white || black
    }
}

/// A parsed CSS color with its alpha in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub rgb: Rgb,
    pub alpha: f64,
}

impl Color {
    pub fn is_transparent(&self) -> bool {
        self.alpha <= 0.0
    }
}

fn rgb_function() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^rgba?\(\s*([\d.]+%?)\s*[,\s]\s*([\d.]+%?)\s*[,\s]\s*([\d.]+%?)\s*(?:[,/]\s*([\d.]+%?)\s*)?\)$",
        )
        .expect("static regex")
    })
}

fn bare_channels() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([\d.]+)[\s,]+([\d.]+)[\s,]+([\d.]+)$").expect("static regex")
    })
}

/// Parse the color forms computed styles and custom properties produce:
/// `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb()`/`rgba()` (comma or space syntax),
/// bare `R G B` channel triples, and a few keywords.
pub fn parse_color(value: &str) -> Option<Color> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "" => return None,
        "transparent" => {
            return Some(Color {
                rgb: Rgb::new(0, 0, 0),
                alpha: 0.0,
            })
        }
        "white" => return Some(opaque(Rgb::new(255, 255, 255))),
        "black" => return Some(opaque(Rgb::new(0, 0, 0))),
        _ => {}
    }

    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }

    if let Some(caps) = rgb_function().captures(&value) {
        let rgb = Rgb::new(
            channel(&caps[1])?,
            channel(&caps[2])?,
            channel(&caps[3])?,
        );
        let alpha = match caps.get(4) {
            Some(a) => alpha(a.as_str())?,
            None => 1.0,
        };
        return Some(Color { rgb, alpha });
    }

    let caps = bare_channels().captures(&value)?;
    Some(opaque(Rgb::new(
        channel(&caps[1])?,
        channel(&caps[2])?,
        channel(&caps[3])?,
    )))
}

fn opaque(rgb: Rgb) -> Color {
    Color { rgb, alpha: 1.0 }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expanded: String = match hex.len() {
        3 | 4 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => hex.to_string(),
        _ => return None,
    };
    let byte = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    let rgb = Rgb::new(byte(0)?, byte(2)?, byte(4)?);
    let alpha = if expanded.len() == 8 {
        f64::from(byte(6)?) / 255.0
    } else {
        1.0
    };
    Some(Color { rgb, alpha })
}

fn channel(raw: &str) -> Option<u8> {
    let value = match raw.strip_suffix('%') {
        Some(pct) => pct.parse::<f64>().ok()? * 2.55,
        None => raw.parse::<f64>().ok()?,
    };
    Some(value.round().clamp(0.0, 255.0) as u8)
}

fn alpha(raw: &str) -> Option<f64> {
    let value = match raw.strip_suffix('%') {
        Some(pct) => pct.parse::<f64>().ok()? / 100.0,
        None => raw.parse::<f64>().ok()?,
    };
    Some(value.clamp(0.0, 1.0))
}
