//! Text width measurement for label box sizing.
//!
//! Uses the system font database when available; falls back to a geometric
//! average-width heuristic otherwise, so headless environments still get
//! reasonable label aspect ratios.

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use ttf_parser::Face;

/// Width of an average glyph relative to the font size, used when no face
/// can be resolved or a glyph is missing.
const FALLBACK_ADVANCE: f64 = 0.56;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Measured width of `text` at `font_size`. Never fails: missing fonts or
/// glyphs degrade to the average-width heuristic.
pub fn measure_text_width(text: &str, font_size: f64, font_family: &str) -> f64 {
    if text.is_empty() || font_size <= 0.0 {
        return 0.0;
    }
    let measured = TEXT_MEASURER
        .lock()
        .ok()
        .and_then(|mut guard| guard.measure(text, font_size, font_family));
    measured.unwrap_or_else(|| text.chars().count() as f64 * font_size * FALLBACK_ADVANCE)
}

/// Width-to-height ratio of a single line of `text`, for the label engine's
/// aspect-corrected rectangle search. Clamped away from zero.
pub fn text_aspect_ratio(text: &str, font_family: &str) -> f64 {
    const NOMINAL_SIZE: f64 = 100.0;
    let width = measure_text_width(text, NOMINAL_SIZE, font_family);
    (width / NOMINAL_SIZE).max(0.5)
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    faces: HashMap<String, Option<FaceMetrics>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            faces: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font_size: f64, font_family: &str) -> Option<f64> {
        let key = family_key(font_family);
        if !self.faces.contains_key(&key) {
            let metrics = self.load_metrics(font_family);
            self.faces.insert(key.clone(), metrics);
        }
        let metrics = self.faces.get(&key)?.as_ref()?;
        Some(metrics.width_of(text, font_size))
    }

    fn load_metrics(&mut self, font_family: &str) -> Option<FaceMetrics> {
        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let mut names: Vec<String> = Vec::new();
        let mut families: Vec<Family<'_>> = Vec::new();
        for part in font_family.split(',') {
            let raw = part.trim().trim_matches('"').trim_matches('\'');
            if raw.is_empty() {
                continue;
            }
            match raw.to_ascii_lowercase().as_str() {
                "serif" => families.push(Family::Serif),
                "sans-serif" | "system-ui" => families.push(Family::SansSerif),
                "monospace" => families.push(Family::Monospace),
                _ => names.push(raw.to_string()),
            }
        }
        for name in &names {
            families.push(Family::Name(name));
        }
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        let id = self.db.query(&Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        })?;
        let mut loaded = None;
        self.db.with_face_data(id, |data, index| {
            if let Ok(face) = Face::parse(data, index) {
                loaded = Some(FaceMetrics::from_face(&face));
            }
        });
        loaded
    }
}

/// Advance table extracted eagerly so no borrowed face handle outlives the
/// database callback.
struct FaceMetrics {
    units_per_em: f64,
    ascii_advances: [u16; 128],
}

impl FaceMetrics {
    fn from_face(face: &Face<'_>) -> Self {
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph).unwrap_or(0);
            }
        }
        Self {
            units_per_em: f64::from(face.units_per_em().max(1)),
            ascii_advances,
        }
    }

    fn width_of(&self, text: &str, font_size: f64) -> f64 {
        let scale = font_size / self.units_per_em;
        let mut width = 0.0;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            let advance = if ch.is_ascii() {
                self.ascii_advances[ch as usize]
            } else {
                0
            };
            if advance == 0 {
                width += font_size * FALLBACK_ADVANCE;
            } else {
                width += f64::from(advance) * scale;
            }
        }
        width.max(0.0)
    }
}

fn family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_wide() {
        assert_eq!(measure_text_width("", 16.0, "sans-serif"), 0.0);
    }

    #[test]
    fn width_scales_with_text_length() {
        let short = measure_text_width("Hi", 16.0, "sans-serif");
        let long = measure_text_width("Hi there, galaxy", 16.0, "sans-serif");
        assert!(long > short);
        assert!(short > 0.0);
    }

    #[test]
    fn aspect_ratio_is_positive_and_grows() {
        let narrow = text_aspect_ratio("Ion", "sans-serif");
        let wide = text_aspect_ratio("Grand Stellar Commonwealth", "sans-serif");
        assert!(narrow >= 0.5);
        assert!(wide > narrow);
    }
}
