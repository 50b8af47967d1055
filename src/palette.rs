//! Game flag-color names resolved to RGB for render flags and the debug SVG.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Neutral fallback when a save references a color name we do not know.
pub const FALLBACK_COLOR: Rgb = Rgb {
    r: 128,
    g: 128,
    b: 128,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

static NAMED_COLORS: Lazy<HashMap<&'static str, Rgb>> = Lazy::new(|| {
    let mut map = HashMap::new();
    let mut add = |name, r, g, b| {
        map.insert(name, Rgb { r, g, b });
    };
    add("black", 30, 30, 30);
    add("dark_grey", 64, 64, 64);
    add("grey", 128, 128, 128);
    add("light_grey", 189, 189, 189);
    add("white", 235, 235, 235);
    add("dark_brown", 90, 59, 36);
    add("brown", 130, 88, 54);
    add("beige", 211, 181, 137);
    add("yellow", 230, 200, 60);
    add("light_orange", 240, 170, 80);
    add("orange", 227, 133, 50);
    add("dark_orange", 191, 96, 28);
    add("red_orange", 210, 81, 44);
    add("red", 194, 54, 47);
    add("dark_red", 140, 33, 29);
    add("burgundy", 115, 27, 45);
    add("pink", 222, 124, 162);
    add("dark_pink", 178, 73, 126);
    add("purple", 142, 72, 165);
    add("dark_purple", 93, 44, 115);
    add("indigo", 75, 62, 155);
    add("dark_blue", 38, 60, 130);
    add("blue", 54, 95, 186);
    add("light_blue", 98, 146, 217);
    add("turquoise", 64, 180, 190);
    add("dark_teal", 30, 110, 115);
    add("teal", 54, 150, 150);
    add("light_green", 121, 196, 110);
    add("green", 70, 150, 80);
    add("dark_green", 39, 101, 52);
    add("ocean_turquoise", 46, 126, 142);
    add("mist_blue", 135, 163, 191);
    add("frog_green", 126, 160, 70);
    add("sun_green", 156, 176, 58);
    add("swamp_green", 94, 115, 60);
    add("khaki_brown", 144, 126, 84);
    add("satin_burgundy", 128, 44, 68);
    add("intense_red", 222, 44, 36);
    add("intense_purple", 168, 60, 204);
    add("intense_blue", 48, 108, 228);
    add("intense_turquoise", 40, 200, 210);
    add("null", FALLBACK_COLOR.r, FALLBACK_COLOR.g, FALLBACK_COLOR.b);
    map
});

/// Look up a named flag color. Unknown names log a warning and fall back to
/// neutral grey rather than failing the run.
pub fn resolve_color(name: &str) -> Rgb {
    match NAMED_COLORS.get(name) {
        Some(&rgb) => rgb,
        None => {
            log::warn!("unknown flag color '{name}', using fallback");
            FALLBACK_COLOR
        }
    }
}

/// A country's display color: the first usable entry of its flag color list.
pub fn country_color(flag_colors: &[String]) -> Rgb {
    flag_colors
        .iter()
        .find(|name| *name != "null" && !name.is_empty())
        .map(|name| resolve_color(name))
        .unwrap_or(FALLBACK_COLOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_names() {
        assert_eq!(resolve_color("blue"), Rgb { r: 54, g: 95, b: 186 });
        assert_eq!(resolve_color("definitely_not_a_color"), FALLBACK_COLOR);
    }

    #[test]
    fn country_color_skips_null_entries() {
        let colors = vec!["null".to_string(), "dark_teal".to_string()];
        assert_eq!(country_color(&colors), resolve_color("dark_teal"));
        assert_eq!(country_color(&[]), FALLBACK_COLOR);
    }

    #[test]
    fn hex_formatting() {
        assert_eq!(Rgb { r: 255, g: 0, b: 15 }.to_hex(), "#ff000f");
    }
}
