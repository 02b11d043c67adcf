use std::collections::{BTreeMap, BTreeSet};

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: ordinal key (e.g. year) → Color32
// ---------------------------------------------------------------------------

/// Maps the distinct keys of an ordinal encoding to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap<K: Ord> {
    mapping: BTreeMap<K, Color32>,
    default_color: Color32,
}

impl<K: Ord + Clone> ColorMap<K> {
    /// Assign palette colours to the distinct `keys` in ascending order.
    pub fn new<'k>(keys: impl IntoIterator<Item = &'k K>) -> Self
    where
        K: 'k,
    {
        let distinct: BTreeSet<K> = keys.into_iter().cloned().collect();
        let palette = generate_palette(distinct.len());
        let mapping: BTreeMap<K, Color32> = distinct.into_iter().zip(palette).collect();

        ColorMap {
            mapping,
            default_color: Color32::GRAY,
        }
    }

    /// Look up the colour for a key.
    pub fn color_for(&self, key: &K) -> Color32 {
        self.mapping.get(key).copied().unwrap_or(self.default_color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_requested_size() {
        assert!(generate_palette(0).is_empty());
        let colors = generate_palette(12);
        assert_eq!(colors.len(), 12);
        assert_ne!(colors[0], colors[6]);
    }

    #[test]
    fn keys_get_distinct_colors_and_unknown_is_gray() {
        let years = [2013, 2011, 2012, 2011];
        let map = ColorMap::new(years.iter());
        assert_ne!(map.color_for(&2011), map.color_for(&2012));
        assert_eq!(map.color_for(&1999), Color32::GRAY);
    }
}
