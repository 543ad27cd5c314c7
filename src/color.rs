use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours (as `#rrggbb` hex strings)
/// using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            format!(
                "#{:02x}{:02x}{:02x}",
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: class label → colour
// ---------------------------------------------------------------------------

/// Maps the distinct class labels of a projection to stable colours.
/// Class order (and therefore colour assignment) follows the sorted
/// label order used everywhere else in the engine.
#[derive(Debug, Clone)]
pub struct ClassColorMap {
    classes: Vec<String>,
    colors: Vec<String>,
    default_color: String,
}

impl ClassColorMap {
    /// Build a colour map for the given classes (assumed sorted, distinct).
    pub fn new(classes: &[String]) -> Self {
        ClassColorMap {
            classes: classes.to_vec(),
            colors: generate_palette(classes.len()),
            default_color: "#808080".to_string(),
        }
    }

    /// Look up the colour for a class by its index.
    pub fn color_for_class(&self, idx: usize) -> &str {
        self.colors
            .get(idx)
            .map(String::as_str)
            .unwrap_or(&self.default_color)
    }

    /// Look up the colour for a label.
    pub fn color_for(&self, label: &str) -> &str {
        match self.classes.iter().position(|c| c == label) {
            Some(idx) => self.color_for_class(idx),
            None => &self.default_color,
        }
    }

    /// Legend entries (label → colour), one per class.
    pub fn legend_entries(&self) -> Vec<(String, String)> {
        self.classes
            .iter()
            .cloned()
            .zip(self.colors.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_is_distinct() {
        let palette = generate_palette(8);
        assert_eq!(palette.len(), 8);
        for (i, a) in palette.iter().enumerate() {
            assert!(a.starts_with('#') && a.len() == 7);
            for b in palette.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn class_colors_are_stable() {
        let classes = vec!["apple".to_string(), "pear".to_string()];
        let map = ClassColorMap::new(&classes);
        assert_eq!(map.color_for("apple"), map.color_for_class(0));
        assert_eq!(map.color_for("pear"), map.color_for_class(1));
        assert_eq!(map.color_for("unknown"), "#808080");
        assert_eq!(map.legend_entries().len(), 2);
    }
}
