//! Bidirectional text preparation: shaping and visual reordering.
//!
//! Both steps are pure functions from a logical string to the string that is
//! drawn left to right on the page.

mod bidi;
mod shaping;

pub use bidi::visual_order;
pub use shaping::reshape;

use crate::error::ShapingError;

/// Glyph coverage of the font text will be drawn with.
pub trait GlyphCoverage {
    /// Font name used in diagnostics.
    fn font_name(&self) -> &str;

    /// Whether the font can draw `ch`.
    fn has_glyph(&self, ch: char) -> bool;
}

/// Whether the text contains right-to-left script.
pub fn has_rtl(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{0590}'..='\u{08FF}'
            | '\u{FB1D}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}')
    })
}

/// Prepare text for drawing: shape and reorder it when it contains
/// right-to-left script, otherwise return it unchanged. Fails when the
/// shaped text needs a glyph the font does not have.
pub fn display_text(text: &str, font: &impl GlyphCoverage) -> Result<String, ShapingError> {
    if !has_rtl(text) {
        return Ok(text.to_string());
    }

    let shaped = reshape(text);
    if let Some(missing) = shaped
        .chars()
        .find(|c| !c.is_whitespace() && !font.has_glyph(*c))
    {
        return Err(ShapingError::UnsupportedGlyph {
            ch: missing,
            font: font.font_name().to_string(),
        });
    }

    Ok(visual_order(&shaped))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AsciiOnly;

    impl GlyphCoverage for AsciiOnly {
        fn font_name(&self) -> &str {
            "ascii"
        }
        fn has_glyph(&self, ch: char) -> bool {
            ch.is_ascii()
        }
    }

    struct Everything;

    impl GlyphCoverage for Everything {
        fn font_name(&self) -> &str {
            "everything"
        }
        fn has_glyph(&self, _ch: char) -> bool {
            true
        }
    }

    #[test]
    fn test_latin_passes_through() {
        assert_eq!(display_text("X-Ray (2)", &AsciiOnly).unwrap(), "X-Ray (2)");
    }

    #[test]
    fn test_arabic_is_shaped_and_reordered() {
        assert_eq!(
            display_text("سلام", &Everything).unwrap(),
            "\u{FEE1}\u{FEFC}\u{FEB3}"
        );
        assert_eq!(
            display_text("Room غرفة", &Everything).unwrap(),
            "Room \u{FE94}\u{FED3}\u{FEAE}\u{FECF}"
        );
        assert_eq!(display_text("اب 123", &Everything).unwrap(), "123 \u{FE8F}\u{FE8D}");
    }

    #[test]
    fn test_missing_glyph_is_reported() {
        let err = display_text("فاتورة", &AsciiOnly).unwrap_err();
        assert!(matches!(err, ShapingError::UnsupportedGlyph { font, .. } if font == "ascii"));
    }

    #[test]
    fn test_has_rtl() {
        assert!(has_rtl("Patient مريض"));
        assert!(!has_rtl("Patient"));
    }
}
