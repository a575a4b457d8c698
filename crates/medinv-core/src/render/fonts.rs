//! Fonts: the built-in Helvetica pair or an embedded TrueType face.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::RenderError;
use crate::models::config::MedinvConfig;
use crate::text::GlyphCoverage;

/// Helvetica advance widths (1/1000 em) for WinAnsi 0x20..=0x7E.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

/// Helvetica-Bold advance widths (1/1000 em) for WinAnsi 0x20..=0x7E.
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0..?
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // P.._
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // `..o
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // p..~
];

const DEFAULT_WIDTH: u16 = 556;

/// Map a character to its WinAnsiEncoding byte.
pub fn winansi_byte(c: char) -> Option<u8> {
    match c {
        ' '..='~' => Some(c as u8),
        '\u{00A0}'..='\u{00FF}' => Some(c as u32 as u8),
        '€' => Some(0x80),
        '‘' => Some(0x91),
        '’' => Some(0x92),
        '“' => Some(0x93),
        '”' => Some(0x94),
        '•' => Some(0x95),
        '–' => Some(0x96),
        '—' => Some(0x97),
        _ => None,
    }
}

/// A glyph in an embedded font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub id: u16,
    /// Advance width in 1/1000 em.
    pub width: u16,
}

/// A TrueType font loaded for embedding.
#[derive(Debug, Clone)]
pub struct TrueTypeFont {
    /// PostScript name, safe for a PDF name object.
    pub name: String,
    /// Raw font file.
    pub data: Vec<u8>,
    pub ascent: i16,
    pub descent: i16,
    pub bbox: [i16; 4],
    glyphs: HashMap<char, Glyph>,
}

impl TrueTypeFont {
    /// Parse a font file and index its BMP character map.
    pub fn parse(data: Vec<u8>, fallback_name: &str) -> Result<Self, String> {
        let face = ttf_parser::Face::parse(&data, 0).map_err(|e| e.to_string())?;
        let units = f32::from(face.units_per_em().max(1));
        let scale = |v: i16| (f32::from(v) * 1000.0 / units).round() as i16;

        let mut codepoints = Vec::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if subtable.is_unicode() {
                    subtable.codepoints(|cp| codepoints.push(cp));
                }
            }
        }

        let mut glyphs = HashMap::new();
        for cp in codepoints {
            let Some(c) = char::from_u32(cp).filter(|c| (*c as u32) <= 0xFFFF) else {
                continue;
            };
            if let Some(id) = face.glyph_index(c) {
                let advance = face.glyph_hor_advance(id).unwrap_or(0);
                let width = (f32::from(advance) * 1000.0 / units).round() as u16;
                glyphs.insert(c, Glyph { id: id.0, width });
            }
        }

        let name = face
            .names()
            .into_iter()
            .filter(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
            .find_map(|n| n.to_string())
            .unwrap_or_else(|| fallback_name.to_string());
        let name = sanitize_font_name(&name);

        let bbox = face.global_bounding_box();
        let ascent = scale(face.ascender());
        let descent = scale(face.descender());
        let bbox = [
            scale(bbox.x_min),
            scale(bbox.y_min),
            scale(bbox.x_max),
            scale(bbox.y_max),
        ];

        Ok(Self {
            name,
            data,
            ascent,
            descent,
            bbox,
            glyphs,
        })
    }

    pub fn glyph(&self, c: char) -> Option<Glyph> {
        self.glyphs.get(&c).copied()
    }
}

fn sanitize_font_name(raw: &str) -> String {
    let name: String = raw
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => Some(c),
            c if c.is_whitespace() => Some('-'),
            _ => None,
        })
        .collect();
    if name.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        name
    }
}

/// The font invoices are drawn with.
#[derive(Debug, Clone, Default)]
pub enum FontFace {
    /// Standard Helvetica and Helvetica-Bold, WinAnsi encoded. Cannot draw
    /// Arabic.
    #[default]
    Builtin,
    /// An embedded TrueType font; bold is simulated with a stroked outline.
    TrueType(Box<TrueTypeFont>),
}

impl FontFace {
    /// Load a TrueType font file.
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let data = std::fs::read(path).map_err(|e| RenderError::Font {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let fallback = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let font = TrueTypeFont::parse(data, &fallback).map_err(|reason| RenderError::Font {
            path: path.to_path_buf(),
            reason,
        })?;
        debug!("Loaded font {} from {}", font.name, path.display());
        Ok(FontFace::TrueType(Box::new(font)))
    }

    /// The configured font, or Helvetica when none can be loaded.
    pub fn from_config(config: &MedinvConfig) -> Self {
        let Some(path) = config.resolve_font() else {
            warn!("No TrueType font found; Arabic text will be drawn unshaped");
            return FontFace::Builtin;
        };
        match FontFace::load(&path) {
            Ok(face) => face,
            Err(e) => {
                warn!("{}; falling back to Helvetica", e);
                FontFace::Builtin
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FontFace::Builtin => "Helvetica",
            FontFace::TrueType(font) => &font.name,
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, FontFace::Builtin)
    }

    /// Advance width of one character in 1/1000 em.
    pub fn char_width(&self, c: char, bold: bool) -> u16 {
        match self {
            FontFace::Builtin => {
                let table = if bold {
                    &HELVETICA_BOLD_WIDTHS
                } else {
                    &HELVETICA_WIDTHS
                };
                match c {
                    ' '..='~' => table[(c as usize) - 0x20],
                    _ => DEFAULT_WIDTH,
                }
            }
            FontFace::TrueType(font) => font
                .glyph(c)
                .or_else(|| font.glyph('?'))
                .map(|g| g.width)
                .unwrap_or(DEFAULT_WIDTH),
        }
    }

    /// Width of a string in points.
    pub fn text_width(&self, text: &str, size: f32, bold: bool) -> f32 {
        let units: u32 = text.chars().map(|c| u32::from(self.char_width(c, bold))).sum();
        units as f32 * size / 1000.0
    }

    /// Encode text for a PDF string operand: WinAnsi bytes for Helvetica,
    /// big-endian two-byte codes (the BMP code point) for the embedded font.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            FontFace::Builtin => text.chars().map(|c| winansi_byte(c).unwrap_or(b'?')).collect(),
            FontFace::TrueType(_) => text
                .chars()
                .flat_map(|c| {
                    let code = if (c as u32) <= 0xFFFF { c as u32 as u16 } else { u16::from(b'?') };
                    code.to_be_bytes()
                })
                .collect(),
        }
    }
}

impl GlyphCoverage for FontFace {
    fn font_name(&self) -> &str {
        self.name()
    }

    fn has_glyph(&self, ch: char) -> bool {
        match self {
            FontFace::Builtin => winansi_byte(ch).is_some(),
            FontFace::TrueType(font) => font.glyph(ch).is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_widths() {
        let font = FontFace::Builtin;
        assert_eq!(font.char_width(' ', false), 278);
        assert_eq!(font.char_width('W', false), 944);
        assert_eq!(font.char_width('~', false), 584);
        assert_eq!(font.char_width('i', true), 278);
        assert_eq!(font.char_width('é', false), DEFAULT_WIDTH);
        assert!((font.text_width("AB", 10.0, false) - 13.34).abs() < 1e-4);
    }

    #[test]
    fn test_builtin_encoding() {
        let font = FontFace::Builtin;
        assert_eq!(font.encode("Qty é"), b"Qty \xE9".to_vec());
        assert_eq!(font.encode("ب"), b"?".to_vec());
        assert!(!font.has_glyph('\u{FEB3}'));
        assert!(font.has_glyph('€'));
    }

    #[test]
    fn test_sanitize_font_name() {
        assert_eq!(sanitize_font_name("Arial Unicode MS"), "Arial-Unicode-MS");
        assert_eq!(sanitize_font_name("(#)"), "EmbeddedFont");
    }

    #[test]
    fn test_missing_font_file() {
        let err = FontFace::load(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(matches!(err, RenderError::Font { .. }));
    }

    #[test]
    fn test_invalid_font_data() {
        assert!(TrueTypeFont::parse(b"not a font".to_vec(), "x").is_err());
    }

    #[test]
    fn test_load_truetype_fixture() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/DejaVuSansMono.ttf");
        let face = FontFace::load(&path).unwrap();
        assert!(!face.is_builtin());
        assert_eq!(face.name(), "DejaVuSansMono");

        // Monospaced: Latin and Arabic presentation forms share one advance.
        let advance = face.char_width('M', false);
        assert!(advance > 0);
        assert_eq!(face.char_width('i', false), advance);
        for c in ['\u{FE8F}', '\u{FEB3}', '\u{FEFB}', '\u{0628}'] {
            assert!(face.has_glyph(c), "missing {:?}", c);
            assert_eq!(face.char_width(c, false), advance);
        }
        assert_eq!(face.encode("بA"), vec![0x06, 0x28, 0x00, 0x41]);
    }

    #[test]
    fn test_from_config_falls_back_to_builtin() {
        let mut config = MedinvConfig::default();
        config.render.font_path = None;
        config.render.font_search_paths = vec![];
        assert!(FontFace::from_config(&config).is_builtin());
    }
}
