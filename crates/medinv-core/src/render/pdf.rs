//! Paints a [`DocumentLayout`] into PDF bytes with lopdf.

use std::collections::BTreeSet;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use sha2::{Digest, Sha256};
use subsetter::GlyphRemapper;
use tracing::{debug, warn};

use super::fonts::{FontFace, Glyph, TrueTypeFont};
use super::layout::{Color, DocumentLayout, DrawOp, LogoSize, PAGE_HEIGHT, PAGE_WIDTH};
use crate::error::RenderError;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";
const LOGO: &str = "Im1";

const IDENTITY_TO_UNICODE: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo
<< /Registry (Adobe)
/Ordering (UCS)
/Supplement 0
>> def
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
1 beginbfrange
<0000> <FFFF> <0000>
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end";

/// A decoded logo image.
#[derive(Debug, Clone)]
pub struct Logo {
    pub width: u32,
    pub height: u32,
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

impl Logo {
    /// Decode a PNG or JPEG file.
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let image = image::open(path).map_err(|e| RenderError::Logo {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();

        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for pixel in rgba.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }
        let alpha = alpha.iter().any(|a| *a != u8::MAX).then_some(alpha);

        debug!("Loaded {}x{} logo from {}", width, height, path.display());
        Ok(Self {
            width,
            height,
            rgb,
            alpha,
        })
    }

    pub fn size(&self) -> LogoSize {
        (self.width, self.height)
    }
}

fn color_args(color: Color) -> Vec<Object> {
    vec![color.0.into(), color.1.into(), color.2.into()]
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

/// Writes layouts as PDF documents.
pub struct PdfPainter<'a> {
    font: &'a FontFace,
    logo: Option<&'a Logo>,
}

impl<'a> PdfPainter<'a> {
    pub fn new(font: &'a FontFace, logo: Option<&'a Logo>) -> Self {
        Self { font, logo }
    }

    /// Build the document and serialize it. The same layout always yields
    /// the same bytes.
    pub fn paint(&self, layout: &DocumentLayout, title: &str) -> Result<Vec<u8>, RenderError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let resources_id = self.resources(&mut doc, layout);

        let mut kids = Vec::with_capacity(layout.pages.len());
        for page in &layout.pages {
            let content = Content {
                operations: self.operations(&page.ops),
            };
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

            let mut page_dict = Dictionary::new();
            page_dict.set("Type", name("Page"));
            page_dict.set("Parent", Object::Reference(pages_id));
            page_dict.set(
                "MediaBox",
                Object::Array(vec![Object::Integer(0), Object::Integer(0), PAGE_WIDTH.into(), PAGE_HEIGHT.into()]),
            );
            page_dict.set("Contents", Object::Reference(content_id));
            page_dict.set("Resources", Object::Reference(resources_id));
            kids.push(Object::Reference(doc.add_object(page_dict)));
        }

        let mut pages = Dictionary::new();
        pages.set("Type", name("Pages"));
        pages.set("Count", Object::Integer(kids.len() as i64));
        pages.set("Kids", Object::Array(kids));
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", name("Catalog"));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(catalog);

        let mut info = Dictionary::new();
        info.set("Title", text_string(title));
        info.set("Producer", Object::string_literal("medinv"));
        let info_id = doc.add_object(info);

        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.trailer.set("Info", Object::Reference(info_id));
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| RenderError::Write(e.to_string()))?;
        debug!("Wrote {} page(s), {} bytes", layout.pages.len(), bytes.len());
        Ok(bytes)
    }

    fn resources(&self, doc: &mut Document, layout: &DocumentLayout) -> ObjectId {
        let mut fonts = Dictionary::new();
        match self.font {
            FontFace::Builtin => {
                fonts.set(REGULAR, Object::Reference(doc.add_object(type1_font("Helvetica"))));
                fonts.set(BOLD, Object::Reference(doc.add_object(type1_font("Helvetica-Bold"))));
            }
            FontFace::TrueType(font) => {
                let used: BTreeSet<char> = layout
                    .pages
                    .iter()
                    .flat_map(|p| p.ops.iter())
                    .filter_map(|op| match op {
                        DrawOp::Text { text, .. } => Some(text.chars()),
                        _ => None,
                    })
                    .flatten()
                    .filter(|c| (*c as u32) <= 0xFFFF)
                    .collect();
                let font_id = embed_truetype(doc, font, &used);
                fonts.set(REGULAR, Object::Reference(font_id));
            }
        }

        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        if let Some(logo) = self.logo {
            let mut xobjects = Dictionary::new();
            xobjects.set(LOGO, Object::Reference(embed_logo(doc, logo)));
            resources.set("XObject", Object::Dictionary(xobjects));
        }

        doc.add_object(resources)
    }

    fn operations(&self, ops: &[DrawOp]) -> Vec<Operation> {
        let mut out = Vec::new();
        for op in ops {
            match op {
                DrawOp::Text {
                    x,
                    y,
                    size,
                    bold,
                    color,
                    text,
                } => self.text_operations(&mut out, *x, *y, *size, *bold, *color, text),
                DrawOp::FillRect {
                    x,
                    y,
                    width,
                    height,
                    color,
                } => {
                    out.push(Operation::new("q", vec![]));
                    out.push(Operation::new("rg", color_args(*color)));
                    out.push(Operation::new(
                        "re",
                        vec![(*x).into(), (*y).into(), (*width).into(), (*height).into()],
                    ));
                    out.push(Operation::new("f", vec![]));
                    out.push(Operation::new("Q", vec![]));
                }
                DrawOp::StrokeRect {
                    x,
                    y,
                    width,
                    height,
                    color,
                    line_width,
                } => {
                    out.push(Operation::new("q", vec![]));
                    out.push(Operation::new("RG", color_args(*color)));
                    out.push(Operation::new("w", vec![(*line_width).into()]));
                    out.push(Operation::new(
                        "re",
                        vec![(*x).into(), (*y).into(), (*width).into(), (*height).into()],
                    ));
                    out.push(Operation::new("S", vec![]));
                    out.push(Operation::new("Q", vec![]));
                }
                DrawOp::Line {
                    from,
                    to,
                    color,
                    line_width,
                } => {
                    out.push(Operation::new("q", vec![]));
                    out.push(Operation::new("RG", color_args(*color)));
                    out.push(Operation::new("w", vec![(*line_width).into()]));
                    out.push(Operation::new("m", vec![from.0.into(), from.1.into()]));
                    out.push(Operation::new("l", vec![to.0.into(), to.1.into()]));
                    out.push(Operation::new("S", vec![]));
                    out.push(Operation::new("Q", vec![]));
                }
                DrawOp::Image {
                    x,
                    y,
                    width,
                    height,
                } => {
                    if self.logo.is_none() {
                        continue;
                    }
                    out.push(Operation::new("q", vec![]));
                    out.push(Operation::new(
                        "cm",
                        vec![
                            (*width).into(),
                            Object::Integer(0),
                            Object::Integer(0),
                            (*height).into(),
                            (*x).into(),
                            (*y).into(),
                        ],
                    ));
                    out.push(Operation::new("Do", vec![name(LOGO)]));
                    out.push(Operation::new("Q", vec![]));
                }
            }
        }
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn text_operations(
        &self,
        out: &mut Vec<Operation>,
        x: f32,
        y: f32,
        size: f32,
        bold: bool,
        color: Color,
        text: &str,
    ) {
        // The embedded font has no bold face: fill and stroke the outline.
        let fake_bold = bold && !self.font.is_builtin();
        let font = if bold && self.font.is_builtin() { BOLD } else { REGULAR };
        let string = match self.font {
            FontFace::Builtin => Object::String(self.font.encode(text), StringFormat::Literal),
            FontFace::TrueType(_) => Object::String(self.font.encode(text), StringFormat::Hexadecimal),
        };

        out.push(Operation::new("BT", vec![]));
        out.push(Operation::new("rg", color_args(color)));
        if fake_bold {
            out.push(Operation::new("RG", color_args(color)));
            out.push(Operation::new("w", vec![(size * 0.03).into()]));
            out.push(Operation::new("Tr", vec![Object::Integer(2)]));
        }
        out.push(Operation::new("Tf", vec![name(font), size.into()]));
        out.push(Operation::new("Td", vec![x.into(), y.into()]));
        out.push(Operation::new("Tj", vec![string]));
        if fake_bold {
            out.push(Operation::new("Tr", vec![Object::Integer(0)]));
        }
        out.push(Operation::new("ET", vec![]));
    }
}

/// A PDF text string: PDFDocEncoding when ASCII, otherwise UTF-16BE with a
/// byte order mark.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    bytes.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn type1_font(base: &str) -> Dictionary {
    let mut font = Dictionary::new();
    font.set("Type", name("Font"));
    font.set("Subtype", name("Type1"));
    font.set("BaseFont", name(base));
    font.set("Encoding", name("WinAnsiEncoding"));
    font
}

/// Embed a TrueType font as Type0/CIDFontType2. Character codes are BMP code
/// points; the CIDToGIDMap translates them to glyph ids in the subset and the
/// identity ToUnicode map makes the text extractable.
fn embed_truetype(doc: &mut Document, font: &TrueTypeFont, used: &BTreeSet<char>) -> ObjectId {
    let glyphs: Vec<(char, Glyph)> = used
        .iter()
        .filter_map(|c| font.glyph(*c).map(|g| (*c, g)))
        .collect();

    let mut remapper = GlyphRemapper::new();
    let remapped: Vec<(char, Glyph, u16)> = glyphs
        .iter()
        .map(|(c, g)| (*c, *g, remapper.remap(g.id)))
        .collect();
    let (data, gids, base_font) = match subsetter::subset(&font.data, 0, &remapper) {
        Ok(data) => {
            let base_font = format!("{}+{}", subset_tag(&remapped), font.name);
            (data, remapped, base_font)
        }
        Err(e) => {
            warn!("Could not subset font {}: {}; embedding it whole", font.name, e);
            let gids = glyphs.iter().map(|(c, g)| (*c, *g, g.id)).collect();
            (font.data.clone(), gids, font.name.clone())
        }
    };
    debug!(
        "Embedding {} glyphs of {} ({} of {} bytes)",
        gids.len(),
        font.name,
        data.len(),
        font.data.len()
    );

    let mut file = Dictionary::new();
    file.set("Length1", Object::Integer(data.len() as i64));
    let file_id = doc.add_object(Stream::new(file, data));

    let mut descriptor = Dictionary::new();
    descriptor.set("Type", name("FontDescriptor"));
    descriptor.set("FontName", name(&base_font));
    descriptor.set("Flags", Object::Integer(4));
    descriptor.set(
        "FontBBox",
        Object::Array(font.bbox.iter().map(|v| Object::Integer(i64::from(*v))).collect()),
    );
    descriptor.set("ItalicAngle", Object::Integer(0));
    descriptor.set("Ascent", Object::Integer(i64::from(font.ascent)));
    descriptor.set("Descent", Object::Integer(i64::from(font.descent)));
    descriptor.set("CapHeight", Object::Integer(i64::from(font.ascent)));
    descriptor.set("StemV", Object::Integer(80));
    descriptor.set("FontFile2", Object::Reference(file_id));
    let descriptor_id = doc.add_object(descriptor);

    // Codes past the last used one fall back to glyph 0 without an entry.
    let max_code = gids.last().map_or(0, |(c, _, _)| *c as usize);
    let mut map = vec![0u8; (max_code + 1) * 2];
    let mut widths = Vec::with_capacity(gids.len() * 2);
    for (c, glyph, gid) in &gids {
        let offset = (*c as usize) * 2;
        map[offset..offset + 2].copy_from_slice(&gid.to_be_bytes());
        widths.push(Object::Integer(i64::from(*c as u32)));
        widths.push(Object::Array(vec![Object::Integer(i64::from(glyph.width))]));
    }
    let map_id = doc.add_object(Stream::new(Dictionary::new(), map));

    let mut system_info = Dictionary::new();
    system_info.set("Registry", Object::string_literal("Adobe"));
    system_info.set("Ordering", Object::string_literal("Identity"));
    system_info.set("Supplement", Object::Integer(0));

    let mut cid_font = Dictionary::new();
    cid_font.set("Type", name("Font"));
    cid_font.set("Subtype", name("CIDFontType2"));
    cid_font.set("BaseFont", name(&base_font));
    cid_font.set("CIDSystemInfo", Object::Dictionary(system_info));
    cid_font.set("FontDescriptor", Object::Reference(descriptor_id));
    cid_font.set("DW", Object::Integer(1000));
    cid_font.set("W", Object::Array(widths));
    cid_font.set("CIDToGIDMap", Object::Reference(map_id));
    let cid_font_id = doc.add_object(cid_font);

    let to_unicode_id = doc.add_object(Stream::new(Dictionary::new(), IDENTITY_TO_UNICODE.to_vec()));

    let mut type0 = Dictionary::new();
    type0.set("Type", name("Font"));
    type0.set("Subtype", name("Type0"));
    type0.set("BaseFont", name(&base_font));
    type0.set("Encoding", name("Identity-H"));
    type0.set("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)]));
    type0.set("ToUnicode", Object::Reference(to_unicode_id));
    doc.add_object(type0)
}

/// Six capital letters naming a subset, stable for the same glyph set.
fn subset_tag(gids: &[(char, Glyph, u16)]) -> String {
    let mut hasher = Sha256::new();
    for (_, glyph, _) in gids {
        hasher.update(glyph.id.to_be_bytes());
    }
    hasher
        .finalize()
        .iter()
        .take(6)
        .map(|b| char::from(b'A' + b % 26))
        .collect()
}

fn embed_logo(doc: &mut Document, logo: &Logo) -> ObjectId {
    let image_dict = |color_space: &str| {
        let mut dict = Dictionary::new();
        dict.set("Type", name("XObject"));
        dict.set("Subtype", name("Image"));
        dict.set("Width", Object::Integer(i64::from(logo.width)));
        dict.set("Height", Object::Integer(i64::from(logo.height)));
        dict.set("ColorSpace", name(color_space));
        dict.set("BitsPerComponent", Object::Integer(8));
        dict
    };

    let mut dict = image_dict("DeviceRGB");
    if let Some(alpha) = &logo.alpha {
        let mask_id = doc.add_object(Stream::new(image_dict("DeviceGray"), alpha.clone()));
        dict.set("SMask", Object::Reference(mask_id));
    }
    doc.add_object(Stream::new(dict, logo.rgb.clone()))
}
