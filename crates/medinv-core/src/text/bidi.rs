//! Logical-to-visual reordering with the Unicode bidirectional algorithm.

use unicode_bidi::BidiInfo;

/// Mirrored counterpart of a bracket drawn inside a right-to-left run.
fn mirror(c: char) -> char {
    match c {
        '(' => ')',
        ')' => '(',
        '[' => ']',
        ']' => '[',
        '{' => '}',
        '}' => '{',
        '<' => '>',
        '>' => '<',
        '«' => '»',
        '»' => '«',
        _ => c,
    }
}

/// Reorder one logical line into left-to-right drawing order. The paragraph
/// direction comes from the first strong character, so Latin-led mixed text
/// stays left-to-right and only its Arabic runs are reversed.
pub fn visual_order(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let bidi = BidiInfo::new(text, None);
    let mut out = String::with_capacity(text.len());

    for para in &bidi.paragraphs {
        let line = para.range.clone();
        let (levels, runs) = bidi.visual_runs(para, line);
        for run in runs {
            let segment = &text[run.clone()];
            if levels[run.start].is_rtl() {
                out.extend(segment.chars().rev().map(mirror));
            } else {
                out.push_str(segment);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ltr_text_unchanged() {
        assert_eq!(visual_order("Consultation x2"), "Consultation x2");
    }

    #[test]
    fn test_rtl_paragraph_keeps_numbers_ltr() {
        assert_eq!(visual_order("\u{FE8D}\u{FE8F} 123"), "123 \u{FE8F}\u{FE8D}");
    }

    #[test]
    fn test_mixed_latin_led_line() {
        assert_eq!(
            visual_order("Room \u{FECF}\u{FEAE}\u{FED3}\u{FE94}"),
            "Room \u{FE94}\u{FED3}\u{FEAE}\u{FECF}"
        );
    }

    #[test]
    fn test_brackets_mirror_in_rtl_runs() {
        // (ب) in an Arabic paragraph is drawn as (ب) after mirroring
        assert_eq!(visual_order("\u{FE8F}(\u{FE8D})"), "(\u{FE8D})\u{FE8F}");
    }
}
