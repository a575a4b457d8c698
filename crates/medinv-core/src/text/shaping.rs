//! Arabic contextual shaping into Unicode presentation forms.

/// Joining behaviour of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joining {
    /// Joins on both sides.
    Dual,
    /// Joins only to the preceding letter.
    Right,
    /// Tatweel: joins on both sides and is drawn as-is.
    Causing,
    /// Harakat and other marks; ignored when finding neighbours.
    Transparent,
    /// Everything else, including hamza.
    None,
}

/// Presentation forms of a letter: isolated, final, initial, medial.
#[derive(Debug, Clone, Copy)]
struct Forms {
    isolated: char,
    final_: char,
    initial: Option<char>,
    medial: Option<char>,
}

const fn ch(code: u32) -> char {
    match char::from_u32(code) {
        Some(c) => c,
        None => '\u{FFFD}',
    }
}

const fn dual(base: u32) -> (Joining, Forms) {
    (
        Joining::Dual,
        Forms {
            isolated: ch(base),
            final_: ch(base + 1),
            initial: Some(ch(base + 2)),
            medial: Some(ch(base + 3)),
        },
    )
}

const fn right(base: u32) -> (Joining, Forms) {
    (
        Joining::Right,
        Forms {
            isolated: ch(base),
            final_: ch(base + 1),
            initial: None,
            medial: None,
        },
    )
}

fn letter(c: char) -> Option<(Joining, Forms)> {
    let entry = match c {
        '\u{0622}' => right(0xFE81),
        '\u{0623}' => right(0xFE83),
        '\u{0624}' => right(0xFE85),
        '\u{0625}' => right(0xFE87),
        '\u{0626}' => dual(0xFE89),
        '\u{0627}' => right(0xFE8D),
        '\u{0628}' => dual(0xFE8F),
        '\u{0629}' => right(0xFE93),
        '\u{062A}' => dual(0xFE95),
        '\u{062B}' => dual(0xFE99),
        '\u{062C}' => dual(0xFE9D),
        '\u{062D}' => dual(0xFEA1),
        '\u{062E}' => dual(0xFEA5),
        '\u{062F}' => right(0xFEA9),
        '\u{0630}' => right(0xFEAB),
        '\u{0631}' => right(0xFEAD),
        '\u{0632}' => right(0xFEAF),
        '\u{0633}' => dual(0xFEB1),
        '\u{0634}' => dual(0xFEB5),
        '\u{0635}' => dual(0xFEB9),
        '\u{0636}' => dual(0xFEBD),
        '\u{0637}' => dual(0xFEC1),
        '\u{0638}' => dual(0xFEC5),
        '\u{0639}' => dual(0xFEC9),
        '\u{063A}' => dual(0xFECD),
        '\u{0641}' => dual(0xFED1),
        '\u{0642}' => dual(0xFED5),
        '\u{0643}' => dual(0xFED9),
        '\u{0644}' => dual(0xFEDD),
        '\u{0645}' => dual(0xFEE1),
        '\u{0646}' => dual(0xFEE5),
        '\u{0647}' => dual(0xFEE9),
        '\u{0648}' => right(0xFEED),
        '\u{0649}' => right(0xFEEF),
        '\u{064A}' => dual(0xFEF1),
        // Persian/Urdu letters (Presentation Forms-A)
        '\u{067E}' => dual(0xFB56),
        '\u{0686}' => dual(0xFB7A),
        '\u{0698}' => right(0xFB8A),
        '\u{06A9}' => dual(0xFB8E),
        '\u{06AF}' => dual(0xFB92),
        '\u{06CC}' => dual(0xFBFC),
        _ => return None,
    };
    Some(entry)
}

fn joining(c: char) -> Joining {
    match c {
        '\u{0640}' => Joining::Causing,
        '\u{064B}'..='\u{065F}' | '\u{0670}' => Joining::Transparent,
        _ => letter(c).map(|(j, _)| j).unwrap_or(Joining::None),
    }
}

/// Lam-alef ligature (isolated, final) for the alef following a lam.
fn lam_alef(alef: char) -> Option<(char, char)> {
    match alef {
        '\u{0622}' => Some(('\u{FEF5}', '\u{FEF6}')),
        '\u{0623}' => Some(('\u{FEF7}', '\u{FEF8}')),
        '\u{0625}' => Some(('\u{FEF9}', '\u{FEFA}')),
        '\u{0627}' => Some(('\u{FEFB}', '\u{FEFC}')),
        _ => None,
    }
}

const LAM: char = '\u{0644}';

/// Whether `c` connects to the letter that follows it.
fn connects_forward(c: char) -> bool {
    matches!(joining(c), Joining::Dual | Joining::Causing)
}

/// Whether `c` connects to the letter that precedes it.
fn connects_backward(c: char) -> bool {
    matches!(joining(c), Joining::Dual | Joining::Right | Joining::Causing)
}

fn previous_joining(chars: &[char], index: usize) -> Option<char> {
    chars[..index]
        .iter()
        .rev()
        .copied()
        .find(|c| joining(*c) != Joining::Transparent)
}

fn next_joining(chars: &[char], index: usize) -> Option<(usize, char)> {
    chars
        .iter()
        .copied()
        .enumerate()
        .skip(index + 1)
        .find(|(_, c)| joining(*c) != Joining::Transparent)
}

/// Replace Arabic letters with their contextual presentation forms and
/// combine lam-alef pairs. The result stays in logical order; characters
/// without presentation forms pass through unchanged.
pub fn reshape(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let Some((join, forms)) = letter(c) else {
            out.push(c);
            i += 1;
            continue;
        };

        let joins_prev = previous_joining(&chars, i).is_some_and(connects_forward);
        let next = next_joining(&chars, i);

        if c == LAM {
            if let Some((alef_index, ligature)) =
                next.and_then(|(j, n)| lam_alef(n).map(|l| (j, l)))
            {
                out.push(if joins_prev { ligature.1 } else { ligature.0 });
                out.extend(&chars[i + 1..alef_index]);
                i = alef_index + 1;
                continue;
            }
        }

        let joins_next = join == Joining::Dual && next.is_some_and(|(_, n)| connects_backward(n));

        let shaped = match (joins_prev, joins_next) {
            (true, true) => forms.medial.unwrap_or(forms.final_),
            (true, false) => forms.final_,
            (false, true) => forms.initial.unwrap_or(forms.isolated),
            (false, false) => forms.isolated,
        };
        out.push(shaped);
        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_with_lam_alef() {
        assert_eq!(reshape("سلام"), "\u{FEB3}\u{FEFC}\u{FEE1}");
    }

    #[test]
    fn test_isolated_lam_alef() {
        assert_eq!(reshape("لا"), "\u{FEFB}");
        assert_eq!(reshape("لأ"), "\u{FEF7}");
    }

    #[test]
    fn test_right_joining_breaks_word() {
        // غرفة: ghain initial, reh final, feh initial, teh marbuta final
        assert_eq!(reshape("غرفة"), "\u{FECF}\u{FEAE}\u{FED3}\u{FE94}");
    }

    #[test]
    fn test_medial_forms() {
        // بيت: beh initial, yeh medial, teh final
        assert_eq!(reshape("بيت"), "\u{FE91}\u{FEF4}\u{FE96}");
    }

    #[test]
    fn test_harakat_are_transparent() {
        // بَب keeps the joining across the fatha
        assert_eq!(reshape("بَب"), "\u{FE91}\u{064E}\u{FE90}");
    }

    #[test]
    fn test_hamza_does_not_join() {
        assert_eq!(reshape("بءب"), "\u{FE8F}\u{0621}\u{FE8F}");
    }

    #[test]
    fn test_non_arabic_untouched() {
        assert_eq!(reshape("X-Ray 2024"), "X-Ray 2024");
        assert_eq!(reshape(""), "");
    }
}
