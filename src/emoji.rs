//! Emoji cluster and decorative separator segmentation.

use crate::segment::Segment;

/// Characters that form an atomic separator when repeated three or more times.
pub const SEPARATOR_CHARS: &[char] = &['━', '─', '═', '—', '_', '-', '~', '·', '•'];

/// Minimum repeat count for a separator run.
pub const MIN_SEPARATOR_RUN: usize = 3;

const ZWJ: char = '\u{200D}';
const KEYCAP: char = '\u{20E3}';
const VS16: char = '\u{FE0F}';

const BASE_RANGES: &[(u32, u32)] = &[
    (0x2139, 0x2139),
    (0x2194, 0x2199),
    (0x21A9, 0x21AA),
    (0x231A, 0x231B),
    (0x2328, 0x2328),
    (0x23CF, 0x23CF),
    (0x23E9, 0x23F3),
    (0x23F8, 0x23FA),
    (0x24C2, 0x24C2),
    (0x25AA, 0x25AB),
    (0x25B6, 0x25B6),
    (0x25C0, 0x25C0),
    (0x25FB, 0x25FE),
    (0x2600, 0x26FF),
    (0x2702, 0x27BF),
    (0x2934, 0x2935),
    (0x2B05, 0x2B07),
    (0x2B1B, 0x2B1C),
    (0x2B50, 0x2B50),
    (0x2B55, 0x2B55),
    (0x3030, 0x3030),
    (0x303D, 0x303D),
    (0x3297, 0x3297),
    (0x3299, 0x3299),
    (0x1F004, 0x1F004),
    (0x1F0CF, 0x1F0CF),
    (0x1F170, 0x1F171),
    (0x1F17E, 0x1F17F),
    (0x1F18E, 0x1F18E),
    (0x1F191, 0x1F19A),
    (0x1F1E0, 0x1F1FF),
    (0x1F201, 0x1F202),
    (0x1F21A, 0x1F21A),
    (0x1F22F, 0x1F22F),
    (0x1F232, 0x1F23A),
    (0x1F250, 0x1F251),
    (0x1F300, 0x1FFFF),
];

/// Whether `ch` starts an emoji cluster.
pub fn is_emoji_base(ch: char) -> bool {
    let cp = ch as u32;
    BASE_RANGES
        .iter()
        .any(|&(start, end)| cp >= start && cp <= end)
}

fn is_regional_indicator(ch: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&ch)
}

fn is_skin_tone(ch: char) -> bool {
    ('\u{1F3FB}'..='\u{1F3FF}').contains(&ch)
}

/// Trailing codepoints that extend the current cluster without starting one.
fn is_cluster_modifier(ch: char) -> bool {
    ('\u{FE00}'..='\u{FE0F}').contains(&ch) || ch == KEYCAP || is_skin_tone(ch)
}

fn is_keycap_base(ch: char) -> bool {
    ch.is_ascii_digit() || ch == '#' || ch == '*'
}

pub fn is_separator_char(ch: char) -> bool {
    SEPARATOR_CHARS.contains(&ch)
}

/// Length in chars of the emoji cluster starting at `chars[start]`, or `0`.
fn cluster_len(chars: &[char], start: usize) -> usize {
    let Some(&first) = chars.get(start) else {
        return 0;
    };

    let mut end = start;
    if is_keycap_base(first) {
        // Keycaps need the combining enclosing mark to count as emoji.
        let mut probe = start + 1;
        if chars.get(probe) == Some(&VS16) {
            probe += 1;
        }
        if chars.get(probe) != Some(&KEYCAP) {
            return 0;
        }
        return probe + 1 - start;
    } else if !is_emoji_base(first) {
        return 0;
    }

    end += 1;
    if is_regional_indicator(first) && chars.get(end).copied().is_some_and(is_regional_indicator)
    {
        end += 1;
    }

    while let Some(&next) = chars.get(end) {
        if is_cluster_modifier(next) {
            end += 1;
        } else if next == ZWJ {
            end += 1;
            if chars.get(end).copied().is_some_and(is_emoji_base) {
                end += 1;
            }
        } else {
            break;
        }
    }
    end - start
}

/// Splits raw text into plain, emoji, and atomic separator segments.
///
/// Segments carry no style; callers restyle them from the source segment.
pub fn segment_text(text: &str) -> Vec<Segment> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut plain = String::new();
    let mut i = 0;

    while i < chars.len() {
        let len = cluster_len(&chars, i);
        if len > 0 {
            split_separators(&plain, &mut out);
            plain.clear();
            out.push(Segment::emoji(chars[i..i + len].iter().collect::<String>()));
            i += len;
        } else {
            plain.push(chars[i]);
            i += 1;
        }
    }
    split_separators(&plain, &mut out);
    out
}

fn split_separators(text: &str, out: &mut Vec<Segment>) {
    if text.is_empty() {
        return;
    }

    let chars: Vec<char> = text.chars().collect();
    let mut plain = String::new();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        let mut j = i + 1;
        while j < chars.len() && chars[j] == ch {
            j += 1;
        }
        if j - i >= MIN_SEPARATOR_RUN && is_separator_char(ch) {
            if !plain.is_empty() {
                out.push(Segment::plain(core::mem::take(&mut plain)));
            }
            out.push(Segment::atomic(chars[i..j].iter().collect::<String>()));
        } else {
            plain.extend(&chars[i..j]);
        }
        i = j;
    }
    if !plain.is_empty() {
        out.push(Segment::plain(plain));
    }
}

pub fn contains_emoji(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    (0..chars.len()).any(|i| cluster_len(&chars, i) > 0)
}

fn hex_key<I: IntoIterator<Item = char>>(chars: I) -> String {
    chars
        .into_iter()
        .map(|c| format!("{:x}", c as u32))
        .collect::<Vec<_>>()
        .join("-")
}

/// Lookup names (`1f600`, `1f468-200d-1f469`, ...) a glyph source may use for
/// an emoji cluster, most specific first, without duplicates.
pub fn codepoint_keys(emoji: &str) -> Vec<String> {
    let without_vs: Vec<char> = emoji.chars().filter(|&c| c != VS16).collect();
    let bare: Vec<char> = without_vs.iter().copied().filter(|&c| c != ZWJ).collect();

    let mut keys = Vec::with_capacity(5);
    let mut push = |key: String| {
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    };
    push(hex_key(without_vs.iter().copied()));
    push(hex_key(bare.iter().copied()));
    push(hex_key(emoji.chars()));
    if let Some(&first) = bare.first() {
        push(hex_key([first]));
        push(format!("{:x}-fe0f", first as u32));
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(segments: &[Segment]) -> Vec<&str> {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(segment_text("").is_empty());
    }

    #[test]
    fn plain_text_stays_one_segment() {
        let out = segment_text("hello, 世界");
        assert_eq!(out, vec![Segment::plain("hello, 世界")]);
    }

    #[test]
    fn emoji_split_out_of_plain_text() {
        let out = segment_text("hi 😀 there");
        assert_eq!(texts(&out), vec!["hi ", "😀", " there"]);
        assert!(out[1].is_emoji);
        assert!(!out[0].is_emoji && !out[2].is_emoji);
    }

    #[test]
    fn zwj_sequence_is_one_cluster() {
        let family = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}";
        let out = segment_text(&format!("a{family}b"));
        assert_eq!(texts(&out), vec!["a", family, "b"]);
        assert!(out[1].is_emoji);
    }

    #[test]
    fn skin_tone_and_variation_selector_attach_to_base() {
        let wave = "\u{1F44B}\u{1F3FD}";
        let heart = "\u{2764}\u{FE0F}";
        let out = segment_text(&format!("{wave}{heart}"));
        assert_eq!(texts(&out), vec![wave, heart]);
    }

    #[test]
    fn flag_pairs_and_keycaps_are_single_clusters() {
        let flag = "\u{1F1EF}\u{1F1F5}";
        let keycap = "1\u{FE0F}\u{20E3}";
        let out = segment_text(&format!("{flag}{keycap}1"));
        assert_eq!(texts(&out), vec![flag, keycap, "1"]);
        assert!(out[0].is_emoji && out[1].is_emoji && !out[2].is_emoji);
    }

    #[test]
    fn separator_runs_collapse_at_three() {
        let out = segment_text("-----");
        assert_eq!(out, vec![Segment::atomic("-----")]);

        let out = segment_text("--");
        assert_eq!(out, vec![Segment::plain("--")]);
    }

    #[test]
    fn separator_run_inside_text_is_isolated() {
        let out = segment_text("a━━━━b~~");
        assert_eq!(texts(&out), vec!["a", "━━━━", "b~~"]);
        assert!(out[1].no_wrap);
        assert!(!out[2].no_wrap);
    }

    #[test]
    fn repeated_non_separator_chars_stay_plain() {
        let out = segment_text("aaaa");
        assert_eq!(out, vec![Segment::plain("aaaa")]);
    }

    #[test]
    fn codepoint_keys_cover_common_spellings() {
        let keys = codepoint_keys("\u{2764}\u{FE0F}");
        assert_eq!(keys, vec!["2764", "2764-fe0f"]);

        let keys = codepoint_keys("\u{1F468}\u{200D}\u{1F469}");
        assert_eq!(
            keys,
            vec![
                "1f468-200d-1f469",
                "1f468-1f469",
                "1f468",
                "1f468-fe0f"
            ]
        );
    }

    #[test]
    fn contains_emoji_detects_clusters() {
        assert!(contains_emoji("ok 👍"));
        assert!(!contains_emoji("ok"));
    }
}
