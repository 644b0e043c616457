//! Emoji grapheme-cluster extraction and stripping, shared by the statistics
//! engine (counting) and the sampler (cleaning messages before prompt assembly).

use unicode_segmentation::UnicodeSegmentation;

/// True when `c` falls in one of the common emoji code-point blocks. Not an
/// exhaustive Unicode emoji-property check, but covers the ranges that matter
/// for the base-emoji + modifier grapheme clusters §4.2 describes.
fn is_emoji_scalar(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1FAFF
        | 0x2600..=0x27BF
        | 0x2B00..=0x2BFF
        | 0x1F1E6..=0x1F1FF
        | 0x2190..=0x21FF
        | 0x2300..=0x23FF
        | 0x1F000..=0x1F0FF
        | 0x2700..=0x27BF
    )
}

/// True when `c` is a combining modifier that can trail a base emoji within
/// the same grapheme cluster: a non-spacing mark, the variation selector, a
/// zero-width joiner, or a Fitzpatrick skin-tone modifier.
fn is_emoji_modifier(c: char) -> bool {
    matches!(c as u32, 0x1F3FB..=0x1F3FF | 0xFE00..=0xFE0F | 0x200D)
}

fn grapheme_is_emoji(cluster: &str) -> bool {
    cluster.chars().next().is_some_and(is_emoji_scalar)
        && cluster.chars().skip(1).all(|c| is_emoji_scalar(c) || is_emoji_modifier(c))
}

/// Extract every emoji grapheme cluster from `text`, in order, with repeats
/// (the caller tallies frequency).
pub fn extract(text: &str) -> Vec<String> {
    text.graphemes(true)
        .filter(|g| grapheme_is_emoji(g))
        .map(str::to_string)
        .collect()
}

/// Remove all emoji grapheme clusters from `text`, collapsing the resulting
/// whitespace runs.
pub fn strip(text: &str) -> String {
    let stripped: String = text
        .graphemes(true)
        .filter(|g| !grapheme_is_emoji(g))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
