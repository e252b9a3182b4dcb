//! Note titles double as file stems, so they are sanitized before use.

/// Characters that cannot appear in a file name on at least one platform.
pub const FORBIDDEN_TITLE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

const REPLACEMENT: char = '_';

/// Trim surrounding whitespace and replace every forbidden or control
/// character with `_`.
///
/// The result is both the index key and the content file stem. An empty
/// result means the title was blank.
pub fn sanitize_title(title: &str) -> String {
    title
        .trim()
        .chars()
        .map(|c| {
            if FORBIDDEN_TITLE_CHARS.contains(&c) || c.is_control() {
                REPLACEMENT
            } else {
                c
            }
        })
        .collect()
}
