use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Matching key for headers and file names: lower-cased, accents dropped,
/// whitespace runs collapsed. Never used for display values.
pub fn normalize_text(text: &str) -> String {
    let folded = text
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|character| !is_combining_mark(*character))
        .collect::<String>();

    condense_whitespace(&folded)
}

pub fn condense_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}
