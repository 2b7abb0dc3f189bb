//! Transcript post-processing applied before injection.

use crate::config::TextConfig;

/// Apply configured text transformations to a raw transcription.
///
/// Whitespace is always normalized (runs of whitespace collapse to single
/// spaces); leading/trailing trim and first-letter capitalization follow the
/// configuration.
pub fn process_text(text: &str, config: &TextConfig) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut result: String = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if !config.strip_spaces {
        // Preserve the original edge whitespace the normalization removed.
        if text.starts_with(char::is_whitespace) {
            result.insert(0, ' ');
        }
        if text.ends_with(char::is_whitespace) {
            result.push(' ');
        }
    }

    if config.auto_capitalize {
        let mut chars = result.chars();
        if let Some(first) = chars.find(|c| !c.is_whitespace())
            && first.is_lowercase()
        {
            let idx = result
                .char_indices()
                .find(|(_, c)| !c.is_whitespace())
                .map(|(i, _)| i)
                .unwrap_or(0);
            let upper: String = first.to_uppercase().collect();
            result.replace_range(idx..idx + first.len_utf8(), &upper);
        }
    }

    result
}
