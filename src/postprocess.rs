//! Cosmetic clean-up of generated answers.
//!
//! Models like to open with "Based on the documents, …". The answer is
//! trimmed and the first matching prefix from an ordered list is removed,
//! then the first letter of what remains is capitalized. Only the leading
//! phrase ever changes.

/// Trim `raw` and strip the first prefix in `prefixes` it starts with.
///
/// ```rust
/// use doc_rag::postprocess::clean_answer;
///
/// let prefixes = vec!["Based on the documents,".to_string()];
/// let out = clean_answer("Based on the documents, revenue grew 5%.", &prefixes);
/// assert_eq!(out, "Revenue grew 5%.");
/// ```
pub fn clean_answer(raw: &str, prefixes: &[String]) -> String {
    let answer = raw.trim();

    let Some(rest) = prefixes
        .iter()
        .filter(|p| !p.is_empty())
        .find_map(|p| answer.strip_prefix(p.as_str()))
    else {
        return answer.to_string();
    };

    capitalize_first(rest.trim())
}

/// Uppercase the first character when it is alphabetic.
fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() => first.to_uppercase().chain(chars).collect(),
        _ => text.to_string(),
    }
}
