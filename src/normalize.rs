// Cleanup applied to generated code before it is cached or returned

/// Returned when the upstream produced nothing usable. Never cached.
pub const NO_CODE_PLACEHOLDER: &str = "// No code generated";

/// Turns literal `\n`, `\t` and `\"` sequences into the characters they
/// stand for, then trims surrounding whitespace. May return an empty string.
pub fn normalize(raw: &str) -> String {
    raw.replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
        .trim()
        .to_string()
}

/// Normalized code, or `None` when nothing is left after cleanup.
pub fn normalize_non_empty(raw: &str) -> Option<String> {
    let code = normalize(raw);
    if code.is_empty() { None } else { Some(code) }
}
