use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::models::{Language, Model};

// Bump when the key layout changes so old entries are never misread
pub const KEY_PREFIX: &str = "codegen:v1";

// Not part of any model id, language id or the url-safe base64 alphabet
const DELIMITER: char = '|';

// Create a cache key from model + language + raw prompt bytes.
// The prompt is base64 encoded, so distinct prompts never share a key.
pub fn make_cache_key(model: Model, language: Language, prompt: &str) -> String {
    format!(
        "{KEY_PREFIX}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}",
        model.id(),
        language.id(),
        URL_SAFE_NO_PAD.encode(prompt.as_bytes())
    )
}
