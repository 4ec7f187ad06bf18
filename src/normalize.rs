//! Text normalization shared by training and querying.
//!
//! [`normalize`] is the only function whose output reaches the embedding
//! model, so it must be a pure function of its input: identical text always
//! produces identical tokens regardless of locale or time.

use regex::Regex;
use std::sync::LazyLock;

use crate::stopwords;

static CASE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("valid case boundary regex"));
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_-]").expect("valid separator regex"));
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid punctuation regex"));

/// Tokens must be longer than this many characters to survive.
const MIN_TOKEN_CHARS: usize = 2;

/// Normalize raw endpoint or query text into space-separated tokens.
///
/// 1. `camelCase` / `PascalCase` boundaries become spaces.
/// 2. `-` and `_` become spaces.
/// 3. Punctuation becomes spaces.
/// 4. Everything is lowercased and split on whitespace.
/// 5. English/Spanish stopwords and tokens of two characters or fewer are
///    dropped.
///
/// ```rust
/// use endpoint_hub::normalize::normalize;
///
/// assert_eq!(normalize("getUserById"), "get user");
/// assert_eq!(normalize(""), "");
/// ```
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = CASE_BOUNDARY.replace_all(text, "$1 $2");
    let text = SEPARATORS.replace_all(&text, " ");
    let text = NON_WORD.replace_all(&text, " ");
    let text = text.to_lowercase();

    text.split_whitespace()
        .filter(|token| token.chars().count() > MIN_TOKEN_CHARS)
        .filter(|token| !stopwords::LANGUAGE.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_split() {
        assert_eq!(normalize("getUserById"), "get user");
        assert_eq!(normalize("ListOrderItems"), "list order items");
    }

    #[test]
    fn test_separators_and_punctuation() {
        assert_eq!(normalize("create-new_invoice"), "create new invoice");
        assert_eq!(normalize("/api/users/{userId}/orders?page=1"), "api users user orders page");
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t\n "), "");
        assert_eq!(normalize("a an of"), "");
    }

    #[test]
    fn test_bilingual_stopwords_removed() {
        assert_eq!(normalize("the list of all users"), "list users");
        assert_eq!(normalize("obtener todos los usuarios para el sistema"), "obtener usuarios sistema");
    }

    #[test]
    fn test_accented_words_survive() {
        assert_eq!(normalize("Añadir Canción"), "añadir canción");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "getUserById",
            "POST /v1/orders/{orderId}/items",
            "Eliminar usuario por ID del sistema",
            "already normalized tokens",
            "MixedCASEInput with-dashes_and_underscores!!",
            "ÁrbolDeDecisión Ñandú",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_no_short_or_stopword_tokens() {
        let out = normalize("I do a GET on the ID of my user, by id, in the API v2");
        for token in out.split(' ').filter(|t| !t.is_empty()) {
            assert!(token.chars().count() > 2, "short token {:?}", token);
            assert!(!stopwords::LANGUAGE.contains(token), "stopword {:?}", token);
        }
    }

    #[test]
    fn test_deterministic() {
        let a = normalize("fetchAccountBalance for customer");
        let b = normalize("fetchAccountBalance for customer");
        assert_eq!(a, b);
    }
}
