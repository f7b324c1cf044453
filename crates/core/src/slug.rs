//! Slug generation
//!
//! Every catalog entity derives its slug from its identifying text. Slugs double
//! as directory and file names under the media root, so the output alphabet is
//! restricted to `[a-z0-9_]`.

use deunicode::deunicode;
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_]+").expect("valid regex"));
static REPEATED_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").expect("valid regex"));

/// Normalizes free text into a path-safe token.
///
/// Non-ASCII characters are transliterated, the text is lowercased, whitespace
/// runs become a single `_` and anything outside `[a-z0-9_]` is dropped.
/// Repeated separators are collapsed and leading/trailing separators trimmed.
///
/// An empty result means the text carries no usable identity.
///
/// ```
/// use audioshelf_core::slugify;
///
/// assert_eq!(slugify("Émile  Zola"), "emile_zola");
/// assert_eq!(slugify("  --  "), "");
/// ```
pub fn slugify(text: &str) -> String {
    let lowered = deunicode(text).to_lowercase();
    let underscored = WHITESPACE.replace_all(&lowered, "_");
    let stripped = DISALLOWED.replace_all(&underscored, "");
    let collapsed = REPEATED_SEPARATOR.replace_all(&stripped, "_");
    collapsed.trim_matches('_').to_string()
}
