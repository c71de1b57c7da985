//! Locale-aware headword collation.
//!
//! Headwords are compared the way a dictionary reader expects: accents and
//! case do not separate words at the first level (`árbol` sorts with `arbol`,
//! before `b`), and only break ties after that. Keys are precomputed once per
//! entry so sorting a snapshot is a plain key sort.

use std::cmp::Ordering;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Precomputed comparison key for one string.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CollationKey {
    /// Base letters only: decomposed, marks stripped, lowercased.
    primary: String,
    /// Decomposed and lowercased, marks kept.
    secondary: String,
    /// The string as given.
    tertiary: String,
}

impl CollationKey {
    pub fn new(s: &str) -> Self {
        let secondary: String = s.nfd().flat_map(char::to_lowercase).collect();
        let primary = secondary.chars().filter(|c| !is_combining_mark(*c)).collect();
        Self {
            primary,
            secondary,
            tertiary: s.to_string(),
        }
    }
}

/// Compare two strings in collation order.
pub fn compare(a: &str, b: &str) -> Ordering {
    CollationKey::new(a).cmp(&CollationKey::new(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(words: &[&str]) -> Vec<String> {
        let mut out: Vec<String> = words.iter().map(|w| w.to_string()).collect();
        out.sort_by(|a, b| compare(a, b));
        out
    }

    #[test]
    fn test_accents_sort_with_base_letter() {
        assert_eq!(sorted(&["zapato", "árbol", "banco"]), vec!["árbol", "banco", "zapato"]);
    }

    #[test]
    fn test_unaccented_before_accented_on_tie() {
        assert_eq!(compare("papa", "papá"), Ordering::Less);
        assert_eq!(compare("papá", "papas"), Ordering::Less);
    }

    #[test]
    fn test_case_insensitive_first() {
        assert_eq!(sorted(&["beta", "Alfa"]), vec!["Alfa", "beta"]);
        assert_ne!(compare("Sol", "sol"), Ordering::Equal);
    }

    #[test]
    fn test_precomposed_equals_decomposed_at_primary() {
        let composed = CollationKey::new("\u{e9}");
        let decomposed = CollationKey::new("e\u{301}");
        assert_eq!(composed.primary, decomposed.primary);
        assert_eq!(composed.secondary, decomposed.secondary);
    }

    #[test]
    fn test_enye_sorts_with_n() {
        assert_eq!(sorted(&["nube", "ñandú", "oso"]), vec!["ñandú", "nube", "oso"]);
    }
}
