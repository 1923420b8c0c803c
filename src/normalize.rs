//! Canonical form for header and label strings.
//!
//! Spreadsheet headers drift between releases ("Catégorie", "CATEGORIE",
//! "Caté gorie" with a non-breaking space). Every lookup in the crate goes
//! through [`normalize`] so that those spellings compare equal.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Normalize a label for tolerant comparison.
///
/// Applies compatibility decomposition (NFKD), drops combining marks,
/// turns non-breaking spaces into ordinary spaces, collapses whitespace runs
/// to a single space, trims and lowercases.
///
/// # Examples
/// ```
/// use ophtatrack::normalize::normalize;
///
/// assert_eq!(normalize("  Caté\u{00A0}gorie "), "cate gorie");
/// assert_eq!(normalize("PATHOLOGIE"), normalize("Pathologie"));
/// ```
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c == '\u{00A0}' { ' ' } else { c })
        .collect();

    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    // Lowercasing can produce new decomposable characters (e.g. 'İ'), so the
    // result is decomposed and stripped once more to keep the form stable.
    collapsed
        .to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Same as [`normalize`], with absent input mapped to the empty string.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}

/// True when `needle` (normalized) occurs inside `haystack` (normalized).
///
/// An empty needle matches everything.
pub fn contains_normalized(haystack: &str, needle: &str) -> bool {
    normalize(haystack).contains(&normalize(needle))
}

/// Normalized string to a URL- and path-safe slug: runs of anything that is
/// not alphanumeric become a single `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;

    for c in normalize(text).chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_accents_and_case() {
        assert_eq!(normalize("Pathologie"), normalize("PATHOLOGIE"));
        assert_eq!(normalize("Téléphone"), "telephone");
        assert_eq!(normalize("Priorité (Faible/Moyen/Urgent)"), "priorite (faible/moyen/urgent)");
    }

    #[test]
    fn non_breaking_space_is_a_space() {
        assert_eq!(normalize("Caté\u{00A0}gorie"), normalize("cate gorie"));
        assert_eq!(normalize("Date\u{00A0}de consultation"), "date de consultation");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("  Nom   du\tpatient \n"), "nom du patient");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn absent_input_is_empty() {
        assert_eq!(normalize_opt(None), "");
        assert_eq!(normalize_opt(Some(" Nom ")), "nom");
    }

    #[test]
    fn substring_match_ignores_accents() {
        assert!(contains_normalized("Glaucome chronique", "GLAUCOME"));
        assert!(contains_normalized("Décollement de rétine", "retine"));
        assert!(contains_normalized("anything", ""));
        assert!(!contains_normalized("Cataracte", "glaucome"));
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("Fond d'œil (OD).JPG"), "fond-d-œil-od-jpg");
        assert_eq!(slugify("  Dupont  Jean "), "dupont-jean");
        assert_eq!(slugify("---"), "");
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(s in "[a-zA-Z0-9éèêàçÉÈÀÇœŒ/()' \t\u{00A0}\u{0301}]{0,32}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalize_ignores_case(s in "[a-zA-Zéèàç ]{0,24}") {
            prop_assert_eq!(normalize(&s.to_uppercase()), normalize(&s.to_lowercase()));
        }
    }
}
