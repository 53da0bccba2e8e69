//! URL-safe slug derivation

/// Convert a title to a URL-safe slug.
///
/// Lowercases, turns runs of whitespace or underscores into hyphens, drops
/// everything outside `[a-z0-9-]`, collapses hyphen runs and trims hyphens
/// from the ends. An empty result becomes "untitled". Idempotent:
/// `slugify(slugify(t)) == slugify(t)`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());

    for c in title.to_lowercase().chars() {
        if c.is_whitespace() || c == '_' || c == '-' {
            if !slug.ends_with('-') {
                slug.push('-');
            }
        } else if c.is_ascii_alphanumeric() {
            slug.push(c);
        }
    }

    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_titles() {
        assert_eq!(slugify("Summer Mix 2024"), "summer-mix-2024");
        assert_eq!(slugify("  For __ You  "), "for-you");
        assert_eq!(slugify("Nick Cave & The Bad Seeds!"), "nick-cave-the-bad-seeds");
    }

    #[test]
    fn test_empty_and_symbol_only() {
        assert_eq!(slugify(""), "untitled");
        assert_eq!(slugify("???"), "untitled");
        assert_eq!(slugify("---"), "untitled");
    }

    #[test]
    fn test_idempotent() {
        for title in ["Summer Mix", "a--b__c", "Ünïcode Tape", "untitled-3"] {
            let once = slugify(title);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn test_hyphen_runs_collapse() {
        assert_eq!(slugify("a - b -- c"), "a-b-c");
    }
}
