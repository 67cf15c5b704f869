//! Text helpers shared by the importer, exporter and settings
//!
//! These mirror the normalisation rules catalog data goes through on the
//! way in: slugs, keys, file names and free-text values.

/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Strip markup tags from a string.
fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Clean a free-text value: drop markup and control characters, collapse
/// whitespace runs into one space and trim.
pub fn clean(input: &str) -> String {
    let stripped = strip_tags(input);
    let mut out = String::with_capacity(stripped.len());
    let mut pending_space = false;
    for ch in stripped.chars() {
        if ch.is_whitespace() {
            pending_space = true;
        } else if ch.is_control() {
            continue;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        }
    }
    out
}

/// Turn arbitrary text into a URL-safe slug.
///
/// Lowercases, keeps alphanumerics and underscores, maps whitespace, dots
/// and slashes to dashes, collapses repeated dashes and trims them from
/// both ends.
pub fn sanitize_title(input: &str) -> String {
    let stripped = strip_tags(input);
    let mut out = String::with_capacity(stripped.len());
    for ch in stripped.chars().flat_map(char::to_lowercase) {
        let mapped = if ch.is_alphanumeric() || ch == '_' {
            Some(ch)
        } else if ch.is_whitespace() || matches!(ch, '-' | '.' | '/') {
            Some('-')
        } else {
            None
        };
        if let Some(c) = mapped {
            if c == '-' && (out.is_empty() || out.ends_with('-')) {
                continue;
            }
            out.push(c);
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Reduce a string to a lowercase key of `[a-z0-9_-]`.
pub fn sanitize_key(input: &str) -> String {
    input
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Sanitize a file name taken from an untrusted package.
///
/// Only the last path component survives; shell and URL special characters
/// are removed, whitespace becomes dashes, and leading/trailing dots, dashes
/// and underscores are trimmed. Returns an empty string when nothing usable
/// is left.
pub fn sanitize_file_name(input: &str) -> String {
    const SPECIAL: &[char] = &[
        '?', '[', ']', '/', '\\', '=', '<', '>', ':', ';', ',', '\'', '"', '&', '$', '#', '*',
        '(', ')', '|', '~', '`', '!', '{', '}', '%', '+',
    ];

    let base = input.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut out = String::with_capacity(base.len());
    for ch in base.chars() {
        if ch.is_control() || SPECIAL.contains(&ch) {
            continue;
        }
        let c = if ch.is_whitespace() { '-' } else { ch };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches(|c| c == '.' || c == '-' || c == '_')
        .to_string()
}

/// Human-readable term name derived from a slug: `-` and `_` become spaces
/// and every word is capitalised (`"dark-blue_xl"` → `"Dark Blue Xl"`).
pub fn term_name_from_slug(slug: &str) -> String {
    slug.replace(['-', '_'], " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_tags_and_collapses_whitespace() {
        assert_eq!(clean("  <b>Blue</b>\t\n Shirt  "), "Blue Shirt");
        assert_eq!(clean("SKU-001\u{0007}"), "SKU-001");
        assert_eq!(clean(""), "");
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Dark Blue"), "dark-blue");
        assert_eq!(sanitize_title("  --Size: XL!--  "), "size-xl");
        assert_eq!(sanitize_title("pa_color"), "pa_color");
        assert_eq!(sanitize_title("v1.2/beta"), "v1-2-beta");
        assert_eq!(sanitize_title("Größe"), "größe");
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("Publish"), "publish");
        assert_eq!(sanitize_key(" on backorder "), "onbackorder");
        assert_eq!(sanitize_key("_custom-Field.1"), "_custom-field1");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("my photo (1).jpg"), "my-photo-1.jpg");
        assert_eq!(sanitize_file_name("C:\\images\\shirt.png"), "shirt.png");
        assert_eq!(sanitize_file_name(".."), "");
        assert_eq!(sanitize_file_name(""), "");
    }

    #[test]
    fn test_term_name_from_slug() {
        assert_eq!(term_name_from_slug("dark-blue"), "Dark Blue");
        assert_eq!(term_name_from_slug("extra_large"), "Extra Large");
        assert_eq!(term_name_from_slug("xl"), "Xl");
    }
}
