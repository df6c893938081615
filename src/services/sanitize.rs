pub const MAX_ADDRESS_LENGTH: usize = 500;
pub const MAX_RIDE_NOTES_LENGTH: usize = 500;

const STRIPPED: &[char] = &['<', '>', '\'', '"', '`', '\\', '/'];

/// Drops markup-significant characters, collapses whitespace runs and caps
/// the result at [`MAX_ADDRESS_LENGTH`] characters.
pub fn sanitize_address(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| word.replace(STRIPPED, ""))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_ADDRESS_LENGTH)
        .collect()
}

pub fn normalize_optional(input: Option<String>) -> Option<String> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_collapses_whitespace() {
        assert_eq!(sanitize_address("  123 Main St  "), "123 Main St");
        assert_eq!(sanitize_address("123   Main \t\n St"), "123 Main St");
    }

    #[test]
    fn strips_markup_characters() {
        assert_eq!(
            sanitize_address("123<script>Main</script>"),
            "123scriptMainscript"
        );
        let cleaned = sanitize_address(r#"test"quotes' back\slash `tick`"#);
        assert!(!cleaned.contains(['"', '\'', '\\', '`']));
    }

    #[test]
    fn caps_length() {
        let long = "a".repeat(600);
        assert_eq!(sanitize_address(&long).chars().count(), MAX_ADDRESS_LENGTH);
    }

    #[test]
    fn blank_optional_becomes_none() {
        assert_eq!(normalize_optional(Some("   ".into())), None);
        assert_eq!(normalize_optional(Some(" ring bell ".into())), Some("ring bell".into()));
        assert_eq!(normalize_optional(None), None);
    }
}
