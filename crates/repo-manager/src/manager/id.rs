//! Repository id generation

/// Prefix used when a base name sanitizes to nothing usable.
pub const DEFAULT_ID_PREFIX: &str = "repository-";

/// Reduce `base_name` to the id character set.
///
/// Letters and digits are kept (lower-cased), as are `-`, `_` and `.`.
/// Quotes are dropped; everything else becomes `-`.
pub fn sanitize_id(base_name: &str) -> String {
    let mut id = String::with_capacity(base_name.len());
    for c in base_name.trim().chars() {
        if c.is_alphanumeric() {
            id.extend(c.to_lowercase());
        } else if matches!(c, '-' | '_' | '.') {
            id.push(c);
        } else if !matches!(c, '"' | '\'') {
            id.push('-');
        }
    }
    id
}

/// Generate an id from `base_name` that `is_taken` rejects.
///
/// The sanitized name is used as is when it is free. Otherwise numeric
/// suffixes starting at 2 are appended (`name-2`, `name-3`, ...), falling
/// back to [`DEFAULT_ID_PREFIX`] when nothing usable is left of the name.
pub fn generate_id(base_name: &str, is_taken: impl Fn(&str) -> bool) -> String {
    let sanitized = sanitize_id(base_name);
    let usable = repo_fs::validate_path_identifier(&sanitized).is_ok();
    if usable && !is_taken(&sanitized) {
        return sanitized;
    }

    let prefix = if usable {
        if sanitized.ends_with('-') {
            sanitized
        } else {
            format!("{sanitized}-")
        }
    } else {
        DEFAULT_ID_PREFIX.to_string()
    };

    let mut index: u64 = 2;
    loop {
        let candidate = format!("{prefix}{index}");
        if !is_taken(&candidate) {
            return candidate;
        }
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("My Store", "my-store")]
    #[case("  padded  ", "padded")]
    #[case("\"quoted\" name", "quoted-name")]
    #[case("it's", "its")]
    #[case("a/b\\c", "a-b-c")]
    #[case("Ünïcode", "ünïcode")]
    #[case("v1.2_beta", "v1.2_beta")]
    fn test_sanitize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_id(input), expected);
    }

    #[test]
    fn test_free_name_is_used_verbatim() {
        assert_eq!(generate_id("My Store", |_| false), "my-store");
    }

    #[test]
    fn test_taken_names_get_suffixes() {
        let taken = ["my-store", "my-store-2"];
        assert_eq!(generate_id("My Store", |id| taken.contains(&id)), "my-store-3");
    }

    #[test]
    fn test_trailing_dash_is_not_doubled() {
        assert_eq!(generate_id("store-", |id| id == "store-"), "store-2");
    }

    #[rstest]
    #[case("")]
    #[case("\"\"")]
    #[case("..")]
    fn test_unusable_names_fall_back_to_prefix(#[case] input: &str) {
        assert_eq!(generate_id(input, |_| false), "repository-2");
    }
}
