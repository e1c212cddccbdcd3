/// Sanitizes a single path segment for use as a MongoDB-style document key.
///
/// Applies, in order: (i) replaces `.` with `:`, (ii) strips NUL bytes,
/// (iii) strips all leading `$`. Idempotent: re-sanitizing a sanitized string
/// is a no-op.
///
/// # Examples
///
/// ```
/// use kraken_core::util::sanitize_mongo_key;
///
/// assert_eq!(sanitize_mongo_key("com.example.app"), "com:example:app");
/// assert_eq!(sanitize_mongo_key("$oid"), "oid");
/// assert_eq!(sanitize_mongo_key("$$oid"), "oid");
/// ```
pub fn sanitize_mongo_key(segment: &str) -> String {
    let replaced: String = segment
        .chars()
        .filter(|c| *c != '\0')
        .map(|c| if c == '.' { ':' } else { c })
        .collect();

    replaced.trim_start_matches('$').to_string()
}

/// Joins already-sanitized path segments into a store key using `__` as the
/// segment separator, per the `statistics__<series_id>__<stage_name>__<field>`
/// layout.
pub fn join_store_path<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .map(|s| sanitize_mongo_key(s.as_ref()))
        .collect::<Vec<_>>()
        .join("__")
}

#[cfg(test)]
mod test {
    use super::{join_store_path, sanitize_mongo_key};

    #[test]
    fn replaces_dots() {
        assert_eq!(sanitize_mongo_key("a.b.c"), "a:b:c");
    }

    #[test]
    fn strips_nul() {
        assert_eq!(sanitize_mongo_key("a\0b"), "ab");
    }

    #[test]
    fn strips_leading_dollar() {
        assert_eq!(sanitize_mongo_key("$ref"), "ref");
    }

    #[test]
    fn strips_all_leading_dollars() {
        assert_eq!(sanitize_mongo_key("$$oid"), "oid");
    }

    #[test]
    fn does_not_strip_inner_dollar() {
        assert_eq!(sanitize_mongo_key("a$b"), "a$b");
    }

    #[test]
    fn idempotent() {
        let input = "$a.b\0c";
        let once = sanitize_mongo_key(input);
        let twice = sanitize_mongo_key(&once);
        assert_eq!(once, twice);
        assert!(!twice.contains('.'));
        assert!(!twice.contains('\0'));
        assert!(!twice.starts_with('$'));
    }

    #[test]
    fn joins_segments() {
        let path = join_store_path(["statistics", "series.1", "detail", "cost"]);
        assert_eq!(path, "statistics__series:1__detail__cost");
    }
}
