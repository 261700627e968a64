use std::borrow::Cow;

pub const CLASS_SUFFIX: &str = ".class";

/// `a/b/Outer$Inner$1.class` -> `a/b/Outer.class`.
///
/// Strips from the first `$` in the file name that is followed only by
/// ASCII alphanumerics and further `$` up to the `.class` suffix.
pub fn strip_inner_class(path: &str) -> Cow<'_, str> {
    let Some(stem) = path.strip_suffix(CLASS_SUFFIX) else {
        return Cow::Borrowed(path);
    };
    let file_start = stem.rfind('/').map_or(0, |slash| slash + 1);

    for (offset, _) in stem[file_start..].match_indices('$') {
        let dollar = file_start + offset;
        let rest = &stem[dollar + 1..];
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'$') {
            return Cow::Owned(format!("{}{}", &stem[..dollar], CLASS_SUFFIX));
        }
    }
    Cow::Borrowed(path)
}

/// Everything before the last `/`, or `None` for a bare file name.
pub fn parent_dir(path: &str) -> Option<&str> {
    path.rfind('/').map(|slash| &path[..slash])
}

/// True when `path` is `prefix` itself or lies below it, on a segment boundary.
pub fn has_path_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Internal class name for a `.class` entry, without the suffix.
pub fn class_name_of(entry: &str) -> Option<&str> {
    entry.strip_suffix(CLASS_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_nested_and_anonymous_suffixes() {
        assert_eq!(strip_inner_class("a/b/Outer$Inner.class"), "a/b/Outer.class");
        assert_eq!(strip_inner_class("a/b/Outer$Inner$1.class"), "a/b/Outer.class");
        assert_eq!(strip_inner_class("a/b/Outer.class"), "a/b/Outer.class");
    }

    #[test]
    fn keeps_odd_suffixes_it_cannot_strip_whole() {
        assert_eq!(strip_inner_class("a/b/Outer$in_ner$1.class"), "a/b/Outer$in_ner.class");
        assert_eq!(strip_inner_class("a/b/Trailing$.class"), "a/b/Trailing$.class");
        assert_eq!(strip_inner_class("a$b/Plain.class"), "a$b/Plain.class");
        assert_eq!(strip_inner_class("a/b/data.json"), "a/b/data.json");
    }

    #[test]
    fn parent_directories() {
        assert_eq!(parent_dir("a/b/C.class"), Some("a/b"));
        assert_eq!(parent_dir("C.class"), None);
    }

    #[test]
    fn prefix_matching_respects_segments() {
        assert!(has_path_prefix("a/b/C.class", "a/b"));
        assert!(has_path_prefix("a/b/C.class", "a/b/"));
        assert!(has_path_prefix("a/b", "a/b"));
        assert!(!has_path_prefix("a/bc/C.class", "a/b"));
    }
}
