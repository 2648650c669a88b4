// Kernel mount option strings
//
// Converts between resolved options and the `key=value,flag,...` form passed
// to `mount -o`.

use std::collections::BTreeMap;

/// Separator between options in a kernel option string.
pub const OPTION_DELIMITER: char = ',';

/// Separator between key and value used by `mount -o`.
pub const DEFAULT_SEPARATOR: &str = "=";

/// Render options as a kernel option string.
///
/// Values that parse as a 16-bit signed integer are re-rendered (dropping
/// leading zeros and `+` signs), empty values become bare flags, and the
/// fragments are sorted so equal inputs always produce the same string.
pub fn encode<'a, I, K, V>(opts: I) -> String
where
    I: IntoIterator<Item = (&'a K, &'a V)>,
    K: AsRef<str> + ?Sized + 'a,
    V: AsRef<str> + ?Sized + 'a,
{
    let mut fragments: Vec<String> = opts
        .into_iter()
        .map(|(key, value)| encode_fragment(key.as_ref(), value.as_ref()))
        .collect();

    fragments.sort();
    fragments.join(",")
}

fn encode_fragment(key: &str, value: &str) -> String {
    if let Ok(n) = value.parse::<i16>() {
        format!("{}={}", key, n)
    } else if value.is_empty() {
        key.to_string()
    } else {
        format!("{}={}", key, value)
    }
}

/// Parse a kernel option string.
///
/// Each fragment is split on the first `separator`; fragments without one
/// map to an empty value. An empty separator splits after the first
/// character. Later duplicates win.
pub fn decode(option_string: &str, separator: &str) -> BTreeMap<String, String> {
    let mut opts = BTreeMap::new();

    if option_string.is_empty() {
        return opts;
    }

    for fragment in option_string.split(OPTION_DELIMITER) {
        let (key, value) = split_fragment(fragment, separator);
        opts.insert(key.to_string(), value.to_string());
    }

    opts
}

fn split_fragment<'a>(fragment: &'a str, separator: &str) -> (&'a str, &'a str) {
    if separator.is_empty() {
        return match fragment.chars().next() {
            Some(first) => fragment.split_at(first.len_utf8()),
            None => (fragment, ""),
        };
    }

    fragment.split_once(separator).unwrap_or((fragment, ""))
}
