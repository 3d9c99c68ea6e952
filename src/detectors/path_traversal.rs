//! Path Traversal Detection
//!
//! Flags user input that steers a filesystem path outside its intended
//! directory: `../` sequences, absolute paths into system directories, and
//! `file://` URIs smuggled in as filenames. Input is URL-decoded twice before
//! matching to catch double-encoded payloads; decode failures fall back to
//! the raw string.

use std::borrow::Cow;

use url::Url;

use super::data::{PATH_DANGEROUS_PARTS, PATH_DANGEROUS_STARTS};

/// Returns true when `user_input` constitutes a path traversal within the
/// resolved filesystem `path`. Absolute-path checks included.
pub fn detect_path_traversal(user_input: &str, path: &str) -> bool {
    detect_path_traversal_with(user_input, path, true)
}

/// As [`detect_path_traversal`], with the absolute-path-start check made
/// optional for call sites that pass deliberately absolute base paths.
pub fn detect_path_traversal_with(user_input: &str, path: &str, check_path_start: bool) -> bool {
    if user_input.is_empty() || path.is_empty() {
        return false;
    }
    // Single characters pose no traversal threat.
    if user_input.len() <= 1 {
        return false;
    }
    if user_input.len() > path.len() || !path.contains(user_input) {
        return false;
    }

    let input = double_decode(user_input).to_lowercase();
    let path = double_decode(path).to_lowercase();

    if contains_unsafe_parts(&input) && contains_unsafe_parts(&path) {
        return true;
    }

    // file:///etc/passwd handed over where a filename was expected.
    if let Ok(uri) = Url::parse(input.trim()) {
        if uri.scheme() == "file" && uri.path().len() > 1 && path.contains(uri.path()) {
            return true;
        }
    }

    if check_path_start {
        for start in PATH_DANGEROUS_STARTS {
            if input.starts_with(start) && path.starts_with(start) {
                return true;
            }
        }
    }
    false
}

/// Two decoding passes so `%252e%252e%252f` does not slip through.
fn double_decode(value: &str) -> String {
    let once = urlencoding::decode(value).unwrap_or(Cow::Borrowed(value));
    match urlencoding::decode(&once) {
        Ok(twice) => twice.into_owned(),
        Err(_) => once.into_owned(),
    }
}

fn contains_unsafe_parts(value: &str) -> bool {
    PATH_DANGEROUS_PARTS.iter().any(|part| value.contains(part))
}
