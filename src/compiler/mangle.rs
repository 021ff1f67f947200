//! RFC 1035 label mangling
//!
//! Stage and repository names are free text. Cluster resource names are not:
//! lowercase ASCII letters, digits and hyphens, starting with a letter, not
//! ending with a hyphen, at most 63 characters.

use regex::Regex;
use std::sync::LazyLock;

/// Longest valid RFC 1035 label
pub const MAX_LABEL_LEN: usize = 63;

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9-]+").expect("DISALLOWED is a valid regex"));

static HYPHEN_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-{2,}").expect("HYPHEN_RUNS is a valid regex"));

static LEADING_NON_LETTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9-]+").expect("LEADING_NON_LETTERS is a valid regex"));

/// Lowercase, map spaces to hyphens, drop everything outside `[a-z0-9-]`
/// and collapse hyphen runs. Leading and trailing hyphens are removed.
fn sanitize(raw: &str) -> String {
    let lowered = raw.to_ascii_lowercase().replace(' ', "-");
    let allowed = DISALLOWED.replace_all(&lowered, "");
    let collapsed = HYPHEN_RUNS.replace_all(&allowed, "-");
    collapsed.trim_matches('-').to_string()
}

fn truncate(value: &str, max: usize) -> &str {
    // sanitized values are pure ASCII, so byte offsets are char boundaries
    let end = value.len().min(max);
    value[..end].trim_end_matches('-')
}

/// Turn `name` into a valid RFC 1035 label ending in `-<suffix>`
///
/// The base is truncated, never the suffix, so that labels generated for
/// different tasks stay distinguishable. A name with nothing usable in it
/// falls back to the suffix alone.
pub fn mangle_to_rfc1035_label(name: &str, suffix: &str) -> String {
    let suffix = sanitize(suffix);
    let suffix = truncate(&suffix, MAX_LABEL_LEN - 1);

    let base = sanitize(name);
    let base = LEADING_NON_LETTERS.replace(&base, "");
    let budget = if suffix.is_empty() {
        MAX_LABEL_LEN
    } else {
        MAX_LABEL_LEN - 1 - suffix.len()
    };
    let base = truncate(&base, budget);

    match (base.is_empty(), suffix.is_empty()) {
        (false, false) => format!("{}-{}", base, suffix),
        (false, true) => base.to_string(),
        (true, _) => {
            if suffix.starts_with(|c: char| c.is_ascii_alphabetic()) {
                suffix.to_string()
            } else {
                format!("x{}", suffix)
            }
        }
    }
}

/// Suffix for the `n`th generated task: `<suffix>-<n>`, or `<n>` alone
///
/// The caller's suffix is shortened so that the number always survives
/// [`mangle_to_rfc1035_label`], which keeps task labels unique however long
/// the suffix is.
pub fn numbered_suffix(suffix: &str, n: usize) -> String {
    let number = n.to_string();
    let suffix = sanitize(suffix);
    let room = (MAX_LABEL_LEN - 1).saturating_sub(number.len() + 1);
    let kept = truncate(&suffix, room);

    if kept.is_empty() {
        number
    } else {
        format!("{}-{}", kept, number)
    }
}
