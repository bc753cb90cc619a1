//! Pure path matching for virtual catalog paths and server path segments.
//!
//! Virtual paths are strings joined with a per-node separator; server
//! inventory paths are pre-split segment sequences. Both forms get strict,
//! segment-aligned matching here: `"/ab"` is never an ancestor of `"/abc"`.

/// How trailing separators are treated by [`matches_wanted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingPolicy {
    /// Paths match when equal or differing by exactly one trailing
    /// separator on either side.
    #[default]
    Single,
    /// Any run of trailing separators is collapsed before comparison, for
    /// catalogs known to carry sloppy paths.
    Normalize,
}

/// Strict ancestry: `candidate` is a proper, segment-aligned prefix of
/// `target`, with the boundary at `candidate`'s own separator.
///
/// The empty candidate (a root document) is an ancestor of everything.
/// `is_ancestor_of(p, p, _)` is false for all `p`. An empty separator
/// degrades to a plain prefix check since no boundary can exist.
pub fn is_ancestor_of(candidate: &str, target: &str, sep: &str) -> bool {
    if candidate == target {
        return false;
    }
    if candidate.is_empty() {
        return true;
    }
    let rest = match target.strip_prefix(candidate) {
        Some(rest) => rest,
        None => return false,
    };
    if sep.is_empty() {
        return true;
    }
    candidate.ends_with(sep) || rest.starts_with(sep)
}

/// Terminal match: `candidate` equals `target`, modulo trailing separators
/// per the policy.
pub fn matches_wanted(candidate: &str, target: &str, sep: &str, policy: TrailingPolicy) -> bool {
    if candidate == target {
        return true;
    }
    if sep.is_empty() {
        return false;
    }
    match policy {
        TrailingPolicy::Single => {
            candidate.strip_suffix(sep) == Some(target)
                || target.strip_suffix(sep) == Some(candidate)
        }
        TrailingPolicy::Normalize => {
            strip_trailing(candidate, sep) == strip_trailing(target, sep)
        }
    }
}

/// Whether descending through `candidate` can still reach `target`.
///
/// Used for child-candidate selection during the walk, where the boundary
/// separator belongs to the not-yet-fetched child and cannot be checked
/// here; the child's own ancestry check rejects false positives one level
/// down.
pub fn could_lead_to(candidate: &str, target: &str) -> bool {
    target.starts_with(candidate)
}

fn strip_trailing<'a>(path: &'a str, sep: &str) -> &'a str {
    let mut out = path;
    while let Some(stripped) = out.strip_suffix(sep) {
        out = stripped;
    }
    out
}

/// Segment form: does the front of `test` match all of `targ`?
/// (`test` lies at or under `targ`.)
pub fn at_or_under(test: &[String], targ: &[String]) -> bool {
    if test.len() < targ.len() {
        return false;
    }
    test.iter().zip(targ.iter()).all(|(a, b)| a == b)
}

/// Segment form: is `test` a proper ancestor of `targ`?
/// The empty test path leads to everything.
pub fn leads_to(test: &[String], targ: &[String]) -> bool {
    if test.len() >= targ.len() {
        return false;
    }
    test.iter().zip(targ.iter()).all(|(a, b)| a == b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn segs(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ancestor_basic() {
        assert!(is_ancestor_of("", "tag:das2.org,2012:site", ""));
        assert!(is_ancestor_of("site:/uiowa", "site:/uiowa/juno", "/"));
        assert!(!is_ancestor_of("site:/uiowa/juno", "site:/uiowa", "/"));
    }

    #[test]
    fn test_ancestor_is_strict() {
        assert!(!is_ancestor_of("site:/uiowa", "site:/uiowa", "/"));
        assert!(!is_ancestor_of("", "", "/"));
    }

    #[test]
    fn test_no_partial_segment_match() {
        assert!(!is_ancestor_of("/ab", "/abc", "/"));
        assert!(is_ancestor_of("/ab", "/ab/c", "/"));
    }

    #[test]
    fn test_ancestor_candidate_with_trailing_sep() {
        assert!(is_ancestor_of("/uiowa/", "/uiowa/juno", "/"));
    }

    #[test]
    fn test_matches_wanted_trailing() {
        assert!(matches_wanted("a/b", "a/b", "/", TrailingPolicy::Single));
        assert!(matches_wanted("a/b/", "a/b", "/", TrailingPolicy::Single));
        assert!(matches_wanted("a/b", "a/b/", "/", TrailingPolicy::Single));
        assert!(!matches_wanted("a/b//", "a/b", "/", TrailingPolicy::Single));
        assert!(matches_wanted("a/b//", "a/b", "/", TrailingPolicy::Normalize));
        assert!(!matches_wanted("a//b", "a/b", "/", TrailingPolicy::Normalize));
    }

    #[test]
    fn test_segment_helpers() {
        let targ = segs(&["juno", "wav"]);
        assert!(at_or_under(&segs(&["juno", "wav", "survey"]), &targ));
        assert!(at_or_under(&segs(&["juno", "wav"]), &targ));
        assert!(!at_or_under(&segs(&["juno"]), &targ));
        assert!(leads_to(&segs(&["juno"]), &targ));
        assert!(leads_to(&segs(&[]), &targ));
        assert!(!leads_to(&segs(&["juno", "wav"]), &targ));
        assert!(!leads_to(&segs(&["cassini"]), &targ));
    }

    proptest! {
        #[test]
        fn prop_ancestor_never_reflexive(p in "[a-z:/]{0,24}") {
            prop_assert!(!is_ancestor_of(&p, &p, "/"));
        }

        #[test]
        fn prop_trailing_sep_always_matches(p in "[a-z:/]{0,24}", sep in "[/:.]") {
            let with_sep = format!("{}{}", p, sep);
            prop_assert!(matches_wanted(&p, &with_sep, &sep, TrailingPolicy::Single));
            prop_assert!(matches_wanted(&with_sep, &p, &sep, TrailingPolicy::Single));
        }

        #[test]
        fn prop_joined_child_is_descendant(p in "[a-z]{1,8}", k in "[a-z]{1,8}") {
            let child = format!("{}/{}", p, k);
            prop_assert!(is_ancestor_of(&p, &child, "/"));
            prop_assert!(could_lead_to(&p, &child));
        }
    }
}
