//! Reduce a raw diff to the lines that change real content.
//!
//! Each line is judged on its own, in order:
//! 1. hint lines (`"? "`) are dropped;
//! 2. the marker and surrounding whitespace are stripped and blank results
//!    are dropped;
//! 3. stripped text starting with `#` (a spec comment) is dropped.
//!
//! Survivors are returned unmodified, in diff order.

use super::{DiffLine, DiffOrigin};

/// Lines of `diff` that represent an effective change.
pub fn effective_changes(diff: &[DiffLine]) -> Vec<DiffLine> {
    diff.iter()
        .filter(|line| line.origin != DiffOrigin::Hint && is_effective_text(&line.content))
        .cloned()
        .collect()
}

/// Same filter over the textual form (`"+ text"`, `"? ^^"`, ...).
pub fn effective_raw_lines<S: AsRef<str>>(diff: &[S]) -> Vec<String> {
    diff.iter()
        .map(AsRef::as_ref)
        .filter(|line| {
            if line.starts_with('?') {
                return false;
            }
            let text: String = line.chars().skip(2).collect();
            is_effective_text(&text)
        })
        .map(str::to_string)
        .collect()
}

fn is_effective_text(content: &str) -> bool {
    let stripped = content.trim();
    !stripped.is_empty() && !stripped.starts_with('#')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::line_diff;

    fn lines(raw: &[&str]) -> Vec<DiffLine> {
        raw.iter().map(|l| DiffLine::parse(l).unwrap()).collect()
    }

    #[test]
    fn drops_hint_lines() {
        let diff = lines(&["- Version: 1.0", "?            ^", "+ Version: 1.1", "?            ^"]);
        let effective = effective_changes(&diff);
        assert_eq!(effective.len(), 2);
        assert!(effective.iter().all(|l| l.origin != DiffOrigin::Hint));
    }

    #[test]
    fn drops_whitespace_only_lines() {
        let diff = lines(&["+ ", "-    ", "+ \t", "  "]);
        assert!(effective_changes(&diff).is_empty());
    }

    #[test]
    fn drops_comment_lines() {
        let diff = lines(&[
            "- # Generated by: spectacle version 0.25",
            "+ # Generated by: spectacle version 0.26",
            "+     # indented comment",
        ]);
        assert!(effective_changes(&diff).is_empty());
    }

    #[test]
    fn keeps_content_changes_verbatim_and_in_order() {
        let diff = lines(&[
            "  Name: pkg",
            "- Version: 1.0",
            "+ Version: 1.1",
            "+   BuildRequires: gcc   ",
        ]);
        let effective = effective_changes(&diff);
        let rendered: Vec<String> = effective.iter().map(|l| l.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "  Name: pkg",
                "- Version: 1.0",
                "+ Version: 1.1",
                "+   BuildRequires: gcc   ",
            ]
        );
    }

    #[test]
    fn hash_inside_content_is_not_a_comment() {
        let diff = lines(&["+ Source0: %{name}-%{version}.tar.gz#/pkg.tgz"]);
        assert_eq!(effective_changes(&diff).len(), 1);
    }

    #[test]
    fn filter_is_idempotent() {
        let diff = line_diff(
            "# Generated by: spectacle\nName: pkg\nVersion: 1.0\n",
            "# Generated by: spectacle 0.27\nName: pkg\n\nVersion: 1.1\n",
        );
        let once = effective_changes(&diff);
        let twice = effective_changes(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn raw_lines_follow_the_same_rules() {
        let raw = [
            "? ^",
            "+ ",
            "- # comment",
            "+ Version: 2",
            "  Name: pkg",
            "+\n",
        ];
        assert_eq!(effective_raw_lines(&raw), vec!["+ Version: 2", "  Name: pkg"]);
    }

    #[test]
    fn raw_and_structured_filters_agree() {
        let diff = line_diff("a\n# c\nb\n", "a\n# d\n\nB\n");
        let structured: Vec<String> = effective_changes(&diff)
            .iter()
            .map(|l| l.to_string())
            .collect();
        let raw: Vec<String> = diff.iter().map(|l| l.to_string()).collect();
        assert_eq!(effective_raw_lines(&raw), structured);
    }
}
