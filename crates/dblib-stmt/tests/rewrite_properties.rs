//! Property tests for marker rewriting.

use dblib_stmt::rewrite_markers;
use proptest::prelude::*;

/// Statement text built from fragments that exercise every scanner branch.
fn statement() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("?".to_string()),
            Just(":".to_string()),
            Just("'".to_string()),
            "[a-z0-9 ,=@()]{0,6}",
            "[\\u{80}-\\u{10FF}]{1,2}",
        ],
        0..24,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn no_markers_is_identity(sql in "[^?:]{0,64}") {
        prop_assert_eq!(rewrite_markers(&sql), sql.as_str());
    }

    #[test]
    fn quoted_text_untouched(sql in statement()) {
        let rewritten = rewrite_markers(&sql);
        let quoted = |s: &str| -> Vec<String> {
            s.split('\'').skip(1).step_by(2).map(str::to_string).collect()
        };
        prop_assert_eq!(quoted(rewritten.as_ref()), quoted(sql.as_str()));
    }

    #[test]
    fn no_markers_left_outside_quotes(sql in statement()) {
        let rewritten = rewrite_markers(&sql);
        let outside: String = rewritten.split('\'').step_by(2).collect();
        prop_assert!(!outside.contains('?'));
        prop_assert!(!outside.contains(':'));
    }

    #[test]
    fn positional_markers_numbered_in_order(count in 0usize..30) {
        let sql = vec!["?"; count].join(" ");
        let expected: Vec<String> = (1..=count).map(|n| format!("@{n}")).collect();
        prop_assert_eq!(rewrite_markers(&sql).into_owned(), expected.join(" "));
    }
}
