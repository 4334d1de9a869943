#![no_main]

use dblib_stmt::rewrite_markers;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|sql: &str| {
    let rewritten = rewrite_markers(sql);

    // Quotes are never added or removed.
    assert_eq!(
        rewritten.matches('\'').count(),
        sql.matches('\'').count()
    );
});
