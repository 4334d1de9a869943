//! Parameter-marker rewriting for `sp_executesql`.
//!
//! `:name` becomes `@name` and each `?` becomes `@1`, `@2`, ... in
//! encounter order. A bare `'` toggles a string-literal region in which
//! nothing is rewritten; doubled quotes simply toggle twice.

use std::borrow::Cow;

/// Scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    Quoted,
}

/// Rewrite `:name` and `?` markers into `@`-prefixed markers.
///
/// Returns a borrowed `Cow` when the text contains no markers outside
/// string literals.
#[must_use]
pub fn rewrite_markers(sql: &str) -> Cow<'_, str> {
    let mut out: Option<String> = None;
    let mut state = State::Normal;
    let mut positional = 0u32;

    for (idx, c) in sql.char_indices() {
        match (state, c) {
            (State::Normal, '\'') => state = State::Quoted,
            (State::Quoted, '\'') => state = State::Normal,
            (State::Normal, ':') => {
                out.get_or_insert_with(|| sql[..idx].to_string()).push('@');
                continue;
            }
            (State::Normal, '?') => {
                positional += 1;
                let buf = out.get_or_insert_with(|| sql[..idx].to_string());
                buf.push('@');
                buf.push_str(&positional.to_string());
                continue;
            }
            _ => {}
        }

        if let Some(buf) = out.as_mut() {
            buf.push(c);
        }
    }

    match out {
        Some(rewritten) => Cow::Owned(rewritten),
        None => Cow::Borrowed(sql),
    }
}
