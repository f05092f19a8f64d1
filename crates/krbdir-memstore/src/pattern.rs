//! Search pattern compilation.
//!
//! Queries use shell wildcard syntax over whole `name@realm` strings: `*` and `?` match any
//! character including `/`, `[...]` is a character class, and `\` makes the next character
//! literal. A `[` without a closing bracket is an ordinary character.
//!
//! `glob::Pattern` is path-oriented and rejects some of these inputs (`**` inside a component,
//! an unclosed `[`), so queries are rewritten into an equivalent pattern first.

use glob::{MatchOptions, Pattern, PatternError};

/// Matching options for principal names: case-sensitive, `/` and leading dots not special.
pub(crate) const NAME_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Compiles a wildcard query into a pattern matched with [`NAME_MATCH`].
pub(crate) fn compile_query(query: &str) -> Result<Pattern, PatternError> {
    Pattern::new(&rewrite(query))
}

fn rewrite(query: &str) -> String {
    let chars = query.chars().collect::<Vec<_>>();
    let mut out = String::with_capacity(query.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
                out.push('*');
            }
            '?' => out.push('?'),
            '\\' => match chars.get(i + 1) {
                Some(&next) => {
                    push_literal(&mut out, next);
                    i += 1;
                }
                None => push_literal(&mut out, '\\'),
            },
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    push_class(&mut out, &chars[i + 1..end]);
                    i = end;
                }
                None => push_literal(&mut out, '['),
            },
            c => push_literal(&mut out, c),
        }
        i += 1;
    }
    out
}

/// Index of the `]` closing the class opened at `open`, if any.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    if matches!(chars.get(j), Some('!' | '^')) {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while let Some(&c) = chars.get(j) {
        match c {
            ']' => return Some(j),
            '\\' => j += 2,
            _ => j += 1,
        }
    }
    None
}

fn push_class(out: &mut String, body: &[char]) {
    let (negated, rest) = match body.split_first() {
        Some((&('!' | '^'), tail)) => (true, tail),
        _ => (false, body),
    };
    let mut members = Vec::with_capacity(rest.len());
    let mut escaped = false;
    for &c in rest {
        if c == '\\' && !escaped {
            escaped = true;
            continue;
        }
        escaped = false;
        members.push(c);
    }

    // glob takes `]` as a member only in first position and a leading `!` as negation.
    if let Some(pos) = members.iter().position(|&c| c == ']') {
        members.remove(pos);
        members.insert(0, ']');
    }
    if !negated && members.first() == Some(&'!') {
        if members.len() == 1 {
            out.push('!');
            return;
        }
        members.rotate_left(1);
    }

    out.push('[');
    if negated {
        out.push('!');
    }
    out.extend(members);
    out.push(']');
}

fn push_literal(out: &mut String, c: char) {
    match c {
        '*' | '?' | '[' => {
            out.push('[');
            out.push(c);
            out.push(']');
        }
        _ => out.push(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(query: &str, name: &str) -> bool {
        compile_query(query)
            .unwrap_or_else(|err| panic!("{query} did not compile: {err}"))
            .matches_with(name, NAME_MATCH)
    }

    #[test]
    fn star_crosses_components() {
        assert!(matches("host/*", "host/web1@EXAMPLE.COM"));
        assert!(matches("*@EXAMPLE.COM", "host/web1@EXAMPLE.COM"));
        assert!(matches("host/**", "host/a/b@EXAMPLE.COM"));
        assert!(matches("**web**", "host/web1@EXAMPLE.COM"));
        assert!(!matches("svc/*", "host/web1@EXAMPLE.COM"));
    }

    #[test]
    fn question_mark_matches_one_character() {
        assert!(matches("bo?@EXAMPLE.COM", "bob@EXAMPLE.COM"));
        assert!(!matches("bo?@EXAMPLE.COM", "bobby@EXAMPLE.COM"));
    }

    #[test]
    fn classes() {
        assert!(matches("host/db[12]*", "host/db2@EXAMPLE.COM"));
        assert!(!matches("host/db[!12]*", "host/db2@EXAMPLE.COM"));
        assert!(matches("[]a]*", "]x"));
        assert!(matches("[a-c]*", "bob"));
    }

    #[test]
    fn unclosed_bracket_is_literal() {
        assert!(matches("a[*", "a[1@EXAMPLE.COM"));
        assert!(!matches("a[*", "alice@EXAMPLE.COM"));
        assert!(matches("[", "["));
    }

    #[test]
    fn backslash_escapes() {
        assert!(matches(r"a\*b", "a*b"));
        assert!(!matches(r"a\*b", "axb"));
        assert!(matches(r"a\?", "a?"));
        assert!(matches(r"x\[1]", "x[1]"));
        assert!(matches(r"[\!a]", "!"));
        assert!(!matches(r"[\!a]", "b"));
        assert!(matches(r"[a\]b]", "]"));
        assert!(matches("trailing\\", "trailing\\"));
    }
}
