//! `$NAME` and `${NAME}` substitution.

use crate::env::Environment;
use crate::lexer::WordPart;

/// Joins the parts of a word into its final text, expanding every
/// [`WordPart::Expandable`] part and copying [`WordPart::Literal`] parts as-is.
pub fn expand_word(parts: &[WordPart], env: &Environment) -> String {
    let mut result = String::new();
    for part in parts {
        match part {
            WordPart::Literal(text) => result.push_str(text),
            WordPart::Expandable(text) => result.push_str(&expand_vars(text, env)),
        }
    }
    result
}

/// Replaces variable references in `text`.
///
/// Unset variables expand to the empty string. A `${` without a closing brace is kept
/// literally. Expanded values are not scanned again.
pub fn expand_vars(text: &str, env: &Environment) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(close) => {
                    out.push_str(&lookup(&braced[..close], env));
                    rest = &braced[close + 1..];
                }
                None => {
                    out.push_str("${");
                    rest = braced;
                }
            }
            continue;
        }

        let name_len = after
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();
        out.push_str(&lookup(&after[..name_len], env));
        rest = &after[name_len..];
    }

    out.push_str(rest);
    out
}

fn lookup(name: &str, env: &Environment) -> String {
    // a bare `$` has an empty name and expands to nothing
    if name.is_empty() {
        return String::new();
    }
    env.get_var(name).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        let mut env = Environment::default();
        env.set_var("NAME", "world");
        env.set_var("A_1", "one");
        env.set_var("NESTED", "$NAME");
        env
    }

    #[test]
    fn plain_reference() {
        assert_eq!(expand_vars("hello $NAME", &env()), "hello world");
    }

    #[test]
    fn braced_reference() {
        assert_eq!(expand_vars("${NAME}!", &env()), "world!");
        assert_eq!(expand_vars("x${A_1}y", &env()), "xoney");
    }

    #[test]
    fn name_is_longest_alnum_underscore_run() {
        assert_eq!(expand_vars("$A_1-$NAME.txt", &env()), "one-world.txt");
        assert_eq!(expand_vars("$NAMEX", &env()), "");
    }

    #[test]
    fn unset_is_empty() {
        assert_eq!(expand_vars("[$PIPESH_MISSING_VAR_42]", &env()), "[]");
    }

    #[test]
    fn unclosed_brace_stays_literal() {
        assert_eq!(expand_vars("${NAME", &env()), "${NAME");
        assert_eq!(expand_vars("a${ $NAME", &env()), "a${ world");
    }

    #[test]
    fn bare_dollar_expands_to_nothing() {
        assert_eq!(expand_vars("cost: $", &env()), "cost: ");
        assert_eq!(expand_vars("$-x", &env()), "-x");
    }

    #[test]
    fn no_recursive_expansion() {
        assert_eq!(expand_vars("$NESTED", &env()), "$NAME");
    }

    #[test]
    fn literal_parts_are_untouched() {
        let parts = vec![
            WordPart::Expandable("$NAME".into()),
            WordPart::Literal("$NAME".into()),
        ];
        assert_eq!(expand_word(&parts, &env()), "world$NAME");
    }
}
