//! Named-parameter rewriting.
//!
//! Turns `:name` parameters into the placeholder syntax of a backend and
//! records the names in order of appearance. `::` casts, `:=` assignments and
//! text inside single-quoted literals are left alone.

use crate::backend::{PlaceholderStyle, PreparedQuery};

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InQuotes,
    InName,
}

/// Rewrite `query` for a backend using `style` placeholders.
///
/// Every occurrence of a name gets its own placeholder, so a name used twice
/// appears twice in [`PreparedQuery::names`].
pub fn rewrite_named_parameters(query: &str, style: PlaceholderStyle) -> PreparedQuery {
    let mut text = String::with_capacity(query.len());
    let mut names = Vec::new();
    let mut name = String::new();
    let mut state = State::Normal;
    let mut chars = query.chars().peekable();

    while let Some(c) = chars.next() {
        if state == State::InName {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                continue;
            }
            names.push(std::mem::take(&mut name));
            text.push_str(&style.placeholder(names.len()));
            state = State::Normal;
        }

        match state {
            State::InQuotes => {
                text.push(c);
                if c == '\'' {
                    state = State::Normal;
                }
            }
            _ => match c {
                '\'' => {
                    text.push(c);
                    state = State::InQuotes;
                }
                ':' => match chars.peek() {
                    Some(':') => {
                        text.push_str("::");
                        chars.next();
                    }
                    Some(&next) if next.is_ascii_alphabetic() || next == '_' => {
                        state = State::InName;
                    }
                    _ => text.push(c),
                },
                _ => text.push(c),
            },
        }
    }

    if state == State::InName {
        names.push(name);
        text.push_str(&style.placeholder(names.len()));
    }

    PreparedQuery { text, names }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_dollar() {
        let q = rewrite_named_parameters(
            "select * from t where a = :x and b = :y",
            PlaceholderStyle::Dollar,
        );
        assert_eq!(q.text, "select * from t where a = $1 and b = $2");
        assert_eq!(q.names, vec!["x", "y"]);
    }

    #[test]
    fn test_rewrite_repeated_name() {
        let q = rewrite_named_parameters(
            "select * from t where a = :x and b = :x",
            PlaceholderStyle::Dollar,
        );
        assert_eq!(q.text, "select * from t where a = $1 and b = $2");
        assert_eq!(q.names, vec!["x", "x"]);
    }

    #[test]
    fn test_rewrite_is_pure() {
        let query = "update t set v = :val where id = :id";
        let first = rewrite_named_parameters(query, PlaceholderStyle::NumberedQuestion);
        let second = rewrite_named_parameters(query, PlaceholderStyle::NumberedQuestion);
        assert_eq!(first, second);
        assert_eq!(first.text, "update t set v = ?1 where id = ?2");
    }

    #[test]
    fn test_rewrite_skips_casts_and_assignments() {
        let q = rewrite_named_parameters(
            "select :v::int, x := 1, a::text from t",
            PlaceholderStyle::Dollar,
        );
        assert_eq!(q.text, "select $1::int, x := 1, a::text from t");
        assert_eq!(q.names, vec!["v"]);
    }

    #[test]
    fn test_rewrite_leaves_literals() {
        let q = rewrite_named_parameters(
            "select ':not_a_param', 'it''s :x' from t where id = :id",
            PlaceholderStyle::Question,
        );
        assert_eq!(q.text, "select ':not_a_param', 'it''s :x' from t where id = ?");
        assert_eq!(q.names, vec!["id"]);
    }

    #[test]
    fn test_rewrite_name_at_end_and_adjacent_punctuation() {
        let q = rewrite_named_parameters("insert into t values(:a,:b_2)", PlaceholderStyle::NumberedColon);
        assert_eq!(q.text, "insert into t values(:1,:2)");
        assert_eq!(q.names, vec!["a", "b_2"]);

        let q = rewrite_named_parameters("select * from t where id=:id", PlaceholderStyle::Dollar);
        assert_eq!(q.text, "select * from t where id=$1");
    }

    #[test]
    fn test_rewrite_lone_colon_and_numbers() {
        let q = rewrite_named_parameters("select a : b, :1 from t", PlaceholderStyle::Dollar);
        assert_eq!(q.text, "select a : b, :1 from t");
        assert!(q.names.is_empty());
    }
}
