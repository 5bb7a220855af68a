//! Keyword normalizer
//!
//! Rewrites the surface keywords `AND`, `OR` and `NOT` into the lowercase
//! connectives the parser understands. Only whole identifier runs outside of
//! string literals are rewritten, so `BRAND == 'AND'` keeps both its field and
//! its literal intact. The output always has the same byte length as the
//! input.

/// Characters that may start an identifier
pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Characters that may continue an identifier
pub(crate) fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn rewrite_keyword(word: &str) -> Option<&'static str> {
    match word {
        "AND" => Some("and"),
        "OR" => Some("or"),
        "NOT" => Some("not"),
        _ => None,
    }
}

/// Normalize raw expression text into canonical connective form
pub fn normalize(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut chars = expression.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c == '\'' || c == '"' {
            // Copy the literal verbatim; an unterminated one runs to the end
            // and is reported by the parser.
            let mut end = expression.len();
            let mut escaped = false;
            for (i, inner) in chars.by_ref() {
                if escaped {
                    escaped = false;
                } else if inner == '\\' {
                    escaped = true;
                } else if inner == c {
                    end = i + inner.len_utf8();
                    break;
                }
            }
            out.push_str(&expression[start..end]);
        } else if is_ident_continue(c) {
            let mut end = start + c.len_utf8();
            while let Some(&(i, next)) = chars.peek() {
                if !is_ident_continue(next) {
                    break;
                }
                end = i + next.len_utf8();
                chars.next();
            }
            let word = &expression[start..end];
            out.push_str(rewrite_keyword(word).unwrap_or(word));
        } else {
            out.push(c);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_keywords() {
        assert_eq!(
            normalize("age > 30 AND department == 'Sales'"),
            "age > 30 and department == 'Sales'"
        );
        assert_eq!(normalize("a > 1 OR NOT b > 2"), "a > 1 or not b > 2");
    }

    #[test]
    fn test_keeps_identifiers_containing_keywords() {
        assert_eq!(normalize("BRAND > 1 AND ORDERS < 5"), "BRAND > 1 and ORDERS < 5");
        assert_eq!(normalize("AND_FLAG == 1"), "AND_FLAG == 1");
        assert_eq!(normalize("NOTES == 'x'"), "NOTES == 'x'");
    }

    #[test]
    fn test_keeps_string_literals() {
        assert_eq!(
            normalize("team == 'R AND D' OR team == \"OR\""),
            "team == 'R AND D' or team == \"OR\""
        );
        assert_eq!(normalize(r"name == 'it\'s AND'"), r"name == 'it\'s AND'");
    }

    #[test]
    fn test_case_sensitive() {
        assert_eq!(normalize("a > 1 And b > 2"), "a > 1 And b > 2");
        assert_eq!(normalize("a > 1 and b > 2"), "a > 1 and b > 2");
    }

    #[test]
    fn test_preserves_length() {
        let input = "x > 1 AND (y < 2 OR z == 'NOT ÄND')";
        assert_eq!(normalize(input).len(), input.len());
    }

    #[test]
    fn test_unterminated_literal_copied() {
        assert_eq!(normalize("a == 'AND"), "a == 'AND");
    }

    #[test]
    fn test_digit_runs_are_not_split() {
        assert_eq!(normalize("x > 30AND"), "x > 30AND");
    }
}
