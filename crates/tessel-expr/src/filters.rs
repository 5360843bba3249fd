//! Filter chains: `expr | name:arg:arg | other`
//!
//! Only the splitting lives here; filter functions and argument resolution
//! belong to the engine.

use tessel_store::Value;

/// One filter application with its raw (unresolved) arguments
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<String>,
}

/// Expression text plus the filters applied to its result, in order
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    pub expression: String,
    pub filters: Vec<FilterCall>,
}

/// Split on `sep` outside quotes and brackets. `||` never splits.
fn split_top_level(source: &str, sep: char) -> Vec<&str> {
    let bytes: Vec<(usize, char)> = source.char_indices().collect();
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let (at, c) = bytes[i];
        if let Some(q) = quote {
            if c == '\\' {
                i += 1;
            } else if c == q {
                quote = None;
            }
        } else {
            match c {
                '\'' | '"' | '`' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                '|' if sep == '|' => {
                    if bytes.get(i + 1).is_some_and(|(_, n)| *n == '|') {
                        i += 1;
                    } else if depth == 0 {
                        parts.push(&source[start..at]);
                        start = at + 1;
                    }
                }
                c if c == sep && depth == 0 => {
                    parts.push(&source[start..at]);
                    start = at + c.len_utf8();
                }
                _ => {}
            }
        }
        i += 1;
    }
    parts.push(&source[start..]);
    parts
}

/// Separate an interpolation body into expression and filter calls.
/// Empty filter segments are ignored.
pub fn split_filters(source: &str) -> FilterChain {
    let mut segments = split_top_level(source, '|').into_iter();
    let expression = segments.next().unwrap_or_default().trim().to_string();

    let filters = segments
        .filter_map(|segment| {
            let mut pieces = split_top_level(segment, ':').into_iter();
            let name = pieces.next().unwrap_or_default().trim();
            if name.is_empty() {
                return None;
            }
            Some(FilterCall {
                name: name.to_string(),
                args: pieces.map(|p| p.trim().to_string()).collect(),
            })
        })
        .collect();

    FilterChain { expression, filters }
}

/// Literal filter argument: quoted string, number, boolean, null or
/// undefined. `None` means the argument is a path to resolve.
pub fn parse_literal_arg(arg: &str) -> Option<Value> {
    let arg = arg.trim();
    let mut chars = arg.chars();
    if let (Some(first), Some(last)) = (chars.next(), chars.next_back()) {
        if matches!(first, '\'' | '"' | '`') && first == last {
            return Some(Value::from(unescape(&arg[1..arg.len() - 1])));
        }
    }
    match arg {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" => Some(Value::Null),
        "undefined" => Some(Value::Undefined),
        _ if arg.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.')) => {
            arg.parse::<f64>().ok().map(Value::Number)
        }
        _ => None,
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
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
    fn test_split_filters() {
        let chain = split_filters("name | truncate:10:'...' | uppercase");
        assert_eq!(chain.expression, "name");
        assert_eq!(chain.filters.len(), 2);
        assert_eq!(chain.filters[0].name, "truncate");
        assert_eq!(chain.filters[0].args, vec!["10", "'...'"]);
        assert_eq!(chain.filters[1].name, "uppercase");
    }

    #[test]
    fn test_logical_or_is_not_a_filter() {
        let chain = split_filters("a || b");
        assert_eq!(chain.expression, "a || b");
        assert!(chain.filters.is_empty());
    }

    #[test]
    fn test_pipes_in_strings_and_calls() {
        let chain = split_filters("'a|b' + f(x | y) | json");
        assert_eq!(chain.expression, "'a|b' + f(x | y)");
        assert_eq!(chain.filters[0].name, "json");
    }

    #[test]
    fn test_colon_in_quoted_arg() {
        let chain = split_filters("when | default:'n/a: none'");
        assert_eq!(chain.filters[0].args, vec!["'n/a: none'"]);
    }

    #[test]
    fn test_literal_args() {
        assert_eq!(parse_literal_arg("'x'").unwrap().as_str(), Some("x"));
        assert_eq!(parse_literal_arg("2.5").unwrap().as_number(), Some(2.5));
        assert_eq!(parse_literal_arg("true").unwrap().as_bool(), Some(true));
        assert!(parse_literal_arg("user.name").is_none());
        assert!(parse_literal_arg("").is_none());
    }
}
