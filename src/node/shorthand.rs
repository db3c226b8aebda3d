//! Shorthand expansion for permission keys
//!
//! A key may group alternatives in parentheses separated by `|`:
//! `essentials.(fly|god).use` expands to `essentials.fly.use` and
//! `essentials.god.use`. Multiple groups expand to their cartesian product.
//! Numeric ranges such as `kit.(1-3)` expand to each number in the range.

/// Upper bound on how many keys one shorthand key may produce
const MAX_EXPANSIONS: usize = 1_000;

/// Expands a shorthand key
///
/// Returns an empty vector when the key carries no shorthand (or is
/// malformed), so callers can keep the original node unchanged.
///
/// # Examples
///
/// ```
/// use permresolve::node::expand_shorthand;
///
/// let expanded = expand_shorthand("essentials.(fly|god)");
/// assert_eq!(expanded, vec!["essentials.fly", "essentials.god"]);
/// assert!(expand_shorthand("essentials.fly").is_empty());
/// ```
pub fn expand_shorthand(key: &str) -> Vec<String> {
    if !key.contains('(') {
        return Vec::new();
    }

    let mut results = vec![String::new()];
    let mut rest = key;

    while let Some(open) = rest.find('(') {
        let close = match rest[open..].find(')') {
            Some(offset) => open + offset,
            None => return Vec::new(),
        };

        let literal = &rest[..open];
        let alternatives = parse_alternatives(&rest[open + 1..close]);
        if alternatives.is_empty() || results.len() * alternatives.len() > MAX_EXPANSIONS {
            return Vec::new();
        }

        results = results
            .iter()
            .flat_map(|prefix| {
                alternatives
                    .iter()
                    .map(move |alt| format!("{}{}{}", prefix, literal, alt))
            })
            .collect();
        rest = &rest[close + 1..];
    }

    for result in &mut results {
        result.push_str(rest);
    }
    results
}

fn parse_alternatives(group: &str) -> Vec<String> {
    if let Some((start, end)) = group.split_once('-') {
        if let (Ok(start), Ok(end)) = (start.parse::<i64>(), end.parse::<i64>()) {
            if start <= end && (end - start) < MAX_EXPANSIONS as i64 {
                return (start..=end).map(|n| n.to_string()).collect();
            }
        }
    }

    group
        .split('|')
        .filter(|alt| !alt.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_shorthand() {
        assert!(expand_shorthand("a.b.c").is_empty());
    }

    #[test]
    fn test_single_group() {
        assert_eq!(expand_shorthand("a.(b|c).d"), vec!["a.b.d", "a.c.d"]);
    }

    #[test]
    fn test_cartesian_product() {
        assert_eq!(
            expand_shorthand("(a|b).(x|y)"),
            vec!["a.x", "a.y", "b.x", "b.y"]
        );
    }

    #[test]
    fn test_numeric_range() {
        assert_eq!(expand_shorthand("kit.(1-3)"), vec!["kit.1", "kit.2", "kit.3"]);
    }

    #[test]
    fn test_unbalanced_is_ignored() {
        assert!(expand_shorthand("a.(b|c").is_empty());
    }
}
