//! Ordered URL rules mapping matchers to state names.

use super::matcher::{split_url, UrlMatcher};
use crate::params::Params;

/// Result of a successful URL lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct UrlMatch {
    pub state: String,
    pub params: Params,
}

#[derive(Clone, Debug)]
struct UrlRule {
    state: String,
    matcher: UrlMatcher,
    order: usize,
}

impl UrlRule {
    fn rank(&self) -> (std::cmp::Reverse<usize>, usize) {
        (std::cmp::Reverse(self.matcher.static_prefix().len()), self.order)
    }
}

/// URL rules kept sorted by precedence.
///
/// Overlapping patterns are tried longest static prefix first; equal
/// prefixes keep declaration order.
#[derive(Clone, Debug, Default)]
pub struct UrlRules {
    rules: Vec<UrlRule>,
    next_order: usize,
}

impl UrlRules {
    /// An empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the matcher of a state.
    pub fn add(&mut self, state: impl Into<String>, matcher: UrlMatcher) {
        let rule = UrlRule {
            state: state.into(),
            matcher,
            order: self.next_order,
        };
        self.next_order += 1;
        let at = self.rules.partition_point(|r| r.rank() <= rule.rank());
        self.rules.insert(at, rule);
    }

    /// Drop the rule for `state`, if any.
    pub fn remove(&mut self, state: &str) {
        self.rules.retain(|r| r.state != state);
    }

    /// Number of rules, `otherwise` excluded.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule whose matcher accepts `path` and `search`.
    ///
    /// `None` is the regular "no route" result.
    pub fn find(&self, path: &str, search: &Params) -> Option<UrlMatch> {
        self.rules.iter().find_map(|rule| {
            rule.matcher.exec(path, search).map(|params| UrlMatch {
                state: rule.state.clone(),
                params,
            })
        })
    }

    /// [`find`](Self::find) for a full URL.
    pub fn find_url(&self, url: &str) -> Option<UrlMatch> {
        let (path, search) = split_url(url);
        self.find(path, &search)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::MatcherOptions;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn matcher(pattern: &str) -> UrlMatcher {
        UrlMatcher::compile(pattern, &BTreeMap::new(), MatcherOptions::default()).unwrap()
    }

    #[test]
    fn longer_static_prefix_wins() {
        let mut rules = UrlRules::new();
        rules.add("user", matcher("/users/:id"));
        rules.add("me", matcher("/users/me"));

        assert_eq!(rules.find_url("/users/me").unwrap().state, "me");
        let found = rules.find_url("/users/42").unwrap();
        assert_eq!(found.state, "user");
        assert_eq!(found.params["id"], json!("42"));
    }

    #[test]
    fn ties_keep_declaration_order() {
        let mut rules = UrlRules::new();
        rules.add("first", matcher("/items/:a"));
        rules.add("second", matcher("/items/:b"));

        assert_eq!(rules.find_url("/items/1").unwrap().state, "first");
    }

    #[test]
    fn no_match_is_none() {
        let mut rules = UrlRules::new();
        rules.add("home", matcher("/home"));
        assert!(rules.find_url("/nowhere").is_none());
    }

    #[test]
    fn remove_drops_rule() {
        let mut rules = UrlRules::new();
        rules.add("home", matcher("/home"));
        rules.remove("home");
        assert!(rules.is_empty());
    }
}
