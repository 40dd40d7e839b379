//! URL patterns and the ordered rule table used to map URLs to states.

mod matcher;
mod rules;

pub use matcher::{parse_query, split_url, MatcherOptions, UrlMatcher, UrlPatternError};
pub use rules::{UrlMatch, UrlRules};
