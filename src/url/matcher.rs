//! URL pattern compilation, matching and formatting.
//!
//! Pattern syntax:
//!
//! - `:name` or `{name}`: a string placeholder for one path segment
//! - `{name:int}`: a placeholder with a builtin type (`string`, `path`,
//!   `int`, `bool`, `json`, `any`)
//! - `{name:[0-9a-f]+}`: a placeholder constrained by a regex
//! - `*name`: a catch-all placeholder spanning several segments
//! - `?q&page` or `?{page:int}`: query parameters
//!
//! Matching is total: a type mismatch is a no-match, never an error.

use crate::params::{Param, ParamConfig, ParamLocation, ParamType, Params, Squash};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors raised while compiling a URL pattern.
#[derive(Debug, Error)]
pub enum UrlPatternError {
    #[error("invalid regex for parameter '{param}' in '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        param: String,
        #[source]
        source: regex::Error,
    },

    #[error("parameter '{param}' appears more than once in '{pattern}'")]
    DuplicateParam { pattern: String, param: String },

    #[error("malformed url pattern '{pattern}': {reason}")]
    Malformed { pattern: String, reason: String },
}

/// Options shared by every matcher of a router.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatcherOptions {
    pub case_insensitive: bool,
    /// When false, a single trailing slash is tolerated on match.
    pub strict_trailing_slash: bool,
}

/// A compiled URL pattern.
///
/// `segments[i]` is the literal text preceding `path_params[i]`; the final
/// segment is the literal text after the last placeholder.
#[derive(Clone, Debug)]
pub struct UrlMatcher {
    source: String,
    segments: Vec<String>,
    path_params: Vec<Param>,
    search_params: Vec<Param>,
    options: MatcherOptions,
    regex: Regex,
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(
            r"([:*])(\w+)|\{(\w+)(?::\s*((?:[^{}\\]+|\\.|\{(?:[^{}\\]+|\\.)*\})+))?\}",
        )
        .expect("placeholder regex should always compile")
    })
}

impl UrlMatcher {
    /// Compile `pattern` using `configs` for defaults, squash and types.
    pub fn compile(
        pattern: &str,
        configs: &BTreeMap<String, ParamConfig>,
        options: MatcherOptions,
    ) -> Result<Self, UrlPatternError> {
        let (path, search) = match pattern.split_once('?') {
            Some((path, search)) => (path, Some(search)),
            None => (pattern, None),
        };

        let mut segments = Vec::new();
        let mut path_params: Vec<Param> = Vec::new();
        let mut last = 0;

        for caps in placeholder_regex().captures_iter(path) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let literal = &path[last..whole.start];
            last = whole.end;

            let (id, inferred) = if let (Some(kind), Some(name)) = (caps.get(1), caps.get(2)) {
                let ty = if kind.as_str() == "*" {
                    ParamType::Path
                } else {
                    ParamType::String
                };
                (name.as_str().to_string(), ty)
            } else {
                let name = caps.get(3).map_or("", |m| m.as_str()).to_string();
                let ty = match caps.get(4).map(|m| m.as_str().trim()) {
                    None => ParamType::String,
                    Some(spec) => match ParamType::builtin(spec) {
                        Some(ty) => ty,
                        None => ParamType::custom(format!("{name}-regex"), spec).map_err(
                            |source| UrlPatternError::InvalidRegex {
                                pattern: pattern.to_string(),
                                param: name.clone(),
                                source,
                            },
                        )?,
                    },
                };
                (name, ty)
            };

            if path_params.iter().any(|p| p.id == id) {
                return Err(UrlPatternError::DuplicateParam {
                    pattern: pattern.to_string(),
                    param: id,
                });
            }
            segments.push(literal.to_string());
            let param = Param::new(id.as_str(), ParamLocation::Path, Some(inferred), configs.get(&id));
            path_params.push(param);
        }
        segments.push(path[last..].to_string());

        if segments.iter().any(|s| s.contains(['{', '}'])) {
            return Err(UrlPatternError::Malformed {
                pattern: pattern.to_string(),
                reason: "unbalanced braces".to_string(),
            });
        }

        let mut search_params: Vec<Param> = Vec::new();
        for entry in search.unwrap_or("").split('&').filter(|s| !s.is_empty()) {
            let (id, inferred) = match entry.strip_prefix('{').and_then(|e| e.strip_suffix('}')) {
                Some(inner) => match inner.split_once(':') {
                    Some((name, ty)) => (
                        name.trim().to_string(),
                        ParamType::builtin(ty.trim()).ok_or_else(|| UrlPatternError::Malformed {
                            pattern: pattern.to_string(),
                            reason: format!("unknown query parameter type '{}'", ty.trim()),
                        })?,
                    ),
                    None => (inner.trim().to_string(), ParamType::String),
                },
                None => (entry.trim().to_string(), ParamType::String),
            };
            if path_params.iter().chain(&search_params).any(|p| p.id == id) {
                return Err(UrlPatternError::DuplicateParam {
                    pattern: pattern.to_string(),
                    param: id,
                });
            }
            let param = Param::new(id.as_str(), ParamLocation::Search, Some(inferred), configs.get(&id));
            search_params.push(param);
        }

        Self::assemble(pattern.to_string(), segments, path_params, search_params, options)
    }

    fn assemble(
        source: String,
        segments: Vec<String>,
        path_params: Vec<Param>,
        search_params: Vec<Param>,
        options: MatcherOptions,
    ) -> Result<Self, UrlPatternError> {
        let mut re = String::from(if options.case_insensitive { "(?i)^" } else { "^" });

        for (i, param) in path_params.iter().enumerate() {
            let literal = &segments[i];
            let value = if param.array { "[^/]*" } else { param.ty.pattern() };
            let capture = format!("(?P<p{i}>{value})");
            match (&param.squash, param.is_optional()) {
                (Squash::Omit, true) if literal.ends_with('/') => {
                    re.push_str(&regex::escape(&literal[..literal.len() - 1]));
                    re.push_str(&format!("(?:/{capture})?"));
                }
                (Squash::Omit, true) => {
                    re.push_str(&regex::escape(literal));
                    re.push_str(&format!("{capture}?"));
                }
                (Squash::Replace(marker), true) => {
                    re.push_str(&regex::escape(literal));
                    re.push_str(&format!("(?:{}|{capture})", regex::escape(marker)));
                }
                (_, true) => {
                    re.push_str(&regex::escape(literal));
                    re.push_str(&format!("{capture}?"));
                }
                (_, false) => {
                    re.push_str(&regex::escape(literal));
                    re.push_str(&capture);
                }
            }
        }
        let tail = segments.last().map(String::as_str).unwrap_or("");
        re.push_str(&regex::escape(tail));
        if !options.strict_trailing_slash {
            if tail.ends_with('/') {
                re.push('?');
            } else {
                re.push_str("/?");
            }
        }
        re.push('$');

        let regex = Regex::new(&re).map_err(|err| UrlPatternError::InvalidRegex {
            pattern: source.clone(),
            param: String::new(),
            source: err,
        })?;

        Ok(Self {
            source,
            segments,
            path_params,
            search_params,
            options,
            regex,
        })
    }

    /// Compose `self` with a child pattern appended after it.
    pub fn append(&self, child: &UrlMatcher) -> Result<UrlMatcher, UrlPatternError> {
        let source = format!("{}{}", self.source, child.source);
        for param in child.params() {
            if self.params().any(|p| p.id == param.id) {
                return Err(UrlPatternError::DuplicateParam {
                    pattern: source,
                    param: param.id.clone(),
                });
            }
        }

        let mut segments = self.segments.clone();
        let joint = segments.pop().unwrap_or_default();
        let mut child_segments = child.segments.iter();
        let first = child_segments.next().map(String::as_str).unwrap_or("");
        let joined = match (joint.ends_with('/'), first.strip_prefix('/')) {
            (true, Some(rest)) => format!("{joint}{rest}"),
            _ => format!("{joint}{first}"),
        };
        segments.push(joined);
        segments.extend(child_segments.cloned());

        let path_params = self
            .path_params
            .iter()
            .chain(&child.path_params)
            .cloned()
            .collect();
        let search_params = self
            .search_params
            .iter()
            .chain(&child.search_params)
            .cloned()
            .collect();

        Self::assemble(source, segments, path_params, search_params, self.options)
    }

    /// The pattern text this matcher was built from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Literal text before the first placeholder.
    pub fn static_prefix(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or("")
    }

    /// All params, path first then search.
    pub fn params(&self) -> impl Iterator<Item = &Param> {
        self.path_params.iter().chain(&self.search_params)
    }

    /// Params declared in the path.
    pub fn path_params(&self) -> &[Param] {
        &self.path_params
    }

    /// Params declared in the query string.
    pub fn search_params(&self) -> &[Param] {
        &self.search_params
    }

    /// Test `path` and extract typed params, reading query values from `search`.
    ///
    /// Search values are strings or arrays of strings, as produced by
    /// [`parse_query`]. Returns `None` on any mismatch.
    pub fn exec(&self, path: &str, search: &Params) -> Option<Params> {
        let caps = self.regex.captures(path)?;
        let mut values = Params::new();

        for (i, param) in self.path_params.iter().enumerate() {
            let text = caps.name(&format!("p{i}")).map(|m| m.as_str()).unwrap_or("");
            let value = if text.is_empty() {
                param.default.clone()?
            } else if param.array {
                let parts = text
                    .split('-')
                    .map(|part| decode_component(part))
                    .collect::<Option<Vec<_>>>()?;
                param.decode_parts(&parts)?
            } else {
                param.ty.decode(&decode_component(text)?)?
            };
            values.insert(param.id.clone(), value);
        }

        for param in &self.search_params {
            let parts: Vec<String> = match search.get(&param.id) {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()?,
                Some(Value::String(s)) => vec![s.clone()],
                Some(_) => return None,
            };
            let value = if parts.is_empty() {
                param.default.clone()?
            } else {
                param.decode_parts(&parts)?
            };
            values.insert(param.id.clone(), value);
        }

        Some(values)
    }

    /// Test a full URL (`/path?query#hash`).
    pub fn exec_url(&self, url: &str) -> Option<Params> {
        let (path, search) = split_url(url);
        self.exec(path, &search)
    }

    /// Format a URL from param values; the inverse of [`exec`](Self::exec).
    ///
    /// Returns `None` when a required param is missing or a value does not
    /// fit its type.
    pub fn format(&self, values: &Params) -> Option<String> {
        let mut out = String::new();

        for (i, param) in self.path_params.iter().enumerate() {
            let literal = &self.segments[i];
            let value = param.value(values.get(&param.id))?;
            if !param.validates(&value) {
                return None;
            }
            let squash = if param.is_default(&value) {
                &param.squash
            } else {
                &Squash::Never
            };
            match squash {
                Squash::Omit if literal.ends_with('/') => {
                    out.push_str(&literal[..literal.len() - 1]);
                }
                Squash::Omit => out.push_str(literal),
                Squash::Replace(marker) => {
                    out.push_str(literal);
                    out.push_str(marker);
                }
                Squash::Never => {
                    let encoded = encode_path_value(param, &value)?;
                    // An empty segment reads back as the default.
                    if encoded.is_empty() && !param.is_default(&value) {
                        return None;
                    }
                    out.push_str(literal);
                    out.push_str(&encoded);
                }
            }
        }
        out.push_str(self.segments.last().map(String::as_str).unwrap_or(""));
        if out.is_empty() {
            out.push('/');
        }

        let mut query = Vec::new();
        for param in &self.search_params {
            let Some(value) = param.value(values.get(&param.id)) else {
                continue;
            };
            if value.is_null() || param.is_default(&value) {
                continue;
            }
            if !param.validates(&value) {
                return None;
            }
            for part in param.encode_parts(&value)? {
                query.push(format!("{}={}", param.id, urlencoding::encode(&part)));
            }
        }
        if !query.is_empty() {
            out.push('?');
            out.push_str(&query.join("&"));
        }

        Some(out)
    }
}

fn decode_component(text: &str) -> Option<String> {
    urlencoding::decode(text).ok().map(|s| s.into_owned())
}

fn encode_path_value(param: &Param, value: &Value) -> Option<String> {
    let parts = param.encode_parts(value)?;
    let encoded: Vec<String> = parts
        .iter()
        .map(|part| match param.ty {
            ParamType::Path => part
                .split('/')
                .map(|piece| urlencoding::encode(piece).into_owned())
                .collect::<Vec<_>>()
                .join("/"),
            _ => urlencoding::encode(part).into_owned(),
        })
        .map(|part| {
            if param.array {
                part.replace('-', "%2D")
            } else {
                part
            }
        })
        .collect();
    Some(encoded.join("-"))
}

/// Split a URL into its path and parsed query, dropping any `#fragment`.
pub fn split_url(url: &str) -> (&str, Params) {
    let url = url.split_once('#').map_or(url, |(before, _)| before);
    match url.split_once('?') {
        Some((path, query)) => (path, parse_query(query)),
        None => (url, Params::new()),
    }
}

/// Parse a query string; repeated keys become arrays of strings.
pub fn parse_query(query: &str) -> Params {
    let mut params = Params::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
        let Some(value) = decode_component(&raw.replace('+', " ")) else {
            continue;
        };
        let key = decode_component(key).unwrap_or_else(|| key.to_string());
        match params.remove(&key) {
            None => {
                params.insert(key, Value::String(value));
            }
            Some(Value::Array(mut items)) => {
                items.push(Value::String(value));
                params.insert(key, Value::Array(items));
            }
            Some(existing) => {
                params.insert(key, Value::Array(vec![existing, Value::String(value)]));
            }
        }
    }
    params
}
