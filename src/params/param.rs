//! Parameter types and single parameter declarations.
//!
//! A [`Param`] knows how to turn URL text into a typed JSON value and back,
//! what its default is, and whether it may be squashed out of generated URLs.

use regex::Regex;
use serde_json::Value;
use std::fmt;

/// Where a parameter lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamLocation {
    /// Captured from a path placeholder
    Path,
    /// Read from the query string
    Search,
    /// Declared on the state only, never part of a URL
    Config,
}

/// Squash policy for a path parameter whose value equals its default.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Squash {
    /// Always write the value
    #[default]
    Never,
    /// Omit the value and one adjacent slash
    Omit,
    /// Replace the value with a marker string, e.g. `~`
    Replace(String),
}

/// A regex-constrained string type.
#[derive(Clone, Debug)]
pub struct CustomType {
    name: String,
    pattern: String,
    matcher: Regex,
}

impl CustomType {
    /// Name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unanchored regex fragment.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Value type of a parameter.
///
/// Values are carried as [`serde_json::Value`]; the type decides which values
/// are acceptable and how they are written into and read out of URLs.
#[derive(Clone, Debug, Default)]
pub enum ParamType {
    /// Any string; slashes are percent-encoded in paths
    #[default]
    String,
    /// A string that may span several path segments
    Path,
    /// A signed 64-bit integer
    Int,
    /// A boolean, written as `1` / `0`
    Bool,
    /// Any JSON value, written as URL-encoded JSON
    Json,
    /// Any value; non-string values are written as JSON
    Any,
    /// A string that must fully match a regex
    Custom(CustomType),
}

impl ParamType {
    /// Build a custom type from a regex fragment.
    ///
    /// The fragment is matched against the whole value.
    pub fn custom(name: impl Into<String>, pattern: impl Into<String>) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        let matcher = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(ParamType::Custom(CustomType {
            name: name.into(),
            pattern,
            matcher,
        }))
    }

    /// Look up a builtin type by the name used in URL patterns (`{id:int}`).
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "string" => Some(ParamType::String),
            "path" => Some(ParamType::Path),
            "int" => Some(ParamType::Int),
            "bool" => Some(ParamType::Bool),
            "json" => Some(ParamType::Json),
            "any" => Some(ParamType::Any),
            _ => None,
        }
    }

    /// Type name for diagnostics.
    pub fn name(&self) -> &str {
        match self {
            ParamType::String => "string",
            ParamType::Path => "path",
            ParamType::Int => "int",
            ParamType::Bool => "bool",
            ParamType::Json => "json",
            ParamType::Any => "any",
            ParamType::Custom(custom) => custom.name(),
        }
    }

    /// Regex fragment a URL capture group uses for this type.
    pub fn pattern(&self) -> &str {
        match self {
            ParamType::String | ParamType::Json | ParamType::Any => "[^/]*",
            ParamType::Path => ".*",
            ParamType::Int => "-?[0-9]+",
            ParamType::Bool => "0|1",
            ParamType::Custom(custom) => custom.pattern(),
        }
    }

    /// Whether `value` is already a valid, decoded value of this type.
    pub fn is(&self, value: &Value) -> bool {
        match self {
            ParamType::String | ParamType::Path => value.is_string(),
            ParamType::Int => value.is_i64(),
            ParamType::Bool => value.is_boolean(),
            ParamType::Json | ParamType::Any => true,
            ParamType::Custom(custom) => value
                .as_str()
                .is_some_and(|s| custom.matcher.is_match(s)),
        }
    }

    /// Encode a value as URL text (before percent-encoding).
    pub fn encode(&self, value: &Value) -> Option<String> {
        if !self.is(value) {
            return None;
        }
        match self {
            ParamType::Int => value.as_i64().map(|n| n.to_string()),
            ParamType::Bool => value.as_bool().map(|b| (if b { "1" } else { "0" }).to_string()),
            ParamType::Json => Some(value.to_string()),
            ParamType::Any => Some(match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            ParamType::String | ParamType::Path | ParamType::Custom(_) => {
                value.as_str().map(str::to_string)
            }
        }
    }

    /// Decode URL text (after percent-decoding). `None` on type mismatch.
    pub fn decode(&self, text: &str) -> Option<Value> {
        match self {
            ParamType::String | ParamType::Path | ParamType::Any => {
                Some(Value::String(text.to_string()))
            }
            ParamType::Int => text.parse::<i64>().ok().map(Value::from),
            ParamType::Bool => match text {
                "1" | "true" => Some(Value::Bool(true)),
                "0" | "false" => Some(Value::Bool(false)),
                _ => None,
            },
            ParamType::Json => serde_json::from_str(text).ok(),
            ParamType::Custom(custom) => custom
                .matcher
                .is_match(text)
                .then(|| Value::String(text.to_string())),
        }
    }

    /// Accept either a decoded value or its string form.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        if self.is(value) {
            return Some(value.clone());
        }
        match value {
            Value::String(s) => self.decode(s),
            Value::Number(n) if matches!(self, ParamType::String) => {
                Some(Value::String(n.to_string()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// User-facing configuration for one parameter of a state.
///
/// Used both for parameters that appear in the URL pattern (to set a
/// default, squash policy or type) and for config-only parameters.
#[derive(Clone, Debug, Default)]
pub struct ParamConfig {
    pub(crate) ty: Option<ParamType>,
    pub(crate) default: Option<Value>,
    pub(crate) array: Option<bool>,
    pub(crate) squash: Option<Squash>,
}

impl ParamConfig {
    /// Empty configuration; everything inferred.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with a default value (makes the parameter optional).
    pub fn value(default: impl Into<Value>) -> Self {
        Self::new().default_value(default)
    }

    /// Set the default value.
    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set the value type.
    pub fn of_type(mut self, ty: ParamType) -> Self {
        self.ty = Some(ty);
        self
    }

    /// Mark the parameter as array-valued.
    pub fn array(mut self) -> Self {
        self.array = Some(true);
        self
    }

    /// Set the squash policy.
    pub fn squash(mut self, squash: Squash) -> Self {
        self.squash = Some(squash);
        self
    }
}

/// A fully-configured parameter.
#[derive(Clone, Debug)]
pub struct Param {
    pub id: String,
    pub location: ParamLocation,
    pub ty: ParamType,
    pub array: bool,
    pub default: Option<Value>,
    pub squash: Squash,
}

impl Param {
    /// Build a parameter from its location, an inferred type and optional config.
    ///
    /// An explicit type in `config` wins over `inferred`.
    pub fn new(
        id: impl Into<String>,
        location: ParamLocation,
        inferred: Option<ParamType>,
        config: Option<&ParamConfig>,
    ) -> Self {
        let config = config.cloned().unwrap_or_default();
        let ty = config.ty.or(inferred).unwrap_or_else(|| match location {
            ParamLocation::Config => ParamType::Any,
            _ => ParamType::String,
        });
        // Query params are implicitly optional.
        let default = match (location, config.default) {
            (ParamLocation::Search, None) => Some(Value::Null),
            (_, default) => default,
        };
        Self {
            id: id.into(),
            location,
            ty,
            array: config.array.unwrap_or(false),
            default,
            squash: config.squash.unwrap_or_default(),
        }
    }

    /// A parameter is optional when it has a default.
    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }

    /// Normalize a raw value: fill in the default, coerce strings, wrap
    /// single values of array params. `None` means "no value".
    pub fn value(&self, raw: Option<&Value>) -> Option<Value> {
        let raw = match raw {
            None | Some(Value::Null) => return self.default.clone(),
            Some(raw) => raw,
        };
        if !self.array {
            return Some(self.ty.coerce(raw).unwrap_or_else(|| raw.clone()));
        }
        let items = match raw {
            Value::Array(items) => items.clone(),
            single => vec![single.clone()],
        };
        Some(Value::Array(
            items
                .iter()
                .map(|item| self.ty.coerce(item).unwrap_or_else(|| item.clone()))
                .collect(),
        ))
    }

    /// Whether a normalized value satisfies the type and array-ness.
    pub fn validates(&self, value: &Value) -> bool {
        if value.is_null() && self.is_default(value) {
            return true;
        }
        match (self.array, value) {
            (true, Value::Array(items)) => items.iter().all(|item| self.ty.is(item)),
            (true, _) => false,
            (false, value) => self.ty.is(value),
        }
    }

    /// Whether `value` equals the default.
    pub fn is_default(&self, value: &Value) -> bool {
        self.default.as_ref() == Some(value)
    }

    /// Encode a normalized value into one URL text part per array item.
    pub fn encode_parts(&self, value: &Value) -> Option<Vec<String>> {
        match (self.array, value) {
            (true, Value::Array(items)) => items.iter().map(|item| self.ty.encode(item)).collect(),
            (true, _) => None,
            (false, value) => self.ty.encode(value).map(|part| vec![part]),
        }
    }

    /// Decode URL text parts into a value. Array params accept any count.
    pub fn decode_parts(&self, parts: &[String]) -> Option<Value> {
        if self.array {
            return parts
                .iter()
                .map(|part| self.ty.decode(part))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array);
        }
        match parts {
            [single] => self.ty.decode(single),
            _ => None,
        }
    }
}
