//! Declarative state parameters.
//!
//! - [`ParamType`]: how a value is read from and written to URL text
//! - [`Param`]: one parameter with its location, default and squash policy
//! - [`ParamSet`]: the ordered parameters of a state
//! - [`validate`]: accumulating validation of a parameter map

mod param;
mod set;
mod validation;

pub use param::{CustomType, Param, ParamConfig, ParamLocation, ParamType, Squash};
pub use set::{ParamSet, Params};
pub use validation::{check, validate, ParamIssue, ParamValidationError};

/// Build a [`Params`] map from `key => value` pairs.
///
/// # Example
///
/// ```
/// use wayfinder::params;
///
/// let p = params! { "id" => 5, "tab" => "info" };
/// assert_eq!(p["id"], 5);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::params::Params::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::params::Params::new();
        $(
            map.insert(::std::string::String::from($key), $crate::serde_json::json!($value));
        )+
        map
    }};
}
