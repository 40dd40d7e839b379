//! Parameter validation that reports every problem at once.
//!
//! Built on Stillwater's `Validation`, so a target with three bad params
//! yields three issues instead of stopping at the first.

use super::set::{ParamSet, Params};
use serde_json::Value;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// A single problem with a parameter value.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParamIssue {
    #[error("missing required parameter '{param}'")]
    Missing { param: String },

    #[error("parameter '{param}' expected {expected}, got {found}")]
    TypeMismatch {
        param: String,
        expected: String,
        found: Value,
    },
}

/// All parameter issues found for one state.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid params for state '{state}': {}", render_issues(.issues))]
pub struct ParamValidationError {
    pub state: String,
    pub issues: Vec<ParamIssue>,
}

fn render_issues(issues: &[ParamIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check normalized values against a param set, accumulating every issue.
pub fn validate(set: &ParamSet, values: &Params) -> Validation<(), NonEmptyVec<ParamIssue>> {
    let mut checks: Vec<Validation<(), NonEmptyVec<ParamIssue>>> = Vec::new();

    for param in set.iter() {
        let check = match values.get(&param.id) {
            None => Validation::fail(ParamIssue::Missing {
                param: param.id.clone(),
            }),
            Some(value) if !param.validates(value) => Validation::fail(ParamIssue::TypeMismatch {
                param: param.id.clone(),
                expected: if param.array {
                    format!("{}[]", param.ty)
                } else {
                    param.ty.to_string()
                },
                found: value.clone(),
            }),
            Some(_) => Validation::success(()),
        };
        checks.push(check);
    }

    Validation::all_vec(checks).map(|_| ())
}

/// [`validate`] flattened into a `Result` tagged with the state name.
pub fn check(state: &str, set: &ParamSet, values: &Params) -> Result<(), ParamValidationError> {
    match validate(set, values) {
        Validation::Success(_) => Ok(()),
        Validation::Failure(issues) => Err(ParamValidationError {
            state: state.to_string(),
            issues: issues.iter().cloned().collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Param, ParamConfig, ParamLocation, ParamType};
    use serde_json::json;

    fn set() -> ParamSet {
        let mut set = ParamSet::new();
        set.insert(Param::new("id", ParamLocation::Path, Some(ParamType::Int), None))
            .unwrap();
        set.insert(Param::new("slug", ParamLocation::Path, None, None))
            .unwrap();
        set.insert(Param::new(
            "tags",
            ParamLocation::Search,
            None,
            Some(&ParamConfig::value(json!([])).array()),
        ))
        .unwrap();
        set
    }

    #[test]
    fn validation_accumulates_all_issues() {
        let mut values = Params::new();
        values.insert("id".into(), json!("nope"));
        values.insert("tags".into(), json!("single"));

        let err = check("post", &set(), &values).unwrap_err();
        assert_eq!(err.state, "post");
        assert_eq!(err.issues.len(), 3);
        assert!(err
            .issues
            .iter()
            .any(|i| matches!(i, ParamIssue::Missing { param } if param == "slug")));
        assert!(err.issues.iter().any(
            |i| matches!(i, ParamIssue::TypeMismatch { expected, .. } if expected == "string[]")
        ));
    }

    #[test]
    fn validation_succeeds_for_normalized_values() {
        let mut raw = Params::new();
        raw.insert("id".into(), json!("3"));
        raw.insert("slug".into(), json!("hello"));
        let values = set().normalize(&raw);

        assert!(validate(&set(), &values).is_success());
    }

    #[test]
    fn error_message_lists_issues() {
        let err = check("post", &set(), &Params::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'id'"));
        assert!(message.contains("'slug'"));
    }
}
