//! Ordered parameter sets.

use super::param::Param;
use serde_json::Value;
use std::collections::BTreeMap;

/// A map of parameter id to value, used for both raw and normalized params.
pub type Params = BTreeMap<String, Value>;

/// Ordered collection of [`Param`]s with unique ids.
#[derive(Clone, Debug, Default)]
pub struct ParamSet {
    params: Vec<Param>,
}

impl ParamSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter. Returns the rejected param if the id is taken.
    pub fn insert(&mut self, param: Param) -> Result<(), Param> {
        if self.get(&param.id).is_some() {
            return Err(param);
        }
        self.params.push(param);
        Ok(())
    }

    /// Look up a param by id.
    pub fn get(&self, id: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Params in declaration order, ancestors first.
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    /// Param ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Union of `self` (first) and `other`.
    ///
    /// Fails with the first colliding id.
    pub fn merge(&self, other: &ParamSet) -> Result<ParamSet, String> {
        let mut merged = self.clone();
        for param in other.iter() {
            merged.insert(param.clone()).map_err(|p| p.id)?;
        }
        Ok(merged)
    }

    /// Default values of all optional params.
    pub fn defaults(&self) -> Params {
        self.params
            .iter()
            .filter_map(|p| p.default.clone().map(|d| (p.id.clone(), d)))
            .collect()
    }

    /// Normalize raw input against this set.
    ///
    /// Unknown keys are dropped; missing optional params get their default;
    /// string forms are coerced to the param type.
    pub fn normalize(&self, raw: &Params) -> Params {
        self.params
            .iter()
            .filter_map(|p| p.value(raw.get(&p.id)).map(|v| (p.id.clone(), v)))
            .collect()
    }

    /// Deep-equality of two normalized maps, restricted to this set's ids.
    pub fn equals(&self, a: &Params, b: &Params) -> bool {
        self.params.iter().all(|p| a.get(&p.id) == b.get(&p.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamConfig, ParamLocation, ParamType};
    use serde_json::json;

    fn set() -> ParamSet {
        let mut set = ParamSet::new();
        set.insert(Param::new("id", ParamLocation::Path, Some(ParamType::Int), None))
            .unwrap();
        set.insert(Param::new(
            "page",
            ParamLocation::Search,
            Some(ParamType::Int),
            Some(&ParamConfig::value(1)),
        ))
        .unwrap();
        set
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let mut set = set();
        let dup = Param::new("id", ParamLocation::Config, None, None);
        assert!(set.insert(dup).is_err());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn merge_reports_collision() {
        let other = set();
        assert_eq!(set().merge(&other).unwrap_err(), "id");
    }

    #[test]
    fn normalize_drops_unknown_and_fills_defaults() {
        let mut raw = Params::new();
        raw.insert("id".into(), json!("9"));
        raw.insert("other".into(), json!(true));
        let normalized = set().normalize(&raw);
        assert_eq!(normalized.get("id"), Some(&json!(9)));
        assert_eq!(normalized.get("page"), Some(&json!(1)));
        assert!(!normalized.contains_key("other"));
    }

    #[test]
    fn equals_only_compares_own_ids() {
        let set = set();
        let mut a = set.defaults();
        a.insert("id".into(), json!(1));
        let mut b = a.clone();
        b.insert("unrelated".into(), json!("x"));
        assert!(set.equals(&a, &b));
        b.insert("id".into(), json!(2));
        assert!(!set.equals(&a, &b));
    }
}
