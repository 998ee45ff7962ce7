//! Hyperparameter values, parameter sets and discrete distributions

use crate::error::{BenchError, Result};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    None,
}

impl ParamValue {
    fn type_error(&self, name: &str, expected: &str) -> BenchError {
        BenchError::invalid_param(name, self, format!("expected {}", expected))
    }

    /// Non-negative integer
    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            ParamValue::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Ok(*v as usize),
            _ => Err(self.type_error(name, "a non-negative integer")),
        }
    }

    /// Integer or `None`; negative integers also mean "no limit"
    pub fn as_opt_usize(&self, name: &str) -> Result<Option<usize>> {
        match self {
            ParamValue::None => Ok(None),
            ParamValue::Int(v) if *v < 0 => Ok(None),
            other => other.as_usize(name).map(Some),
        }
    }

    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            _ => Err(self.type_error(name, "a number")),
        }
    }

    pub fn as_opt_f64(&self, name: &str) -> Result<Option<f64>> {
        match self {
            ParamValue::None => Ok(None),
            other => other.as_f64(name).map(Some),
        }
    }

    pub fn as_bool(&self, name: &str) -> Result<bool> {
        match self {
            ParamValue::Bool(v) => Ok(*v),
            _ => Err(self.type_error(name, "a boolean")),
        }
    }

    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Str(v) => Ok(v),
            _ => Err(self.type_error(name, "a string")),
        }
    }

    /// Seed value: non-negative integer or `None`
    pub fn as_seed(&self, name: &str) -> Result<Option<u64>> {
        self.as_opt_usize(name).map(|v| v.map(|s| s as u64))
    }

    /// Numeric view used when sorting or plotting
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(true) => write!(f, "True"),
            ParamValue::Bool(false) => write!(f, "False"),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{:?}", v),
            ParamValue::Str(s) => write!(f, "'{}'", s),
            ParamValue::None => write!(f, "None"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParamValue::None, Into::into)
    }
}

/// One assignment of parameter names to values, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(k, v)| format!("'{}': {}", k, v))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Discrete candidate values per parameter name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamDistributions(BTreeMap<String, Vec<ParamValue>>);

impl ParamDistributions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.0
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Integers `start, start + step, ...` below `stop`
    pub fn with_range(self, name: impl Into<String>, start: i64, stop: i64, step: i64) -> Self {
        self.with_values(name, range(start, stop, step))
    }

    pub fn get(&self, name: &str) -> Option<&[ParamValue]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of points in the full grid
    pub fn grid_size(&self) -> usize {
        if self.0.is_empty() {
            return 0;
        }
        self.0.values().map(Vec::len).product()
    }

    /// The `i`-th grid point; the last name in order varies fastest
    pub fn grid_point(&self, mut i: usize) -> ParamSet {
        let mut set = ParamSet::new();
        for (name, values) in self.0.iter().rev() {
            let n = values.len();
            set.insert(name.clone(), values[i % n].clone());
            i /= n;
        }
        set
    }

    fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(BenchError::Search("no parameters to search".into()));
        }
        if let Some((name, _)) = self.0.iter().find(|(_, v)| v.is_empty()) {
            return Err(BenchError::Search(format!(
                "parameter '{}' has no candidate values",
                name
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ParamDistributions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(k, vs)| {
                let vals: Vec<String> = vs.iter().map(ToString::to_string).collect();
                format!("'{}': [{}]", k, vals.join(", "))
            })
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// `start..stop` by `step`
pub fn range(start: i64, stop: i64, step: i64) -> Vec<i64> {
    if step == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut v = start;
    while (step > 0 && v < stop) || (step < 0 && v > stop) {
        out.push(v);
        v += step;
    }
    out
}

/// Draws parameter sets from the grid without replacement
#[derive(Debug, Clone)]
pub struct ParameterSampler {
    distributions: ParamDistributions,
    n_iter: usize,
    random_state: Option<u64>,
}

impl ParameterSampler {
    pub fn new(distributions: ParamDistributions, n_iter: usize, random_state: Option<u64>) -> Self {
        Self {
            distributions,
            n_iter,
            random_state,
        }
    }

    /// `min(n_iter, grid size)` distinct grid points in random order
    pub fn sample(&self) -> Result<Vec<ParamSet>> {
        self.distributions.validate()?;

        let grid_size = self.distributions.grid_size();
        let n = self.n_iter.min(grid_size);
        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(index::sample(&mut rng, grid_size, n)
            .into_iter()
            .map(|i| self.distributions.grid_point(i))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_matches_half_open_semantics() {
        assert_eq!(range(10, 110, 10), vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
        assert_eq!(range(1, 6, 1), vec![1, 2, 3, 4, 5]);
        assert!(range(5, 1, 1).is_empty());
    }

    #[test]
    fn test_param_value_conversions() {
        assert_eq!(ParamValue::Int(3).as_usize("d").unwrap(), 3);
        assert_eq!(ParamValue::Int(-1).as_opt_usize("d").unwrap(), None);
        assert_eq!(ParamValue::None.as_opt_usize("d").unwrap(), None);
        assert_eq!(ParamValue::Int(2).as_f64("lr").unwrap(), 2.0);
        assert!(ParamValue::Str("x".into()).as_usize("d").is_err());
        assert!(ParamValue::Int(-3).as_usize("d").is_err());
    }

    #[test]
    fn test_param_set_display() {
        let set = ParamSet::new()
            .with("clf__max_depth", 3i64)
            .with("clf__criterion", "gini");
        assert_eq!(set.to_string(), "{'clf__criterion': 'gini', 'clf__max_depth': 3}");
    }

    #[test]
    fn test_grid_enumeration() {
        let dists = ParamDistributions::new()
            .with_range("a", 0, 2, 1)
            .with_values("b", ["x", "y", "z"]);
        assert_eq!(dists.grid_size(), 6);

        let first = dists.grid_point(0);
        assert_eq!(first.get("a"), Some(&ParamValue::Int(0)));
        assert_eq!(first.get("b"), Some(&ParamValue::Str("x".into())));
        let fourth = dists.grid_point(4);
        assert_eq!(fourth.get("a"), Some(&ParamValue::Int(1)));
        assert_eq!(fourth.get("b"), Some(&ParamValue::Str("y".into())));
    }

    #[test]
    fn test_sampler_exhausts_small_grid_without_repeats() {
        let dists = ParamDistributions::new().with_range("clf__max_depth", 1, 6, 1);
        let sampled = ParameterSampler::new(dists, 100, Some(0)).sample().unwrap();

        assert_eq!(sampled.len(), 5);
        let mut depths: Vec<i64> = sampled
            .iter()
            .map(|s| match s.get("clf__max_depth") {
                Some(ParamValue::Int(v)) => *v,
                _ => panic!("missing depth"),
            })
            .collect();
        depths.sort_unstable();
        assert_eq!(depths, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_sampler_is_seeded() {
        let dists = ParamDistributions::new().with_range("n", 0, 50, 1);
        let a = ParameterSampler::new(dists.clone(), 5, Some(11)).sample().unwrap();
        let b = ParameterSampler::new(dists, 5, Some(11)).sample().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn test_empty_distribution_is_an_error() {
        let dists = ParamDistributions::new().with_values::<i64>("a", vec![]);
        assert!(ParameterSampler::new(dists, 3, Some(0)).sample().is_err());
    }
}
