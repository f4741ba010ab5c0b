use std::sync::Arc;

use crate::dictionary::TermFrequencyMap;

/// A point in the value domain of a feature type
pub type FeatureValue = i64;

/// Reserved value for absent or unknown features
pub const NONE: FeatureValue = -1;

/// How the values of a feature type are named
#[derive(Debug, Clone)]
pub enum FeatureValues {
    /// Plain integers `0..domain_size`
    Numeric(FeatureValue),
    /// A fixed list of value names
    Enumerated(Vec<String>),
    /// Terms of a vocabulary followed by extra values
    Resource {
        map: Arc<TermFrequencyMap>,
        extra: Vec<String>,
    },
}

/// One discrete feature dimension
///
/// The base is the position of the type among all types of its extractor,
/// assigned once the extractor knows all of them.
#[derive(Debug, Clone)]
pub struct FeatureType {
    name: String,
    base: usize,
    values: FeatureValues,
}

impl FeatureType {
    /// Create a type with values `0..domain_size`
    pub fn numeric<N: Into<String>>(name: N, domain_size: FeatureValue) -> Self {
        Self::new(name, FeatureValues::Numeric(domain_size))
    }

    /// Create a type whose values are the given names
    pub fn enumerated<N, I, V>(name: N, values: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::new(
            name,
            FeatureValues::Enumerated(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Create a type whose values are the terms of `map`, then `extra`
    pub fn resource<N, I, V>(name: N, map: Arc<TermFrequencyMap>, extra: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::new(
            name,
            FeatureValues::Resource {
                map,
                extra: extra.into_iter().map(Into::into).collect(),
            },
        )
    }

    fn new<N: Into<String>>(name: N, values: FeatureValues) -> Self {
        Self {
            name: name.into(),
            base: 0,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the type among the types of its extractor
    pub fn base(&self) -> usize {
        self.base
    }

    pub(crate) fn set_base(&mut self, base: usize) {
        self.base = base;
    }

    pub fn values(&self) -> &FeatureValues {
        &self.values
    }

    /// Number of distinct values; negative sizes are rejected by the extractor
    pub fn domain_size(&self) -> FeatureValue {
        match &self.values {
            FeatureValues::Numeric(size) => *size,
            FeatureValues::Enumerated(names) => names.len() as FeatureValue,
            FeatureValues::Resource { map, extra } => (map.size() + extra.len()) as FeatureValue,
        }
    }

    /// The value of the `index`th extra value of a resource type, or [`NONE`]
    pub fn extra_value(&self, index: usize) -> FeatureValue {
        match &self.values {
            FeatureValues::Resource { map, extra } if index < extra.len() => {
                (map.size() + index) as FeatureValue
            }
            _ => NONE,
        }
    }

    /// Human readable name of a value, `None` outside the domain
    pub fn value_name(&self, value: FeatureValue) -> Option<String> {
        if value < 0 || value >= self.domain_size() {
            return None;
        }
        match &self.values {
            FeatureValues::Numeric(_) => Some(value.to_string()),
            FeatureValues::Enumerated(names) => names.get(value as usize).cloned(),
            FeatureValues::Resource { map, extra } => {
                let index = value as usize;
                if index < map.size() {
                    map.term(value as i32).map(String::from)
                } else {
                    extra.get(index - map.size()).cloned()
                }
            }
        }
    }
}
