//! Generic hierarchical configuration tree.
//!
//! Controllers persist themselves into a [`Config`] without knowing the final
//! storage format. A node is either empty, a scalar, a map keyed by string, or
//! an ordered list. Maps are backed by a `BTreeMap`, so the JSON encoding of a
//! tree is canonical and [`Config::digest`] is stable across runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Scalar leaf stored inside a [`Config`] tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Integers widen to floats so `5` and `5.0` read the same.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(value) => Some(*value),
            ConfigValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Int(value.into())
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<u32> for ConfigValue {
    fn from(value: u32) -> Self {
        ConfigValue::Int(value.into())
    }
}

impl From<f32> for ConfigValue {
    fn from(value: f32) -> Self {
        ConfigValue::Float(value.into())
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Str(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Str(value)
    }
}

/// Node of the hierarchical configuration tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Config {
    #[default]
    Empty,
    Value(ConfigValue),
    List(Vec<Config>),
    Map(BTreeMap<String, Config>),
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Config::Empty)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Config::Map(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Config::List(_))
    }

    pub fn map_get_child(&self, key: &str) -> Option<&Config> {
        match self {
            Config::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn map_get_value(&self, key: &str) -> Option<&ConfigValue> {
        match self.map_get_child(key) {
            Some(Config::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn map_get_string(&self, key: &str) -> Option<&str> {
        self.map_get_value(key).and_then(ConfigValue::as_str)
    }

    pub fn map_get_float(&self, key: &str) -> Option<f32> {
        self.map_get_value(key)
            .and_then(ConfigValue::as_f64)
            .map(|value| value as f32)
    }

    pub fn map_get_int(&self, key: &str) -> Option<i64> {
        self.map_get_value(key).and_then(ConfigValue::as_i64)
    }

    pub fn map_get_bool(&self, key: &str) -> Option<bool> {
        self.map_get_value(key).and_then(ConfigValue::as_bool)
    }

    /// Store a scalar under `key`. A non-map node is turned into an empty map first.
    pub fn map_set_value(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.ensure_map()
            .insert(key.into(), Config::Value(value.into()));
    }

    /// Insert a fresh empty child under `key`, replacing any existing one.
    pub fn map_make_child(&mut self, key: impl Into<String>) -> &mut Config {
        let slot = self.ensure_map().entry(key.into()).or_default();
        *slot = Config::Empty;
        slot
    }

    /// Detach the child under `key`. Non-map nodes are left untouched.
    pub fn map_remove(&mut self, key: &str) -> Option<Config> {
        match self {
            Config::Map(map) => map.remove(key),
            _ => None,
        }
    }

    pub fn map_keys(&self) -> impl Iterator<Item = &str> {
        let keys: Vec<&str> = match self {
            Config::Map(map) => map.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        };
        keys.into_iter()
    }

    pub fn list_length(&self) -> usize {
        match self {
            Config::List(items) => items.len(),
            _ => 0,
        }
    }

    pub fn list_child_at(&self, index: usize) -> Option<&Config> {
        match self {
            Config::List(items) => items.get(index),
            _ => None,
        }
    }

    /// Append an empty child and return it. A non-list node is turned into an empty list first.
    pub fn list_append_new(&mut self) -> &mut Config {
        let items = self.ensure_list();
        items.push(Config::Empty);
        let last = items.len() - 1;
        &mut items[last]
    }

    pub fn list_iter(&self) -> std::slice::Iter<'_, Config> {
        match self {
            Config::List(items) => items.iter(),
            _ => {
                let empty: &[Config] = &[];
                empty.iter()
            }
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// blake3 hash of the canonical JSON encoding.
    pub fn digest(&self) -> blake3::Hash {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&encoded)
    }

    fn ensure_map(&mut self) -> &mut BTreeMap<String, Config> {
        if !self.is_map() {
            *self = Config::Map(BTreeMap::new());
        }
        match self {
            Config::Map(map) => map,
            _ => unreachable!("config node was just converted into a map"),
        }
    }

    fn ensure_list(&mut self) -> &mut Vec<Config> {
        if !self.is_list() {
            *self = Config::List(Vec::new());
        }
        match self {
            Config::List(items) => items,
            _ => unreachable!("config node was just converted into a list"),
        }
    }
}
