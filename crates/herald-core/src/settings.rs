//! Administrative key/value settings and their compiled-in defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const AFFILIATE_LINK: &str = "affiliate_link";
pub const CONTACT_LINK: &str = "contact_link";

/// Tokens accepted as `true` by [`get_bool`], compared case-insensitively.
const TRUE_TOKENS: [&str; 4] = ["1", "true", "yes", "on"];

/// A full settings map: defaults overlaid with persisted values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, String>);

impl Settings {
  pub fn new() -> Self { Self::default() }

  /// The compiled-in defaults used when nothing is persisted.
  pub fn defaults() -> Self {
    Self::from_iter([
      (AFFILIATE_LINK, "https://example.com"),
      (CONTACT_LINK, "https://t.me/mixeed22"),
    ])
  }

  /// Raw lookup. Distinguishes an absent key from an empty value.
  pub fn get(&self, key: &str) -> Option<&str> {
    self.0.get(key).map(String::as_str)
  }

  pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
    self.0.insert(key.into(), value.into());
  }

  /// A configured link. Absent and empty are both treated as unset.
  pub fn link(&self, key: &str) -> Option<&str> {
    self.get(key).filter(|v| !v.is_empty())
  }

  pub fn get_bool(&self, key: &str, default: bool) -> bool {
    get_bool(&self.0, key, default)
  }

  /// Return `self` with every key of `overrides` replacing its own.
  pub fn overlay(mut self, overrides: Settings) -> Self {
    self.0.extend(overrides.0);
    self
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }
}

impl From<BTreeMap<String, String>> for Settings {
  fn from(map: BTreeMap<String, String>) -> Self { Self(map) }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Settings {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
  }
}

impl IntoIterator for Settings {
  type Item = (String, String);
  type IntoIter = std::collections::btree_map::IntoIter<String, String>;

  fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}

/// Parse a boolean flag. `default` applies only when `key` is absent; any
/// present value outside [`TRUE_TOKENS`] is `false`.
pub fn get_bool(map: &BTreeMap<String, String>, key: &str, default: bool) -> bool {
  match map.get(key) {
    Some(value) => {
      let value = value.trim();
      TRUE_TOKENS.iter().any(|t| value.eq_ignore_ascii_case(t))
    }
    None => default,
  }
}
