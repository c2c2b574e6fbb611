//! Translation catalog and the locale fallback chain.
//!
//! Lookup order is: the requested locale, then the default locale, then the
//! key itself. A present-but-empty template counts as present, so a message
//! can be blanked on purpose for one locale.

use std::{collections::HashMap, fmt::Display, path::Path};

use crate::{Locale, Result};

/// Read-only mapping of `locale code → (message key → template)`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
  entries: HashMap<String, HashMap<String, String>>,
}

impl Catalog {
  pub fn empty() -> Self { Self::default() }

  /// Parse a catalog from a JSON object of objects.
  pub fn from_json(input: &str) -> Result<Self> {
    Ok(Self { entries: serde_json::from_str(input)? })
  }

  /// Load a catalog file. A missing or malformed file yields an empty
  /// catalog.
  pub fn load(path: impl AsRef<Path>) -> Self {
    let path = path.as_ref();
    let raw = match std::fs::read_to_string(path) {
      Ok(raw) => raw,
      Err(e) => {
        tracing::warn!(path = %path.display(), "translations unavailable: {e}");
        return Self::empty();
      }
    };
    Self::from_json(&raw).unwrap_or_else(|e| {
      tracing::warn!(path = %path.display(), "malformed translations: {e}");
      Self::empty()
    })
  }

  pub fn insert(
    &mut self,
    locale: impl Into<String>,
    key: impl Into<String>,
    template: impl Into<String>,
  ) {
    self
      .entries
      .entry(locale.into())
      .or_default()
      .insert(key.into(), template.into());
  }

  /// Exact lookup without any fallback.
  pub fn lookup(&self, locale: &str, key: &str) -> Option<&str> {
    self
      .entries
      .get(locale)
      .and_then(|bucket| bucket.get(key))
      .map(String::as_str)
  }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl<L, K, V> FromIterator<(L, K, V)> for Catalog
where
  L: Into<String>,
  K: Into<String>,
  V: Into<String>,
{
  fn from_iter<I: IntoIterator<Item = (L, K, V)>>(iter: I) -> Self {
    let mut catalog = Self::empty();
    for (locale, key, template) in iter {
      catalog.insert(locale, key, template);
    }
    catalog
  }
}

/// Resolve `key` for `locale`, falling back to `default_locale` and then to
/// the literal key.
pub fn resolve<'a>(
  catalog: &'a Catalog,
  default_locale: Locale,
  locale: &str,
  key: &'a str,
) -> &'a str {
  catalog
    .lookup(locale, key)
    .or_else(|| catalog.lookup(default_locale.code(), key))
    .unwrap_or(key)
}

/// A catalog bound to the process default locale.
#[derive(Debug, Clone, Default)]
pub struct Translator {
  catalog:        Catalog,
  default_locale: Locale,
}

impl Translator {
  pub fn new(catalog: Catalog, default_locale: Locale) -> Self {
    Self { catalog, default_locale }
  }

  pub fn default_locale(&self) -> Locale { self.default_locale }

  pub fn resolve<'a>(&'a self, locale: &str, key: &'a str) -> &'a str {
    resolve(&self.catalog, self.default_locale, locale, key)
  }

  /// Resolve `key` and substitute `{name}` placeholders from `args`.
  /// Placeholders without a matching argument are left as they are.
  pub fn render(
    &self,
    locale: &str,
    key: &str,
    args: &[(&str, &dyn Display)],
  ) -> String {
    let mut text = self.resolve(locale, key).to_owned();
    for (name, value) in args {
      text = text.replace(&format!("{{{name}}}"), &value.to_string());
    }
    text
  }
}
