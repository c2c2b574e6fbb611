//! The closed set of display languages a subscriber can choose from.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// A supported locale code.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
  #[default]
  En,
  Pl,
  Sr,
  Fr,
  Es,
  De,
  It,
}

impl Locale {
  /// Every supported locale, in presentation order.
  pub const ALL: [Locale; 7] = [
    Locale::En,
    Locale::Pl,
    Locale::Sr,
    Locale::Fr,
    Locale::Es,
    Locale::De,
    Locale::It,
  ];

  pub fn code(self) -> &'static str {
    match self {
      Locale::En => "en",
      Locale::Pl => "pl",
      Locale::Sr => "sr",
      Locale::Fr => "fr",
      Locale::Es => "es",
      Locale::De => "de",
      Locale::It => "it",
    }
  }

  /// English name of the language, shown in the language picker.
  pub fn display_name(self) -> &'static str {
    match self {
      Locale::En => "English",
      Locale::Pl => "Polish",
      Locale::Sr => "Serbian",
      Locale::Fr => "French",
      Locale::Es => "Spanish",
      Locale::De => "German",
      Locale::It => "Italian",
    }
  }

  pub fn flag(self) -> &'static str {
    match self {
      Locale::En => "🇺🇸",
      Locale::Pl => "🇵🇱",
      Locale::Sr => "🇷🇸",
      Locale::Fr => "🇫🇷",
      Locale::Es => "🇪🇸",
      Locale::De => "🇩🇪",
      Locale::It => "🇮🇹",
    }
  }

  /// Parse a locale code, ignoring case and any region suffix
  /// (`en-US`, `pl_PL`). Returns `None` for unsupported languages.
  pub fn parse(value: &str) -> Option<Self> {
    let normalized = value.trim().to_ascii_lowercase();
    let lang = normalized.split(['-', '_']).next().unwrap_or_default();
    Self::ALL.into_iter().find(|l| l.code() == lang)
  }
}

impl FromStr for Locale {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s).ok_or_else(|| Error::UnsupportedLocale(s.to_owned()))
  }
}

impl fmt::Display for Locale {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.code())
  }
}
