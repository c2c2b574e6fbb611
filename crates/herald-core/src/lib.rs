//! Core types and trait definitions for the Herald broadcast service.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! storage backend (`herald-store-sqlite`) and the delivery transport live
//! behind the traits in [`store`] and [`broadcast`].

pub mod bootstrap;
pub mod broadcast;
pub mod error;
pub mod i18n;
pub mod locale;
pub mod settings;
pub mod store;
pub mod subscriber;

pub use error::{Error, Result};
pub use locale::Locale;
pub use settings::Settings;
pub use subscriber::{Subscriber, SubscriberId};
