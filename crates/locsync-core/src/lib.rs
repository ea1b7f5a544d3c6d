//! Shared vocabulary for the sync engine: the format-independent translation
//! unit every codec produces, locales with their plural categories, and the
//! single function that decides entity identity.

pub mod locale;
pub mod model;

pub use locale::{builtin_locale, Locale, PluralCategory};
pub use model::{entity_key, PluralForm, SourceLocation, VcsTranslation};

/// Workspace-wide result alias.
pub type Result<T> = color_eyre::eyre::Result<T>;
