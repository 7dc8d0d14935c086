//! Streaming EOL and keyword substitution engine for version-control
//! working copies.
//!
//! Given a byte stream and a translation policy, this crate normalizes
//! line terminators, expands or contracts `$Keyword$` markers, and can
//! materialize or detranslate symbolic-link "special files" through a
//! textual sidecar encoding. See [`translate::copy_and_translate`] for
//! the file-level entry point and [`stream::TranslatedStream`] for the
//! streaming one.

pub mod eol;
pub mod error;
pub mod keywords;
pub mod special;
pub mod stream;
pub mod subst;
pub mod translate;

pub use error::{Result, SubstError as Error};
pub use translate::TranslationOptions;
