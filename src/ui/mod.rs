//! Terminal output helpers
//!
//! Styled output when attached to a terminal, plain text otherwise, so
//! that scripts and CI logs stay greppable.

mod context;
mod output;

pub use context::UiContext;
pub use output::{intro, key_value, section, step_info, step_ok, step_warn_hint};
