pub mod handler;
pub mod input;
pub mod subview;

pub use handler::*;
pub use input::*;
pub use subview::*;

use std::collections::BTreeMap;

/// Key overrides keyed by key id
pub type KeyOverrides = BTreeMap<String, KeyOverride>;
