use serde::{Deserialize, Serialize};

/// Options forwarded unchanged to every validation engine call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Allow the engine to coerce values into their canonical type
    /// (for example `"3"` into `3` for a numeric field).
    pub coerce: bool,
    /// Allow required fields to be absent.
    pub partial: bool,
}

impl ValidationOptions {
    /// Options with coercion enabled.
    pub fn coercing() -> Self {
        Self {
            coerce: true,
            ..Self::default()
        }
    }

    /// Return a copy with the partial flag set.
    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }
}
