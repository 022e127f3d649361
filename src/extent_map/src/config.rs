use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtentMapConfig {
    /// Upper bound on the number of stored extents. `None` means unbounded.
    pub max_extents: Option<usize>,
    /// Run `ExtentMap::validate` after every update and panic on corruption.
    pub validate_on_update: bool,
}

impl ExtentMapConfig {
    pub fn with_max_extents(mut self, max_extents: usize) -> Self {
        self.max_extents = Some(max_extents);
        self
    }

    pub fn with_validate_on_update(mut self, validate: bool) -> Self {
        self.validate_on_update = validate;
        self
    }
}
