//! Block file configuration.

/// Default cap for a single segment file.
pub const DEFAULT_MAX_SEGMENT_SIZE: u32 = 2 * 1000 * 1000 * 1000;

/// Configuration for opening a block file.
#[derive(Debug, Clone)]
pub struct BlockFileConfig {
    /// Maximum size of a single segment file before rotation.
    pub max_segment_size: u32,

    /// Whether to create the repository root if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for BlockFileConfig {
    fn default() -> Self {
        Self {
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            create_if_missing: true,
        }
    }
}

impl BlockFileConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets maximum segment file size.
    #[must_use]
    pub const fn max_segment_size(mut self, size: u32) -> Self {
        self.max_segment_size = size;
        self
    }

    /// Sets whether to create the repository root if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }
}
