/// Engine configuration and tunable parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Buffer size of the attribute event channel.
    /// Subscribers that fall further behind than this observe a lag.
    pub event_capacity: usize,

    /// Log lookups of missing attributes at `warn` instead of `debug`.
    pub warn_on_missing_attribute: bool,
}

impl EngineConfig {
    // ===== runtime-tunable defaults =====
    pub const DEFAULT_EVENT_CAPACITY: usize = 256;
    pub const DEFAULT_WARN_ON_MISSING_ATTRIBUTE: bool = true;

    pub fn new() -> Self {
        Self {
            event_capacity: Self::DEFAULT_EVENT_CAPACITY,
            warn_on_missing_attribute: Self::DEFAULT_WARN_ON_MISSING_ATTRIBUTE,
        }
    }

    pub fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }

    pub fn with_missing_attribute_warnings(mut self, enabled: bool) -> Self {
        self.warn_on_missing_attribute = enabled;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
