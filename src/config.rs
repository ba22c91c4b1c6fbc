use crate::geometry::Size;
use crate::state::EvictionPolicy;

/// Render manager settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// What happens to state records an element stopped declaring.
    pub eviction: EvictionPolicy,
    /// Contain renderer panics at the element boundary. When off, a panic unwinds
    /// through `render_dom` (the stacks are still rebalanced on the next pass).
    pub catch_panics: bool,
    /// Record the panicking thread's backtrace for error boxes and logs.
    pub capture_backtraces: bool,
    /// Space allocated for the error box drawn in place of a failed element.
    pub error_box_size: Size,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            eviction: EvictionPolicy::Sweep,
            catch_panics: true,
            capture_backtraces: true,
            error_box_size: Size::new(240.0, 48.0),
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eviction(mut self, policy: EvictionPolicy) -> Self {
        self.eviction = policy;
        self
    }

    pub fn catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    pub fn capture_backtraces(mut self, enabled: bool) -> Self {
        self.capture_backtraces = enabled;
        self
    }

    pub fn error_box_size(mut self, size: Size) -> Self {
        self.error_box_size = size;
        self
    }
}
