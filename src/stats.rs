//! Render statistics for debugging and performance analysis.
//!
//! Dispatch counters live on the [`RenderManager`](crate::RenderManager) that owns
//! them; cache counters are read from the style cache, asset pool and state store when
//! a snapshot is taken.

/// Snapshot of accumulated render statistics.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub passes: u64,
    pub draws: u64,
    pub measures: u64,
    /// Elements replaced by an error box (draw) or a zero size (measure).
    pub failures: u64,
    /// Dispatches with no registered renderer.
    pub misses: u64,
    pub style_hits: u64,
    pub style_misses: u64,
    pub state_created: u64,
    pub state_evicted: u64,
    pub asset_hits: u64,
    pub asset_misses: u64,
}

impl StatsSnapshot {
    /// Fraction of style resolutions served from the cache.
    pub fn style_hit_rate(&self) -> f64 {
        let total = self.style_hits + self.style_misses;
        if total == 0 {
            0.0
        } else {
            self.style_hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct RenderStats {
    pub passes: u64,
    pub draws: u64,
    pub measures: u64,
    pub failures: u64,
    pub misses: u64,
}

impl RenderStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// One-line summary at debug level, emitted after every pass.
    pub fn log_summary(&self, snapshot: &StatsSnapshot) {
        log::debug!(
            "pass {}: draws={} measures={} failures={} misses={} styles {}/{} ({:.0}% hit) state +{}/-{}",
            snapshot.passes,
            self.draws,
            self.measures,
            self.failures,
            self.misses,
            snapshot.style_hits,
            snapshot.style_hits + snapshot.style_misses,
            snapshot.style_hit_rate() * 100.0,
            snapshot.state_created,
            snapshot.state_evicted,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_hit_rate() {
        let snapshot = StatsSnapshot {
            style_hits: 3,
            style_misses: 1,
            ..Default::default()
        };
        assert_eq!(snapshot.style_hit_rate(), 0.75);
        assert_eq!(StatsSnapshot::default().style_hit_rate(), 0.0);
    }
}
