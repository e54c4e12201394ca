use std::time::Duration;

use serde::Deserialize;

// ═══════════════════════════════════════════════════════════════
//  Tail session settings
// ═══════════════════════════════════════════════════════════════

/// Timing knobs of a tail session.
#[derive(Debug, Clone, Deserialize)]
pub struct TailSettings {
    /// Period of the render tick that flushes the window.
    #[serde(default = "default_render_interval_ms")]
    pub render_interval_ms: u64,
    /// Settle delay before reopening a failed transport.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Upper bound when consecutive failures grow the delay.
    /// Equal to `reconnect_delay_ms` keeps the delay fixed.
    #[serde(default = "default_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
}

fn default_render_interval_ms() -> u64 {
    33
}
fn default_reconnect_delay_ms() -> u64 {
    1000
}

impl Default for TailSettings {
    fn default() -> Self {
        Self {
            render_interval_ms: default_render_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl TailSettings {
    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Query session settings
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct QuerySettings {
    /// Wait between rounds of a live query and before retrying a failed request.
    #[serde(default = "default_repoll_interval_ms")]
    pub repoll_interval_ms: u64,
    /// Result buffer cap; the oldest rows are dropped beyond it.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Event types that mark the queried process as finished.
    #[serde(default = "default_terminal_types")]
    pub terminal_types: Vec<String>,
}

fn default_repoll_interval_ms() -> u64 {
    1000
}
fn default_max_results() -> usize {
    1000
}
fn default_terminal_types() -> Vec<String> {
    vec!["MSG_CANCELED".into()]
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            repoll_interval_ms: default_repoll_interval_ms(),
            max_results: default_max_results(),
            terminal_types: default_terminal_types(),
        }
    }
}

impl QuerySettings {
    pub fn repoll_interval(&self) -> Duration {
        Duration::from_millis(self.repoll_interval_ms)
    }
}
