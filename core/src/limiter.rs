// Rolling-window admission quota
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Configuration for the admission quota, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_requests: std::env::var("RATE_LIMIT_MAX")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(500),
            window: Duration::from_secs(
                std::env::var("RATE_LIMIT_WINDOW_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(86_400),
            ),
        }
    }
}

/// Fixed request quota per identifier over a rolling window.
///
/// Hosts gate assistant requests on `admit` before they reach the session
/// layer; the core assumes admitted requests are within policy.
pub struct RollingQuota {
    cfg: QuotaConfig,
    log: DashMap<String, Vec<Instant>>,
}

impl RollingQuota {
    pub fn new(cfg: QuotaConfig) -> Self {
        Self {
            cfg,
            log: DashMap::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(QuotaConfig::default())
    }

    /// Admit or reject a request for `identifier`, recording it when
    /// admitted. Expired entries are pruned on the way in.
    pub fn admit(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.log.entry(identifier.to_string()).or_default();
        entry.retain(|ts| now.duration_since(*ts) < self.cfg.window);

        if entry.len() >= self.cfg.max_requests {
            warn!(
                target: "quota",
                identifier,
                used = entry.len(),
                limit = self.cfg.max_requests,
                "request rejected by rolling quota"
            );
            return false;
        }

        entry.push(now);
        debug!(target: "quota", identifier, used = entry.len(), "request admitted");
        true
    }

    /// Requests left in the current window, without recording anything.
    pub fn remaining(&self, identifier: &str) -> usize {
        let now = Instant::now();
        let used = self
            .log
            .get(identifier)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|ts| now.duration_since(**ts) < self.cfg.window)
                    .count()
            })
            .unwrap_or(0);
        self.cfg.max_requests.saturating_sub(used)
    }
}
