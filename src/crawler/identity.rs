//! Client identity rotation
//!
//! Each outbound request presents a browser profile (user-agent plus the
//! matching client-hint headers and viewport). The rotator owns the shared
//! position/usage state and serializes updates, so one instance can be
//! handed to every worker.

use std::sync::Mutex;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::RotationStrategy;
use crate::error::{Error, Result};

/// A browser profile presented as the outbound client identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: &'static str,
    pub accept_language: &'static str,
    pub sec_ch_ua: &'static str,
    pub sec_ch_ua_platform: &'static str,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

/// Built-in pool of realistic browser profiles
pub const PROFILES: &[Identity] = &[
    // Chrome on macOS
    Identity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36",
        accept_language: "en-US,en;q=0.9",
        sec_ch_ua: "\"Not)A;Brand\";v=\"8\", \"Chromium\";v=\"138\", \"Google Chrome\";v=\"138\"",
        sec_ch_ua_platform: "\"macOS\"",
        viewport_width: 1920,
        viewport_height: 1080,
    },
    // Chrome on Windows
    Identity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36",
        accept_language: "en-US,en;q=0.9",
        sec_ch_ua: "\"Not)A;Brand\";v=\"8\", \"Chromium\";v=\"138\", \"Google Chrome\";v=\"138\"",
        sec_ch_ua_platform: "\"Windows\"",
        viewport_width: 1920,
        viewport_height: 1080,
    },
    // Firefox on macOS
    Identity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/119.0",
        accept_language: "en-US,en;q=0.5",
        sec_ch_ua: "\"Firefox\";v=\"119\"",
        sec_ch_ua_platform: "\"macOS\"",
        viewport_width: 1440,
        viewport_height: 900,
    },
    // Firefox on Windows
    Identity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/119.0",
        accept_language: "en-US,en;q=0.5",
        sec_ch_ua: "\"Firefox\";v=\"119\"",
        sec_ch_ua_platform: "\"Windows\"",
        viewport_width: 1920,
        viewport_height: 1080,
    },
    // Safari on macOS
    Identity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
        accept_language: "en-US,en;q=0.9",
        sec_ch_ua: "\"Safari\";v=\"17.1\"",
        sec_ch_ua_platform: "\"macOS\"",
        viewport_width: 1440,
        viewport_height: 900,
    },
    // Edge on Windows
    Identity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36 Edg/138.0.2623.0",
        accept_language: "en-US,en;q=0.9",
        sec_ch_ua: "\"Microsoft Edge\";v=\"138\", \"Chromium\";v=\"138\", \"Not)A;Brand\";v=\"8\"",
        sec_ch_ua_platform: "\"Windows\"",
        viewport_width: 1920,
        viewport_height: 1080,
    },
    // Chrome on Linux
    Identity {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36",
        accept_language: "en-US,en;q=0.9",
        sec_ch_ua: "\"Not)A;Brand\";v=\"8\", \"Chromium\";v=\"138\", \"Google Chrome\";v=\"138\"",
        sec_ch_ua_platform: "\"Linux\"",
        viewport_width: 1920,
        viewport_height: 1080,
    },
];

/// Position and usage state shared across workers
#[derive(Debug, Default)]
struct RotatorState {
    /// Next index for the sequential strategy
    cursor: usize,
    /// Per-profile draw counts, used by the weighted strategy
    usage: Vec<u64>,
}

/// Selects an outbound identity per request according to the configured
/// strategy. Safe for concurrent callers; position updates are serialized.
pub struct IdentityRotator {
    profiles: Vec<Identity>,
    strategy: RotationStrategy,
    state: Mutex<RotatorState>,
}

impl IdentityRotator {
    /// Create a rotator over the built-in profile pool
    pub fn new(strategy: RotationStrategy) -> Result<Self> {
        Self::with_profiles(PROFILES.to_vec(), strategy)
    }

    /// Create a rotator over a custom pool.
    ///
    /// Fails fast if the pool is empty: every `next_identity` call must
    /// produce a valid identity.
    pub fn with_profiles(profiles: Vec<Identity>, strategy: RotationStrategy) -> Result<Self> {
        if profiles.is_empty() {
            return Err(Error::config("identity pool must not be empty"));
        }

        let usage = vec![0u64; profiles.len()];
        Ok(Self {
            profiles,
            strategy,
            state: Mutex::new(RotatorState { cursor: 0, usage }),
        })
    }

    /// Select the identity for the next request
    pub fn next_identity(&self) -> Identity {
        let mut state = self.state.lock().unwrap();

        let index = match self.strategy {
            RotationStrategy::Random => rand::thread_rng().gen_range(0..self.profiles.len()),
            RotationStrategy::Sequential => {
                let i = state.cursor;
                state.cursor = (state.cursor + 1) % self.profiles.len();
                i
            }
            RotationStrategy::Weighted => {
                // Bias toward the least-used profiles to spread the
                // fingerprint load evenly over long runs
                let min_usage = state.usage.iter().copied().min().unwrap_or(0);
                let candidates: Vec<usize> = state
                    .usage
                    .iter()
                    .enumerate()
                    .filter(|(_, &count)| count == min_usage)
                    .map(|(i, _)| i)
                    .collect();
                *candidates
                    .choose(&mut rand::thread_rng())
                    .unwrap_or(&0)
            }
        };

        state.usage[index] += 1;
        self.profiles[index].clone()
    }

    /// Number of profiles in the pool
    pub fn pool_size(&self) -> usize {
        self.profiles.len()
    }

    /// Per-profile draw counts (indexable by pool position)
    pub fn usage_counts(&self) -> Vec<u64> {
        self.state.lock().unwrap().usage.clone()
    }
}
