//! Swarm instance pool
//!
//! The pool is fixed for the lifetime of the process. Every download cycle walks
//! a fresh uniform shuffle of it so that no public instance is favoured.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::core::models::InstanceEndpoint;

/// Public instances known to serve the swarm JSON API (mixed regions)
pub const DEFAULT_INSTANCES: &[&str] = &[
    "https://api.download.ax/api/json",
    "https://cobalt.j22.dev/api/json",
    "https://api.cobalt.tools/api/json",
    "https://cobalt.kwiatekmiki.pl/api/json",
    "https://cobalt.xy24.eu/api/json",
    "https://cobalt.kanzen.click/api/json",
    "https://cobalt.synn.cc/api/json",
    "https://cobalt.typings.dev/api/json",
    "https://cobalt.smartcode.rs/api/json",
    "https://cobalt.154.53.53.53.sslip.io/api/json",
    "https://cobalt.q1n.net/api/json",
    "https://api.server.cobalt.tools/api/json",
    "https://dl.khub.ky/api/json",
    "https://cobalt.arms.nu/api/json",
    "https://cobalt.ethan.link/api/json",
    "https://cobalt.my.to/api/json",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePool {
    endpoints: Vec<InstanceEndpoint>,
}

impl InstancePool {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: urls.into_iter().map(InstanceEndpoint::new).collect(),
        }
    }

    pub fn endpoints(&self) -> &[InstanceEndpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Fisher-Yates shuffle of the whole pool
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<InstanceEndpoint> {
        let mut order = self.endpoints.clone();
        order.shuffle(rng);
        order
    }
}

impl Default for InstancePool {
    fn default() -> Self {
        Self::new(DEFAULT_INSTANCES.iter().copied())
    }
}
