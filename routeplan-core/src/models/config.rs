//! Planning and commit configuration.

#[cfg(test)]
#[path = "../../tests/unit/models/config_test.rs"]
mod config_test;

use crate::utils::{GenericError, GenericResult};
use serde::Deserialize;
use std::io::{BufReader, Read};

/// A default amount of route groups.
pub const DEFAULT_GROUP_COUNT: usize = 2;
/// A default max amount of stops in the single group.
pub const DEFAULT_MAX_STOPS_PER_GROUP: usize = 25;
/// A default limit of k-means iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// An engine configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Specifies initial planning configuration.
    pub planning: Option<PlanningConfig>,
    /// Specifies commit configuration.
    pub commit: Option<CommitConfig>,
}

/// An initial planning configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningConfig {
    /// Amount of groups (routes) to create. Default is 2.
    pub group_count: Option<usize>,
    /// Max stops per group. Default is 25.
    pub max_stops_per_group: Option<usize>,
    /// Max k-means iterations. Default is 20.
    pub max_iterations: Option<usize>,
}

/// A commit configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitConfig {
    /// Whether agent notifications are sent. Default is true.
    pub notify_agents: Option<bool>,
}

/// Resolved clustering limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusteringLimits {
    /// Amount of groups.
    pub group_count: usize,
    /// Max stops per group.
    pub max_stops_per_group: usize,
    /// Max k-means iterations.
    pub max_iterations: usize,
}

impl Default for ClusteringLimits {
    fn default() -> Self {
        Self {
            group_count: DEFAULT_GROUP_COUNT,
            max_stops_per_group: DEFAULT_MAX_STOPS_PER_GROUP,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl Config {
    /// Returns clustering limits with defaults applied.
    pub fn clustering_limits(&self) -> ClusteringLimits {
        let defaults = ClusteringLimits::default();

        self.planning
            .as_ref()
            .map(|planning| ClusteringLimits {
                group_count: planning.group_count.unwrap_or(defaults.group_count),
                max_stops_per_group: planning.max_stops_per_group.unwrap_or(defaults.max_stops_per_group),
                max_iterations: planning.max_iterations.unwrap_or(defaults.max_iterations),
            })
            .unwrap_or(defaults)
    }

    /// Returns whether agents should be notified about changes.
    pub fn notify_agents(&self) -> bool {
        self.commit.as_ref().and_then(|commit| commit.notify_agents).unwrap_or(true)
    }
}

/// Reads config from reader and validates it.
pub fn read_config<R: Read>(reader: BufReader<R>) -> GenericResult<Config> {
    let config: Config =
        serde_json::from_reader(reader).map_err(|err| GenericError::from(format!("cannot deserialize config: '{err}'")))?;

    let limits = config.clustering_limits();
    if limits.group_count == 0 {
        return Err("group count should be positive".into());
    }

    if limits.max_stops_per_group == 0 {
        return Err("max stops per group should be positive".into());
    }

    Ok(config)
}
