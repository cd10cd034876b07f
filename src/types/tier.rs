use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Rank cutoffs for tier assignment: ranks [0, HOT_TIER_SIZE) are hot,
/// [HOT_TIER_SIZE, HOT_TIER_SIZE + MEDIUM_TIER_SIZE) are medium, the rest cold.
pub const HOT_TIER_SIZE: usize = 20;
pub const MEDIUM_TIER_SIZE: usize = 180;

/// Static refresh classification of an asset. Assigned once at startup from
/// popularity rank and never changed for the process lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Hot,
    Medium,
    Cold,
}

impl Tier {
    /// How often the scheduler refreshes assets in this tier.
    pub fn refresh_interval(&self) -> Duration {
        match self {
            Tier::Hot => Duration::from_secs(5),
            Tier::Medium => Duration::from_secs(30),
            Tier::Cold => Duration::from_secs(300),
        }
    }

    /// Cache TTL applied to entries written for assets in this tier.
    pub fn cache_ttl(&self) -> Duration {
        match self {
            Tier::Hot => Duration::from_secs(10),
            Tier::Medium => Duration::from_secs(60),
            Tier::Cold => Duration::from_secs(300),
        }
    }

    /// Metric / API label for this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Hot => "hot",
            Tier::Medium => "medium",
            Tier::Cold => "cold",
        }
    }

    fn from_rank(rank: usize) -> Tier {
        if rank < HOT_TIER_SIZE {
            Tier::Hot
        } else if rank < HOT_TIER_SIZE + MEDIUM_TIER_SIZE {
            Tier::Medium
        } else {
            Tier::Cold
        }
    }
}

/// Partition an ordered asset universe (rank = position) into tiers.
pub fn assign_tiers(ordered_assets: &[String]) -> HashMap<String, Tier> {
    let tiers: HashMap<String, Tier> = ordered_assets
        .iter()
        .enumerate()
        .map(|(rank, asset)| (asset.clone(), Tier::from_rank(rank)))
        .collect();

    let hot = ordered_assets.len().min(HOT_TIER_SIZE);
    let medium = ordered_assets
        .len()
        .saturating_sub(HOT_TIER_SIZE)
        .min(MEDIUM_TIER_SIZE);
    let cold = ordered_assets
        .len()
        .saturating_sub(HOT_TIER_SIZE + MEDIUM_TIER_SIZE);
    tracing::info!("Assigned tiers: {} hot, {} medium, {} cold", hot, medium, cold);

    tiers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universe(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("asset{}", i)).collect()
    }

    #[test]
    fn assignment_partitions_by_rank() {
        let assets = universe(250);
        let tiers = assign_tiers(&assets);

        assert_eq!(tiers["asset0"], Tier::Hot);
        assert_eq!(tiers["asset19"], Tier::Hot);
        assert_eq!(tiers["asset20"], Tier::Medium);
        assert_eq!(tiers["asset199"], Tier::Medium);
        assert_eq!(tiers["asset200"], Tier::Cold);
        assert_eq!(tiers["asset249"], Tier::Cold);
    }

    #[test]
    fn small_universe_is_all_hot() {
        let assets = universe(12);
        let tiers = assign_tiers(&assets);

        assert_eq!(tiers.len(), 12);
        assert!(tiers.values().all(|t| *t == Tier::Hot));
    }

    #[test]
    fn intervals_shorten_with_heat() {
        assert!(Tier::Hot.refresh_interval() < Tier::Medium.refresh_interval());
        assert!(Tier::Medium.refresh_interval() < Tier::Cold.refresh_interval());
        assert!(Tier::Hot.cache_ttl() < Tier::Medium.cache_ttl());
        assert!(Tier::Medium.cache_ttl() < Tier::Cold.cache_ttl());
    }
}
