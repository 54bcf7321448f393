//! Resolution ladder: which output height a given video bitrate can afford.

use std::fmt;

use anyhow::Result;
use serde::Deserialize;

/// One rung of the ladder: an output height and the minimum video bitrate
/// that keeps it legible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ResolutionTier {
    pub height: u32,
    pub min_video_kbps: u32,
}

impl ResolutionTier {
    pub const fn new(height: u32, min_video_kbps: u32) -> Self {
        Self { height, min_video_kbps }
    }
}

/// Default tiers, highest to lowest.
pub const DEFAULT_TIERS: &[ResolutionTier] = &[
    ResolutionTier::new(1080, 2000),
    ResolutionTier::new(720, 800),
    ResolutionTier::new(480, 400),
    ResolutionTier::new(360, 200),
];

/// Outcome of a ladder lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderChoice {
    pub height: u32,
    /// False when no tier floor was met and the lowest tier was used as a last resort.
    pub meets_floor: bool,
}

/// Ordered, non-empty list of tiers with strictly decreasing even heights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionLadder {
    tiers: Vec<ResolutionTier>,
    lowest: ResolutionTier,
}

impl ResolutionLadder {
    /// Build a ladder from tiers ordered from highest to lowest height.
    ///
    /// # Errors
    /// Returns an error if the list is empty, a height is zero or odd,
    /// or the heights are not strictly decreasing.
    pub fn new(tiers: Vec<ResolutionTier>) -> Result<Self> {
        let Some(&lowest) = tiers.last() else {
            anyhow::bail!("Resolution ladder must contain at least one tier");
        };

        for tier in &tiers {
            if tier.height == 0 || tier.height % 2 != 0 {
                anyhow::bail!("Ladder height must be a positive even number, got {}", tier.height);
            }
        }

        if let Some(pair) = tiers.windows(2).find(|pair| pair[0].height <= pair[1].height) {
            anyhow::bail!(
                "Ladder tiers must be ordered from highest to lowest height: {}p before {}p",
                pair[0].height,
                pair[1].height
            );
        }

        Ok(Self { tiers, lowest })
    }

    pub fn tiers(&self) -> &[ResolutionTier] {
        &self.tiers
    }

    /// Highest tier that fits the source and whose bitrate floor is met.
    ///
    /// Falls back to the lowest tier when no floor is met.
    /// The legibility floor is advisory: the fallback is not an error.
    pub fn choose(&self, source_height: u32, available_video_kbps: u32) -> LadderChoice {
        self.tiers
            .iter()
            .find(|tier| tier.height <= source_height && available_video_kbps >= tier.min_video_kbps)
            .map_or(
                LadderChoice {
                    height: self.lowest.height,
                    meets_floor: false,
                },
                |tier| LadderChoice {
                    height: tier.height,
                    meets_floor: true,
                },
            )
    }

    /// Output height for the given source height and video bitrate budget.
    pub fn choose_height(&self, source_height: u32, available_video_kbps: u32) -> u32 {
        self.choose(source_height, available_video_kbps).height
    }

    /// Bitrate floor of the lowest tier.
    pub const fn lowest_floor_kbps(&self) -> u32 {
        self.lowest.min_video_kbps
    }
}

impl Default for ResolutionLadder {
    fn default() -> Self {
        let tiers = DEFAULT_TIERS.to_vec();
        let lowest = DEFAULT_TIERS[DEFAULT_TIERS.len() - 1];
        Self { tiers, lowest }
    }
}

impl fmt::Display for ResolutionLadder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tiers: Vec<String> = self
            .tiers
            .iter()
            .map(|tier| format!("{}p@{}k", tier.height, tier.min_video_kbps))
            .collect();
        write!(f, "{}", tiers.join(", "))
    }
}

#[cfg(test)]
mod ladder_tests {
    use super::*;

    #[test]
    fn full_hd_with_enough_bitrate_stays_full_hd() {
        assert_eq!(ResolutionLadder::default().choose_height(1080, 2500), 1080);
    }

    #[test]
    fn full_hd_below_floor_drops_to_720() {
        assert_eq!(ResolutionLadder::default().choose_height(1080, 900), 720);
    }

    #[test]
    fn starved_bitrate_falls_back_to_lowest_tier() {
        let choice = ResolutionLadder::default().choose(480, 50);
        assert_eq!(
            choice,
            LadderChoice {
                height: 360,
                meets_floor: false
            }
        );
    }

    #[test]
    fn never_picks_tier_above_source() {
        // 4K budget, but the source is only 720p
        assert_eq!(ResolutionLadder::default().choose_height(720, 50_000), 720);
        // Between tiers: 900p source can not use 1080
        assert_eq!(ResolutionLadder::default().choose_height(900, 50_000), 720);
    }

    #[test]
    fn exact_floor_is_accepted() {
        let choice = ResolutionLadder::default().choose(1080, 2000);
        assert_eq!(choice.height, 1080);
        assert!(choice.meets_floor);
    }

    #[test]
    fn result_is_a_tier_and_not_above_source() {
        let ladder = ResolutionLadder::default();
        let heights: Vec<u32> = ladder.tiers().iter().map(|tier| tier.height).collect();
        let lowest = *heights.last().unwrap();

        for source_height in (lowest..=4320).step_by(30) {
            for kbps in (0..=6000).step_by(50) {
                let height = ladder.choose_height(source_height, kbps);
                assert!(heights.contains(&height), "{height} is not a tier height");
                assert!(height <= source_height, "{height} > source {source_height}");
            }
        }
    }

    #[test]
    fn more_bitrate_never_lowers_height() {
        let ladder = ResolutionLadder::default();
        for source_height in [360, 480, 720, 1080, 1440, 2160] {
            let mut previous = 0;
            for kbps in (0..=5000).step_by(25) {
                let height = ladder.choose_height(source_height, kbps);
                assert!(height >= previous);
                previous = height;
            }
        }
    }

    #[test]
    fn custom_ladder_is_validated() {
        assert!(ResolutionLadder::new(vec![]).is_err());
        assert!(ResolutionLadder::new(vec![ResolutionTier::new(721, 800)]).is_err());
        assert!(ResolutionLadder::new(vec![ResolutionTier::new(0, 800)]).is_err());
        assert!(ResolutionLadder::new(vec![ResolutionTier::new(480, 400), ResolutionTier::new(720, 800)]).is_err());
        assert!(ResolutionLadder::new(vec![ResolutionTier::new(720, 800), ResolutionTier::new(720, 400)]).is_err());

        let ladder = ResolutionLadder::new(vec![ResolutionTier::new(540, 600), ResolutionTier::new(270, 150)]).unwrap();
        assert_eq!(ladder.choose_height(1080, 700), 540);
        assert_eq!(ladder.choose_height(1080, 10), 270);
        assert_eq!(ladder.lowest_floor_kbps(), 150);
    }

    #[test]
    fn display_lists_tiers() {
        assert_eq!(
            ResolutionLadder::default().to_string(),
            "1080p@2000k, 720p@800k, 480p@400k, 360p@200k"
        );
    }
}
