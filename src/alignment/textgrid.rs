use std::path::Path;

use textgrid::{TextGrid, Tier, TierType};

use crate::error::DatasetError;
use crate::types::AlignmentInterval;

/// Tier name used by MFA-style aligners for phone-level intervals.
const PHONE_TIER_NAME: &str = "phones";

/// Read a TextGrid's phone tier as alignment intervals, together with the
/// utterance duration (the tier's `xmax`).
///
/// Prefers the `IntervalTier` named "phones" (case-insensitive); falls back
/// to the second tier, the conventional position of phones below words.
pub fn read_phone_intervals(path: &Path) -> Result<(Vec<AlignmentInterval>, f64), DatasetError> {
    let grid = TextGrid::from_file(path).map_err(|e| DatasetError::runtime("parse TextGrid", e))?;
    let tier = select_phone_tier(&grid).ok_or_else(|| {
        DatasetError::invalid_input(format!(
            "'{}': no phone IntervalTier found",
            path.display()
        ))
    })?;

    let intervals = tier
        .intervals
        .iter()
        .map(|interval| {
            let label = interval.text.trim();
            AlignmentInterval {
                start_time: interval.xmin,
                end_time: interval.xmax,
                label: (!label.is_empty()).then(|| label.to_string()),
            }
        })
        .collect();

    Ok((intervals, tier.xmax))
}

fn select_phone_tier(grid: &TextGrid) -> Option<&Tier> {
    grid.tiers
        .iter()
        .find(|tier| {
            tier.tier_type == TierType::IntervalTier
                && tier.name.eq_ignore_ascii_case(PHONE_TIER_NAME)
        })
        .or_else(|| {
            grid.tiers
                .get(1)
                .filter(|tier| tier.tier_type == TierType::IntervalTier)
        })
}
