//! Balance-sheet buckets and the sequence-code range table.
//!
//! Every inflow/outflow category occupies one stable position inside a
//! `0..=4999` numeric taxonomy split into four disjoint ranges, one per
//! bucket. The table below is the single source of truth: classification,
//! allocation and the report asset/liability cut all derive from it.

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// One of the four balance-sheet classifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    AssetCurrent,
    AssetFixed,
    LiabilityCurrent,
    LiabilityLongterm,
}

/// Inclusive sequence-code range owned by a bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BucketRange {
    pub bucket: Bucket,
    pub min: i32,
    pub max: i32,
}

/// Canonical range table, ordered by `min` and covering `0..=4999` with no
/// gaps or overlaps.
pub const BUCKET_RANGES: [BucketRange; 4] = [
    BucketRange {
        bucket: Bucket::AssetCurrent,
        min: 0,
        max: 2599,
    },
    BucketRange {
        bucket: Bucket::AssetFixed,
        min: 2600,
        max: 3599,
    },
    BucketRange {
        bucket: Bucket::LiabilityCurrent,
        min: 3600,
        max: 4499,
    },
    BucketRange {
        bucket: Bucket::LiabilityLongterm,
        min: 4500,
        max: 4999,
    },
];

impl Bucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AssetCurrent => "asset_current",
            Self::AssetFixed => "asset_fixed",
            Self::LiabilityCurrent => "liability_current",
            Self::LiabilityLongterm => "liability_longterm",
        }
    }

    pub fn is_asset(self) -> bool {
        matches!(self, Self::AssetCurrent | Self::AssetFixed)
    }

    /// The sequence-code range this bucket owns.
    pub fn range(self) -> BucketRange {
        // The table is total over the enum, so the lookup cannot miss.
        BUCKET_RANGES
            .iter()
            .copied()
            .find(|range| range.bucket == self)
            .unwrap_or(BUCKET_RANGES[0])
    }
}

impl TryFrom<&str> for Bucket {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "asset_current" => Ok(Self::AssetCurrent),
            "asset_fixed" => Ok(Self::AssetFixed),
            "liability_current" => Ok(Self::LiabilityCurrent),
            "liability_longterm" => Ok(Self::LiabilityLongterm),
            other => Err(EngineError::Validation(format!("invalid bucket: {other}"))),
        }
    }
}

/// Classify a sequence code via the range table. `None` for codes outside
/// `0..=4999`.
pub fn classify_code(code: i32) -> Option<Bucket> {
    BUCKET_RANGES
        .iter()
        .find(|range| code >= range.min && code <= range.max)
        .map(|range| range.bucket)
}

/// Resolve the bucket of a category: an explicit subgroup wins, otherwise the
/// sequence code decides. `None` when neither is available.
pub fn classify(subgroup: Option<Bucket>, sequence_code: Option<i32>) -> Option<Bucket> {
    subgroup.or_else(|| sequence_code.and_then(classify_code))
}
