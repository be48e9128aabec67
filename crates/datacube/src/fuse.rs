//! Merging overlapping datasets that fall in the same time group.

use std::fmt;
use std::str::FromStr;

use ndarray::{ArrayView2, ArrayViewMut2, Zip};
use serde::{Deserialize, Serialize};

/// How a later dataset's pixel replaces an earlier one within a group.
///
/// Datasets are fused in group order; the destination starts as the first
/// dataset's pixels and each later dataset may fill in what is still empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FuseRule {
    /// Keep the first value that is not nodata (or NaN).
    #[default]
    FirstValid,
    /// Keep the first value unless the given bit is set in it. Bit-flag
    /// products such as water observations encode "no data" as a bit.
    NodataBit(u8),
}

impl FuseRule {
    /// Fill `dest` from `src` where the rule says `dest` is empty.
    pub fn fuse(&self, mut dest: ArrayViewMut2<f32>, src: ArrayView2<f32>, nodata: Option<f64>) {
        let rule = *self;
        Zip::from(&mut dest).and(&src).for_each(|d, &s| {
            if rule.is_empty(*d, nodata) {
                *d = s;
            }
        });
    }

    /// Whether a pixel counts as empty under this rule.
    pub fn is_empty(&self, value: f32, nodata: Option<f64>) -> bool {
        if !value.is_finite() {
            return true;
        }
        match self {
            FuseRule::FirstValid => nodata.is_some_and(|nd| value as f64 == nd),
            FuseRule::NodataBit(bit) => value >= 0.0 && ((value as u64) >> bit) & 1 == 1,
        }
    }
}

impl FromStr for FuseRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "first_valid" | "copy_nodata" => Ok(FuseRule::FirstValid),
            "wofls_fuser" => Ok(FuseRule::NodataBit(0)),
            other => other
                .strip_prefix("nodata_bit_")
                .and_then(|bit| bit.parse::<u8>().ok())
                .filter(|bit| *bit < 64)
                .map(FuseRule::NodataBit)
                .ok_or_else(|| format!("unknown fuse function: {}", other)),
        }
    }
}

impl TryFrom<String> for FuseRule {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FuseRule> for String {
    fn from(rule: FuseRule) -> Self {
        rule.to_string()
    }
}

impl fmt::Display for FuseRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuseRule::FirstValid => f.write_str("first_valid"),
            FuseRule::NodataBit(0) => f.write_str("wofls_fuser"),
            FuseRule::NodataBit(bit) => write!(f, "nodata_bit_{}", bit),
        }
    }
}
