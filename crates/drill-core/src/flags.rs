//! Classification of packed bit-flag pixels.
//!
//! A [`FlagDecoder`] pairs a band's flag table with an ordered rule list.
//! Rules are compiled once into bitsets over the flag names, so classifying
//! a pixel is a handful of integer operations. Bands stored in one or two
//! bytes are classified through a lookup table covering every possible
//! value.

use datacube::{Band, FlagsDefinition};
use ndarray::{Array3, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Category assigned when no rule matches.
pub const NOT_OBSERVABLE: &str = "not observable";

/// How a rule combines its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combine {
    /// Every listed flag must be set.
    All,
    /// At least one listed flag must be set.
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagRule {
    pub combine: Combine,
    #[serde(rename = "flags")]
    pub required_flags: Vec<String>,
    pub category: String,
}

impl FlagRule {
    pub fn all(flags: &[&str], category: &str) -> Self {
        Self::build(Combine::All, flags, category)
    }

    pub fn any(flags: &[&str], category: &str) -> Self {
        Self::build(Combine::Any, flags, category)
    }

    fn build(combine: Combine, flags: &[&str], category: &str) -> Self {
        Self {
            combine,
            required_flags: flags.iter().map(|f| f.to_string()).collect(),
            category: category.to_string(),
        }
    }
}

/// The water observation rules, highest priority first.
pub fn wofs_rules() -> Vec<FlagRule> {
    vec![
        FlagRule::any(
            &["terrain_or_low_angle", "cloud_shadow", "cloud", "high_slope", "noncontiguous"],
            NOT_OBSERVABLE,
        ),
        FlagRule::all(&["dry", "sea"], NOT_OBSERVABLE),
        FlagRule::any(&["dry"], "dry"),
        FlagRule::any(&["wet", "sea"], "wet"),
    ]
}

/// Per-pixel categories as indices into `categories`.
#[derive(Debug, Clone, PartialEq)]
pub struct Categorized {
    pub categories: Vec<String>,
    pub codes: Array3<u8>,
}

impl Categorized {
    pub fn category_at(&self, t: usize, row: usize, col: usize) -> &str {
        &self.categories[self.codes[[t, row, col]] as usize]
    }

    /// Category of every pixel of timestep `t`, row-major.
    pub fn labels(&self, t: usize) -> Vec<&str> {
        self.codes
            .index_axis(ndarray::Axis(0), t)
            .iter()
            .map(|&code| self.categories[code as usize].as_str())
            .collect()
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    combine: Combine,
    required: u64,
    code: u8,
}

/// Flag table plus ordered rules, compiled for fast classification.
#[derive(Debug, Clone)]
pub struct FlagDecoder {
    flags: FlagsDefinition,
    names: Vec<String>,
    rules: Vec<CompiledRule>,
    categories: Vec<String>,
    default_code: u8,
}

impl FlagDecoder {
    /// Compile `rules` against `flags`. Every rule flag must exist in the
    /// table; at most 64 flags and 256 categories are supported.
    pub fn new(flags: FlagsDefinition, rules: &[FlagRule], default_category: &str) -> CoreResult<Self> {
        let names: Vec<String> = flags.names().map(str::to_string).collect();
        if names.len() > 64 {
            return Err(CoreError::Config(format!(
                "flag table has {} flags, at most 64 supported",
                names.len()
            )));
        }

        let mut categories = vec![default_category.to_string()];
        let mut code_for = |category: &str| -> CoreResult<u8> {
            if let Some(i) = categories.iter().position(|c| c == category) {
                return Ok(i as u8);
            }
            if categories.len() == 256 {
                return Err(CoreError::Config("more than 256 categories".to_string()));
            }
            categories.push(category.to_string());
            Ok((categories.len() - 1) as u8)
        };

        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let mut required = 0u64;
            for flag in &rule.required_flags {
                let bit = names
                    .iter()
                    .position(|n| n == flag)
                    .ok_or_else(|| CoreError::Config(format!("rule uses unknown flag '{}'", flag)))?;
                required |= 1 << bit;
            }
            compiled.push(CompiledRule {
                combine: rule.combine,
                required,
                code: code_for(&rule.category)?,
            });
        }

        Ok(Self {
            flags,
            names,
            rules: compiled,
            categories,
            default_code: 0,
        })
    }

    /// Decoder for WOfS water observations.
    pub fn wofs(flags: FlagsDefinition) -> CoreResult<Self> {
        Self::new(flags, &wofs_rules(), NOT_OBSERVABLE)
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Bitset of the active flags in `value`, indexed like the flag table.
    fn active(&self, value: u64) -> u64 {
        self.names
            .iter()
            .enumerate()
            .filter(|(_, name)| self.flags.get(name).is_some_and(|def| def.is_set(value)))
            .fold(0, |set, (i, _)| set | (1 << i))
    }

    fn classify_code(&self, value: u64) -> u8 {
        let active = self.active(value);
        self.rules
            .iter()
            .find(|rule| match rule.combine {
                Combine::All => active & rule.required == rule.required,
                Combine::Any => active & rule.required != 0,
            })
            .map_or(self.default_code, |rule| rule.code)
    }

    /// Category of one packed value.
    pub fn classify(&self, value: u64) -> &str {
        &self.categories[self.classify_code(value) as usize]
    }

    /// Classify every pixel of `band`. Nodata, negative and non-integral
    /// values get the default category.
    pub fn decode(&self, band: &Band) -> Categorized {
        let nodata = band.nodata;
        let lookup: Option<Vec<u8>> = (band.dtype.is_integer() && band.dtype.itemsize() <= 2)
            .then(|| {
                let size = 1usize << (8 * band.dtype.itemsize());
                (0..size as u64).map(|v| self.classify_code(v)).collect()
            });

        let mut codes = Array3::from_elem(band.data.raw_dim(), self.default_code);
        Zip::from(&mut codes).and(&band.data).par_for_each(|code, &value| {
            if !datacube::is_valid(value, nodata) || value < 0.0 || value.fract() != 0.0 {
                return;
            }
            *code = match &lookup {
                Some(table) => table.get(value as usize).copied().unwrap_or(self.default_code),
                None => self.classify_code(value as u64),
            };
        });

        Categorized {
            categories: self.categories.clone(),
            codes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datacube::DType;
    use test_utils::{wofs, wofs_flags};

    fn band(values: &[f32]) -> Band {
        let data = Array3::from_shape_vec((1, 1, values.len()), values.to_vec()).unwrap();
        Band::new(data, DType::Int16, Some(1.0)).with_flags(wofs_flags())
    }

    #[test]
    fn test_wofs_classification() {
        let decoder = FlagDecoder::wofs(wofs_flags()).unwrap();
        assert_eq!(decoder.classify(wofs::DRY as u64), "dry");
        assert_eq!(decoder.classify(wofs::WET as u64), "wet");
        assert_eq!(decoder.classify(wofs::WET_SEA as u64), "wet");
        assert_eq!(decoder.classify(wofs::CLOUD as u64), NOT_OBSERVABLE);
        assert_eq!(decoder.classify((wofs::WET + wofs::TERRAIN) as u64), NOT_OBSERVABLE);
    }

    #[test]
    fn test_rule_order_decides() {
        let decoder = FlagDecoder::wofs(wofs_flags()).unwrap();
        // dry and sea are both set for a clear sea pixel
        assert_eq!(decoder.classify(wofs::SEA as u64), NOT_OBSERVABLE);

        let reordered = vec![
            FlagRule::any(&["dry"], "dry"),
            FlagRule::all(&["dry", "sea"], NOT_OBSERVABLE),
        ];
        let decoder = FlagDecoder::new(wofs_flags(), &reordered, NOT_OBSERVABLE).unwrap();
        assert_eq!(decoder.classify(wofs::SEA as u64), "dry");
    }

    #[test]
    fn test_decode_is_repeatable() {
        let decoder = FlagDecoder::wofs(wofs_flags()).unwrap();
        let band = band(&[wofs::WET, wofs::DRY, wofs::NODATA, wofs::SEA, -3.0, 2.5, 130.0]);

        let first = decoder.decode(&band);
        let second = decoder.decode(&band);
        assert_eq!(first, second);
        assert_eq!(
            first.labels(0),
            vec!["wet", "dry", NOT_OBSERVABLE, NOT_OBSERVABLE, NOT_OBSERVABLE, NOT_OBSERVABLE, NOT_OBSERVABLE]
        );
        assert_eq!(first.category_at(0, 0, 0), "wet");
    }

    #[test]
    fn test_lookup_matches_direct() {
        let decoder = FlagDecoder::wofs(wofs_flags()).unwrap();
        let values: Vec<f32> = (0..=255).map(|v| v as f32).collect();
        let mut wide = band(&values);
        wide.dtype = DType::Int32;
        wide.nodata = None;
        let mut narrow = wide.clone();
        narrow.dtype = DType::UInt8;
        assert_eq!(decoder.decode(&wide), decoder.decode(&narrow));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let rules = vec![FlagRule::any(&["snow"], "snow")];
        assert!(matches!(
            FlagDecoder::new(wofs_flags(), &rules, NOT_OBSERVABLE),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn test_rules_from_yaml() {
        let yaml = r#"
- combine: any
  flags: [cloud, cloud_shadow]
  category: cloudy
- combine: all
  flags: [wet]
  category: wet
"#;
        let rules: Vec<FlagRule> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rules[0], FlagRule::any(&["cloud", "cloud_shadow"], "cloudy"));
        let decoder = FlagDecoder::new(wofs_flags(), &rules, "other").unwrap();
        assert_eq!(decoder.classify(wofs::CLOUD_SHADOW as u64), "cloudy");
        assert_eq!(decoder.classify(wofs::DRY as u64), "other");
        assert_eq!(decoder.categories(), &["other", "cloudy", "wet"]);
    }
}
