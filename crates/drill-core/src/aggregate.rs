//! Temporal aggregation into variable-width day windows.
//!
//! Windows are built by scanning the time axis once: a window starts at the
//! first unconsumed timestep and takes every following timestep less than
//! `window_days` whole days after it. Each window collapses to one timestep
//! stamped with its first member's time.
//!
//! Within a window, bands accumulate "first valid value wins": a pixel keeps
//! its running value once that value is valid and otherwise takes the next
//! timestep's value, valid or not. A configured presence band (a 0/1 band
//! such as observed open water) makes every other band's pixel count as held
//! wherever water was already seen, and is itself held wherever the
//! reference band already has a valid value. One-day windows average the
//! valid values instead, and OR the presence band.

use std::ops::Range;

use chrono::{DateTime, Utc};
use datacube::{Band, CubeResult, RasterCube, NODATA_EPSILON};
use ndarray::{Array2, Array3, Axis, Zip};
use tracing::debug;

/// Consecutive runs of `times` spanning less than `days` whole days each.
///
/// Every index lands in exactly one window, in order; a short trailing run
/// still forms a window.
///
/// # Example
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use drill_core::aggregate::windows;
///
/// let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
/// let times = [t0, t0 + Duration::days(1), t0 + Duration::days(5)];
/// assert_eq!(windows(&times, 3), vec![0..2, 2..3]);
/// ```
pub fn windows(times: &[DateTime<Utc>], days: i64) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = 0;
    while start < times.len() {
        let mut end = start + 1;
        while end < times.len() && (times[end] - times[start]).num_days() < days {
            end += 1;
        }
        out.push(start..end);
        start = end;
    }
    out
}

/// Which bands get special treatment while accumulating.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationRules {
    /// 0/1 band accumulated by OR; holds every other band where set.
    pub presence_band: Option<String>,
    /// Band whose validity holds the presence band.
    pub reference_band: Option<String>,
    /// Distance from the nodata sentinel below which a value is invalid.
    pub epsilon: f64,
}

impl Default for AggregationRules {
    fn default() -> Self {
        Self {
            presence_band: None,
            reference_band: None,
            epsilon: NODATA_EPSILON,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalAggregator {
    pub window_days: i64,
    pub rules: AggregationRules,
}

impl TemporalAggregator {
    pub fn new(window_days: i64) -> Self {
        Self {
            window_days,
            rules: AggregationRules::default(),
        }
    }

    pub fn with_presence(mut self, presence_band: &str, reference_band: &str) -> Self {
        self.rules.presence_band = Some(presence_band.to_string());
        self.rules.reference_band = Some(reference_band.to_string());
        self
    }

    /// Collapse `cube` into one timestep per window. A non-positive window
    /// returns the cube unchanged.
    pub fn aggregate(&self, cube: RasterCube) -> CubeResult<RasterCube> {
        if self.window_days <= 0 || cube.is_empty() {
            return Ok(cube);
        }
        for name in [&self.rules.presence_band, &self.rules.reference_band]
            .into_iter()
            .flatten()
        {
            cube.band(name)?;
        }

        let windows = windows(cube.times(), self.window_days);
        debug!(
            timesteps = cube.len_time(),
            windows = windows.len(),
            days = self.window_days,
            "Aggregating over time"
        );
        if windows.len() == cube.len_time() {
            return Ok(cube);
        }

        let (_, rows, cols) = cube.shape();
        let names: Vec<String> = cube.band_names().map(str::to_string).collect();
        let mut stacks: Vec<Array3<f32>> = names
            .iter()
            .map(|name| {
                let fill = cube.band(name).map(Band::fill_value).unwrap_or(f32::NAN);
                Array3::from_elem((windows.len(), rows, cols), fill)
            })
            .collect();

        for (w, range) in windows.iter().enumerate() {
            let collapsed = if self.window_days == 1 {
                self.mean_window(&cube, &names, range.clone())?
            } else {
                self.first_valid_window(&cube, &names, range.clone())?
            };
            for (stack, slice) in stacks.iter_mut().zip(collapsed) {
                stack.index_axis_mut(Axis(0), w).assign(&slice);
            }
        }

        let times = windows.iter().map(|w| cube.times()[w.start]).collect();
        let mut out = RasterCube::new(times, *cube.geobox());
        for (name, data) in names.iter().zip(stacks) {
            let band = cube.band(name)?;
            out.insert_band(
                name.clone(),
                Band {
                    data,
                    dtype: band.dtype,
                    nodata: band.nodata,
                    units: band.units.clone(),
                    flags: band.flags.clone(),
                },
            )?;
        }
        Ok(out)
    }

    fn valid(&self, value: f32, nodata: Option<f64>) -> bool {
        if value.is_nan() {
            return false;
        }
        match nodata {
            Some(nd) if !nd.is_nan() => (value as f64 - nd).abs() >= self.rules.epsilon,
            _ => true,
        }
    }

    fn is_presence(&self, name: &str) -> bool {
        self.rules.presence_band.as_deref() == Some(name)
    }

    fn first_valid_window(
        &self,
        cube: &RasterCube,
        names: &[String],
        range: Range<usize>,
    ) -> CubeResult<Vec<Array2<f32>>> {
        let bands = names
            .iter()
            .map(|name| cube.band(name))
            .collect::<CubeResult<Vec<_>>>()?;
        let mut acc: Vec<Array2<f32>> = bands.iter().map(|b| b.slice(range.start).to_owned()).collect();

        let position = |wanted: &Option<String>| {
            wanted
                .as_ref()
                .and_then(|w| names.iter().position(|n| n == w))
        };
        let presence = position(&self.rules.presence_band);
        let reference = position(&self.rules.reference_band);

        for t in range.start + 1..range.end {
            // Held state is taken before any band of this step is updated.
            let seen = presence.map(|p| acc[p].mapv(|v| v > 0.0));
            let reference_valid = reference.map(|r| {
                let nodata = bands[r].nodata;
                acc[r].mapv(|v| self.valid(v, nodata))
            });

            let held: Vec<Array2<bool>> = acc
                .iter()
                .enumerate()
                .map(|(i, current)| {
                    let mut held = if Some(i) == presence {
                        match &reference_valid {
                            Some(valid) => valid.clone(),
                            None => current.mapv(|v| v > 0.0),
                        }
                    } else {
                        let nodata = bands[i].nodata;
                        current.mapv(|v| self.valid(v, nodata))
                    };
                    if let Some(seen) = &seen {
                        Zip::from(&mut held).and(seen).for_each(|h, &s| *h |= s);
                    }
                    held
                })
                .collect();

            for ((current, band), held) in acc.iter_mut().zip(&bands).zip(&held) {
                Zip::from(current)
                    .and(band.slice(t))
                    .and(held)
                    .for_each(|c, &next, &keep| {
                        if !keep {
                            *c = next;
                        }
                    });
            }
        }
        Ok(acc)
    }

    fn mean_window(
        &self,
        cube: &RasterCube,
        names: &[String],
        range: Range<usize>,
    ) -> CubeResult<Vec<Array2<f32>>> {
        let (_, rows, cols) = cube.shape();
        names
            .iter()
            .map(|name| {
                let band = cube.band(name)?;
                let members = band.data.slice(ndarray::s![range.clone(), .., ..]);

                if self.is_presence(name) {
                    let mut out = Array2::zeros((rows, cols));
                    Zip::from(&mut out)
                        .and(members.lanes(Axis(0)))
                        .for_each(|o, lane| {
                            *o = if lane.iter().any(|&v| v > 0.0) { 1.0 } else { 0.0 };
                        });
                    return Ok(out);
                }

                let fill = band.fill_value();
                let mut out = Array2::from_elem((rows, cols), fill);
                Zip::from(&mut out)
                    .and(members.lanes(Axis(0)))
                    .for_each(|o, lane| {
                        let (sum, count) = lane
                            .iter()
                            .filter(|&&v| self.valid(v, band.nodata))
                            .fold((0.0f64, 0usize), |(s, c), &v| (s + v as f64, c + 1));
                        if count > 0 {
                            *o = (sum / count as f64) as f32;
                        }
                    });
                Ok(out)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datacube::{CubeError, DType};
    use drill_common::{Affine, CrsCode, GeoBox};
    use ndarray::Array3;
    use test_utils::{days_from, utc};

    fn geobox(width: usize) -> GeoBox {
        GeoBox::new(CrsCode::Epsg3577, Affine::new(0.0, 1.0, 1.0, -1.0), width, 1)
    }

    /// One-row cube; `values[t]` is the row at timestep t.
    fn cube(offsets: &[i64], bands: &[(&str, Option<f64>, Vec<Vec<f32>>)]) -> RasterCube {
        let times = days_from(utc(2020, 1, 1), offsets);
        let width = bands[0].2[0].len();
        let mut cube = RasterCube::new(times, geobox(width));
        for (name, nodata, rows) in bands {
            let flat: Vec<f32> = rows.iter().flatten().copied().collect();
            let data = Array3::from_shape_vec((rows.len(), 1, width), flat).unwrap();
            cube.insert_band(*name, Band::new(data, DType::Float32, *nodata)).unwrap();
        }
        cube
    }

    fn row(cube: &RasterCube, band: &str, t: usize) -> Vec<f32> {
        cube.band(band).unwrap().slice(t).iter().copied().collect()
    }

    #[test]
    fn test_window_boundaries() {
        let times = days_from(utc(2020, 1, 1), &[0, 1, 5]);
        assert_eq!(windows(&times, 3), vec![0..2, 2..3]);
        assert_eq!(windows(&times, 10), vec![0..3]);
        assert_eq!(windows(&times, 1), vec![0..1, 1..2, 2..3]);
        assert!(windows(&[], 3).is_empty());

        // A window is measured from its first member, not chained.
        let times = days_from(utc(2020, 1, 1), &[0, 2, 4, 6]);
        assert_eq!(windows(&times, 3), vec![0..2, 2..4]);
    }

    #[test]
    fn test_non_positive_window_is_identity() {
        let original = cube(&[0, 1, 5], &[("TCW", Some(-999.0), vec![vec![1.0], vec![2.0], vec![3.0]])]);
        for days in [0, -4] {
            let out = TemporalAggregator::new(days).aggregate(original.clone()).unwrap();
            assert_eq!(out, original);
        }
    }

    #[test]
    fn test_first_valid_wins() {
        let original = cube(
            &[0, 1, 2, 5],
            &[(
                "TCW",
                Some(-999.0),
                vec![
                    vec![-999.0, 10.0, -999.0, f32::NAN],
                    vec![20.0, 30.0, -999.0, 7.0],
                    vec![40.0, 50.0, 60.0, 8.0],
                    vec![1.0, 2.0, 3.0, 4.0],
                ],
            )],
        );
        let out = TemporalAggregator::new(3).aggregate(original).unwrap();

        assert_eq!(out.times(), &[utc(2020, 1, 1), utc(2020, 1, 6)]);
        assert_eq!(row(&out, "TCW", 0), vec![20.0, 10.0, 60.0, 7.0]);
        assert_eq!(row(&out, "TCW", 1), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out.band("TCW").unwrap().nodata, Some(-999.0));
    }

    #[test]
    fn test_invalid_stays_until_valid_arrives() {
        let original = cube(
            &[0, 1],
            &[("TCW", Some(-999.0), vec![vec![-999.0, -999.0], vec![f32::NAN, 5.0]])],
        );
        let out = TemporalAggregator::new(3).aggregate(original).unwrap();
        let values = row(&out, "TCW", 0);
        assert!(values[0].is_nan());
        assert_eq!(values[1], 5.0);
    }

    #[test]
    fn test_presence_band_holds_pixels() {
        // pixel 0: water seen first, later dry observation must not replace it
        // pixel 1: dry observation first, later water ignored
        // pixel 2: nothing valid first, water arrives second
        let original = cube(
            &[0, 1],
            &[
                ("water", None, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 1.0]]),
                ("TCW", Some(-999.0), vec![vec![-999.0, -100.0, -999.0], vec![-200.0, -999.0, -999.0]]),
                ("bs", Some(-1.0), vec![vec![-1.0, 30.0, -1.0], vec![40.0, -1.0, -1.0]]),
            ],
        );
        let out = TemporalAggregator::new(2)
            .with_presence("water", "TCW")
            .aggregate(original)
            .unwrap();

        assert_eq!(out.len_time(), 1);
        assert_eq!(row(&out, "water", 0), vec![1.0, 0.0, 1.0]);
        assert_eq!(row(&out, "TCW", 0), vec![-999.0, -100.0, -999.0]);
        assert_eq!(row(&out, "bs", 0), vec![-1.0, 30.0, -1.0]);
    }

    #[test]
    fn test_daily_window_averages() {
        let original = cube(
            &[0, 0, 1],
            &[
                ("water", None, vec![vec![0.0, 1.0], vec![0.0, 0.0], vec![1.0, 1.0]]),
                ("TCW", Some(-999.0), vec![vec![10.0, -999.0], vec![20.0, -999.0], vec![5.0, 6.0]]),
            ],
        );
        let out = TemporalAggregator::new(1)
            .with_presence("water", "TCW")
            .aggregate(original)
            .unwrap();

        assert_eq!(out.len_time(), 2);
        assert_eq!(row(&out, "TCW", 0), vec![15.0, -999.0]);
        assert_eq!(row(&out, "water", 0), vec![0.0, 1.0]);
        assert_eq!(row(&out, "TCW", 1), vec![5.0, 6.0]);
    }

    #[test]
    fn test_missing_presence_band() {
        let original = cube(&[0, 1], &[("TCW", Some(-999.0), vec![vec![1.0], vec![2.0]])]);
        let result = TemporalAggregator::new(3)
            .with_presence("water", "TCW")
            .aggregate(original);
        assert!(matches!(result, Err(CubeError::BandNotFound(_))));
    }
}
