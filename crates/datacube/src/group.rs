//! Grouping datasets into time slices.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Dataset;

/// How datasets are bucketed into time slices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// One slice per local solar date at the dataset's longitude.
    #[default]
    SolarDay,
    /// One slice per distinct acquisition timestamp.
    Time,
}

/// Datasets sharing one time slice, in acquisition order.
#[derive(Debug, Clone)]
pub struct DatasetGroup {
    pub time: DateTime<Utc>,
    pub datasets: Vec<Dataset>,
}

/// Local solar date of an acquisition: UTC shifted by longitude / 15 hours.
pub fn solar_day(time: DateTime<Utc>, longitude: f64) -> NaiveDate {
    let offset = Duration::milliseconds((longitude / 15.0 * 3_600_000.0).round() as i64);
    (time + offset).date_naive()
}

/// Bucket datasets into ordered time slices.
///
/// Solar-day groups are stamped with midnight UTC of the solar date.
/// Members of each group are sorted by acquisition time, so fusers see the
/// earliest dataset first.
pub fn group_datasets(datasets: Vec<Dataset>, group_by: GroupBy) -> Vec<DatasetGroup> {
    let mut groups: BTreeMap<DateTime<Utc>, Vec<Dataset>> = BTreeMap::new();

    for dataset in datasets {
        let key = match group_by {
            GroupBy::Time => dataset.time,
            GroupBy::SolarDay => {
                let date = solar_day(dataset.time, dataset.center_longitude());
                Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
            }
        };
        groups.entry(key).or_default().push(dataset);
    }

    groups
        .into_iter()
        .map(|(time, mut datasets)| {
            datasets.sort_by_key(|d| d.time);
            DatasetGroup { time, datasets }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use drill_common::{Affine, CrsCode, GeoBox};

    fn dataset_at(time: DateTime<Utc>, lon: f64) -> Dataset {
        let grid = GeoBox::new(
            CrsCode::Epsg4326,
            Affine::new(lon - 0.5, -30.0, 0.1, -0.1),
            10,
            10,
        );
        Dataset::new("test", time, grid)
    }

    #[test]
    fn test_solar_day_offset() {
        // 20:00 UTC at 150E is 06:00 the next day locally.
        let t = Utc.with_ymd_and_hms(2019, 3, 5, 20, 0, 0).unwrap();
        assert_eq!(solar_day(t, 150.0), NaiveDate::from_ymd_opt(2019, 3, 6).unwrap());
        assert_eq!(solar_day(t, 0.0), NaiveDate::from_ymd_opt(2019, 3, 5).unwrap());
        assert_eq!(solar_day(t, -150.0), NaiveDate::from_ymd_opt(2019, 3, 5).unwrap());
    }

    #[test]
    fn test_adjacent_scenes_share_a_solar_day() {
        // Two passes of the same orbit either side of UTC midnight.
        let a = dataset_at(Utc.with_ymd_and_hms(2019, 3, 5, 23, 59, 0).unwrap(), 145.0);
        let b = dataset_at(Utc.with_ymd_and_hms(2019, 3, 6, 0, 1, 0).unwrap(), 145.4);
        let c = dataset_at(Utc.with_ymd_and_hms(2019, 3, 21, 0, 0, 0).unwrap(), 145.0);

        let groups = group_datasets(vec![c, b, a], GroupBy::SolarDay);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].datasets.len(), 2);
        assert_eq!(groups[0].time, Utc.with_ymd_and_hms(2019, 3, 6, 0, 0, 0).unwrap());
        assert!(groups[0].datasets[0].time < groups[0].datasets[1].time);
    }

    #[test]
    fn test_group_by_time() {
        let t = Utc.with_ymd_and_hms(2019, 3, 5, 23, 59, 0).unwrap();
        let groups = group_datasets(
            vec![dataset_at(t, 145.0), dataset_at(t + Duration::seconds(1), 145.0)],
            GroupBy::Time,
        );
        assert_eq!(groups.len(), 2);
    }
}
