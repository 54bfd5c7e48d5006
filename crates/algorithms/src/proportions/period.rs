//! Time-bucketing policies

use chrono::{Datelike, NaiveDate};
use dswe_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("Unknown")
}

/// Meteorological season, in the order they occur within a season year
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Season {
    /// March to May
    Spring,
    /// June to August
    Summer,
    /// September to November
    Autumn,
    /// December to February, tagged with the year of its December
    Winter,
}

impl Season {
    /// Season of a month and the year the season is tagged with
    pub fn of(date: NaiveDate) -> (Season, i32) {
        match date.month() {
            12 => (Season::Winter, date.year()),
            1 | 2 => (Season::Winter, date.year() - 1),
            3..=5 => (Season::Spring, date.year()),
            6..=8 => (Season::Summer, date.year()),
            _ => (Season::Autumn, date.year()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
            Season::Winter => "Winter",
        }
    }
}

/// Caller-selected bucketing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimePeriod {
    Year,
    Month,
    MonthAcrossYears,
    Season,
    /// Five-year windows aligned to multiples of five
    Semidecade,
    /// `years`-wide windows starting at `align` (earliest scene year when unset)
    Multiyear { years: u32, align: Option<i32> },
}

impl TimePeriod {
    /// Multiyear policy; `years` must be at least one
    pub fn multiyear(years: u32, align: Option<i32>) -> Result<Self> {
        if years == 0 {
            return Err(Error::InvalidParameter {
                name: "num_years",
                value: years.to_string(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(TimePeriod::Multiyear { years, align })
    }

    /// Bucket of `date`; `earliest_year` anchors multiyear windows without
    /// an explicit alignment year
    pub fn bucket(&self, date: NaiveDate, earliest_year: i32) -> Bucket {
        let year = date.year();
        match *self {
            TimePeriod::Year => Bucket::Year(year),
            TimePeriod::Month => Bucket::Month {
                year,
                month: date.month(),
            },
            TimePeriod::MonthAcrossYears => Bucket::MonthOfYear(date.month()),
            TimePeriod::Season => {
                let (season, year) = Season::of(date);
                Bucket::Season { year, season }
            }
            TimePeriod::Semidecade => {
                let start = year - year.rem_euclid(5);
                Bucket::Span {
                    start,
                    end: start + 4,
                }
            }
            TimePeriod::Multiyear { years, align } => {
                let n = years.max(1) as i32;
                let origin = align.unwrap_or(earliest_year);
                let start = origin + (year - origin).div_euclid(n) * n;
                Bucket::Span {
                    start,
                    end: start + n - 1,
                }
            }
        }
    }

    /// Output directory name under the main directory
    pub fn dir_name(&self) -> String {
        match self {
            TimePeriod::Multiyear { years, .. } => format!("proportions_multiyear_{years}"),
            other => format!("proportions_{}", other.name()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimePeriod::Year => "year",
            TimePeriod::Month => "month",
            TimePeriod::MonthAcrossYears => "month_across_years",
            TimePeriod::Season => "season",
            TimePeriod::Semidecade => "semidecade",
            TimePeriod::Multiyear { .. } => "multiyear",
        }
    }
}

/// One time window. Ordering is chronological within a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Bucket {
    Year(i32),
    Month { year: i32, month: u32 },
    MonthOfYear(u32),
    Season { year: i32, season: Season },
    Span { start: i32, end: i32 },
}

impl Bucket {
    /// Label used in output file names
    pub fn label(&self) -> String {
        match self {
            Bucket::Year(year) => year.to_string(),
            Bucket::Month { year, month } => format!("{}_{}", &month_name(*month)[..3], year),
            Bucket::MonthOfYear(month) => month_name(*month).to_string(),
            Bucket::Season { year, season } => format!("{}_{}", season.name(), year),
            Bucket::Span { start, end } => format!("{start}_{end}"),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_labels() {
        let date = d(2020, 1, 15);
        assert_eq!(TimePeriod::Year.bucket(date, 2020).label(), "2020");
        assert_eq!(TimePeriod::Month.bucket(date, 2020).label(), "Jan_2020");
        assert_eq!(TimePeriod::MonthAcrossYears.bucket(date, 2020).label(), "January");
        assert_eq!(TimePeriod::Season.bucket(date, 2020).label(), "Winter_2019");
        assert_eq!(TimePeriod::Semidecade.bucket(date, 2020).label(), "2020_2024");
    }

    #[test]
    fn test_winter_spans_new_year() {
        let p = TimePeriod::Season;
        let dec = p.bucket(d(2019, 12, 1), 2019);
        assert_eq!(dec, p.bucket(d(2020, 2, 29), 2019));
        assert_ne!(dec, p.bucket(d(2020, 12, 1), 2019));
        assert_eq!(p.bucket(d(2020, 3, 1), 2019).label(), "Spring_2020");
        assert_eq!(p.bucket(d(2020, 11, 30), 2019).label(), "Autumn_2020");
        // Autumn 2019 < Winter 2019 < Spring 2020
        assert!(p.bucket(d(2019, 10, 1), 2019) < dec);
        assert!(dec < p.bucket(d(2020, 4, 1), 2019));
    }

    #[test]
    fn test_multiyear_alignment() {
        let p = TimePeriod::multiyear(3, None).unwrap();
        assert_eq!(p.bucket(d(2016, 6, 1), 2016).label(), "2016_2018");
        assert_eq!(p.bucket(d(2019, 6, 1), 2016).label(), "2019_2021");

        let aligned = TimePeriod::multiyear(5, Some(2012)).unwrap();
        assert_eq!(aligned.bucket(d(2011, 6, 1), 2011).label(), "2007_2011");
        assert_eq!(aligned.bucket(d(2017, 6, 1), 2011).label(), "2017_2021");

        assert!(TimePeriod::multiyear(0, None).is_err());
        assert_eq!(p.dir_name(), "proportions_multiyear_3");
    }

    #[test]
    fn test_semidecade_alignment() {
        let p = TimePeriod::Semidecade;
        assert_eq!(p.bucket(d(2004, 12, 31), 2000).label(), "2000_2004");
        assert_eq!(p.bucket(d(2005, 1, 1), 2000).label(), "2005_2009");
        assert_eq!(p.dir_name(), "proportions_semidecade");
    }
}
