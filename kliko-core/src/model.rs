//! Domain data structures for addresses, calendar months, and pickup schedules.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// City and street pair a schedule is requested for.
pub struct Address {
    /// Municipality name as the portal lists it.
    pub city: String,
    /// Street name as the portal lists it.
    pub street: String,
}

impl Address {
    /// Construct a new address.
    #[must_use]
    pub fn new<C: Into<String>, S: Into<String>>(city: C, street: S) -> Self {
        Self {
            city: city.into(),
            street: street.into(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}, {}", self.street, self.city)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
/// A calendar month of a specific year.
pub struct YearMonth {
    /// Calendar year.
    pub year: i32,
    /// Month number, 1 through 12.
    pub month: u32,
}

impl YearMonth {
    /// Build a month, returning `None` when `month` is outside 1..=12.
    #[must_use]
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12)
            .contains(&month)
            .then_some(Self { year, month })
    }

    /// Month containing the given date.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The following month, rolling December over into January of the next year.
    #[must_use]
    pub fn next(self) -> Self {
        if self.month >= 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Iterator over `count` consecutive months starting with `self`.
    pub fn span(self, count: u32) -> impl Iterator<Item = YearMonth> {
        std::iter::successors(Some(self), |current| Some(current.next()))
            .take(usize::try_from(count).unwrap_or(usize::MAX))
    }

    /// Concrete date for a day of this month, `None` if the day does not exist.
    #[must_use]
    pub fn date(self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }

    /// First day of this month.
    #[must_use]
    pub fn first_day(self) -> Option<NaiveDate> {
        self.date(1)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Waste types collected on one day.
pub struct WasteDay {
    /// Date of the pickup.
    pub date: NaiveDate,
    /// Waste type labels in portal order. Duplicates are kept.
    pub waste_types: Vec<String>,
}

impl WasteDay {
    /// Human-readable title listing every waste type of the day.
    #[must_use]
    pub fn summary(&self) -> String {
        self.waste_types.join(", ")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
/// Inclusive start/end range for schedule queries.
pub struct DateRange {
    /// Start date (inclusive).
    pub start: NaiveDate,
    /// End date (inclusive).
    pub end: NaiveDate,
}

impl DateRange {
    /// Whether `date` lies within the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Complete result of one successful acquisition run.
///
/// Days are strictly ascending by date, no date appears twice and no day has
/// an empty waste type list.
pub struct ScheduleSnapshot {
    days: Vec<WasteDay>,
}

impl ScheduleSnapshot {
    /// Build a snapshot, dropping empty days and merging entries that share a date.
    ///
    /// Merged entries keep their waste types in input order.
    #[must_use]
    pub fn new(mut days: Vec<WasteDay>) -> Self {
        days.retain(|day| !day.waste_types.is_empty());
        days.sort_by_key(|day| day.date);

        let mut merged: Vec<WasteDay> = Vec::with_capacity(days.len());
        for day in days {
            match merged.last_mut() {
                Some(last) if last.date == day.date => last.waste_types.extend(day.waste_types),
                _ => merged.push(day),
            }
        }

        Self { days: merged }
    }

    /// All pickup days in ascending order.
    #[must_use]
    pub fn days(&self) -> &[WasteDay] {
        &self.days
    }

    /// Number of pickup days.
    #[must_use]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// Whether the snapshot holds no pickups at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Pickup days falling within `range`.
    pub fn events_in(&self, range: DateRange) -> impl Iterator<Item = &WasteDay> {
        self.days
            .iter()
            .skip_while(move |day| day.date < range.start)
            .take_while(move |day| day.date <= range.end)
    }

    /// First pickup on or after `from`.
    #[must_use]
    pub fn next_pickup(&self, from: NaiveDate) -> Option<&WasteDay> {
        self.days.iter().find(|day| day.date >= from)
    }
}
