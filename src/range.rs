use chrono::{Datelike, Days, Months, NaiveDate};

/// Closed interval of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        DateRange { from, to }
    }

    /// The calendar month containing `today`, first day through last day,
    /// or the month before it when `previous` is set.
    pub fn month_of(today: NaiveDate, previous: bool) -> Self {
        let mut first = today - Days::new(u64::from(today.day()) - 1);
        if previous {
            first = first - Months::new(1);
        }
        let to = first + Months::new(1) - Days::new(1);
        DateRange { from: first, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

#[cfg(test)]
fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn current_month_range() {
    let range = DateRange::month_of(day("2024-01-15"), false);
    assert_eq!(range.from, day("2024-01-01"));
    assert_eq!(range.to, day("2024-01-31"));
}

#[test]
fn previous_month_range_crosses_year() {
    let range = DateRange::month_of(day("2024-01-15"), true);
    assert_eq!(range.from, day("2023-12-01"));
    assert_eq!(range.to, day("2023-12-31"));
}

#[test]
fn leap_february() {
    let range = DateRange::month_of(day("2024-02-29"), false);
    assert_eq!(range.from, day("2024-02-01"));
    assert_eq!(range.to, day("2024-02-29"));

    let range = DateRange::month_of(day("2024-03-10"), true);
    assert_eq!(range.to, day("2024-02-29"));
}

#[test]
fn contains_is_inclusive_on_both_ends() {
    let range = DateRange::new(day("2024-01-01"), day("2024-01-31"));
    assert!(range.contains(day("2024-01-01")));
    assert!(range.contains(day("2024-01-31")));
    assert!(!range.contains(day("2023-12-31")));
    assert!(!range.contains(day("2024-02-01")));
}
