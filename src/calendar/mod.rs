use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;

use crate::clean::dates::{parse_date_cell, quarter_of};
use crate::table::{Cell, Table};

/// One source column's worth of date-bearing values, tagged with the role
/// name the dates should bridge back to.
#[derive(Debug, Clone)]
pub struct DateSeries {
    pub role: String,
    pub values: Vec<Cell>,
}

impl DateSeries {
    pub fn new(role: impl Into<String>, values: Vec<Cell>) -> Self {
        DateSeries {
            role: role.into(),
            values,
        }
    }
}

#[derive(Debug)]
pub struct CalendarOutput {
    pub dim_dates: Table,
    pub date_role_bridge: Table,
}

fn dim_dates_columns() -> Vec<String> {
    [
        "Date",
        "Year",
        "Month",
        "MonthName",
        "MonthYear",
        "MonthYearSort",
        "Quarter",
        "Week",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Build the contiguous daily calendar dimension spanning every valid date
/// across all roles, plus the bridge of observed (date, role) pairs. With
/// nothing parseable, both tables come back empty.
pub fn build_calendar(series: &[DateSeries]) -> CalendarOutput {
    let mut min_date: Option<NaiveDate> = None;
    let mut max_date: Option<NaiveDate> = None;

    let mut bridge = Table::new(
        "date_role_bridge",
        vec!["Date".to_string(), "Role".to_string()],
    );
    let mut seen: HashSet<(NaiveDate, String)> = HashSet::new();

    for s in series {
        for value in &s.values {
            let Some(date) = parse_date_cell(value) else {
                continue;
            };
            min_date = Some(min_date.map_or(date, |d| d.min(date)));
            max_date = Some(max_date.map_or(date, |d| d.max(date)));
            if seen.insert((date, s.role.clone())) {
                bridge.push_row(vec![Cell::Date(date), Cell::Text(s.role.clone())]);
            }
        }
    }

    let mut dim_dates = Table::new("dim_dates", dim_dates_columns());
    let (Some(min), Some(max)) = (min_date, max_date) else {
        return CalendarOutput {
            dim_dates,
            date_role_bridge: bridge,
        };
    };

    for date in min.iter_days().take_while(|d| *d <= max) {
        dim_dates.push_row(vec![
            Cell::Date(date),
            Cell::Int(date.year() as i64),
            Cell::Int(date.month() as i64),
            Cell::Text(date.format("%b").to_string()),
            Cell::Text(date.format("%b %Y").to_string()),
            Cell::Int(date.year() as i64 * 12 + date.month() as i64),
            Cell::Text(format!("Q{}", quarter_of(date))),
            Cell::Int(date.iso_week().week() as i64),
        ]);
    }

    tracing::info!(
        days = dim_dates.n_rows(),
        bridge_rows = bridge.n_rows(),
        roles = series.len(),
        "built calendar dimension"
    );

    CalendarOutput {
        dim_dates,
        date_role_bridge: bridge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| Cell::from_raw(v)).collect()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn calendar_is_contiguous_across_roles() {
        let series = vec![
            DateSeries::new("Approved Date", texts(&["2024-01-05", "2024-01-10", "junk"])),
            DateSeries::new("PSW Date", texts(&["2024-01-08", ""])),
        ];
        let output = build_calendar(&series);
        let dim = &output.dim_dates;

        // inclusive range 2024-01-05..=2024-01-10
        assert_eq!(dim.n_rows(), 6);
        let date_idx = dim.col("Date").unwrap();
        for (offset, row) in dim.rows.iter().enumerate() {
            assert_eq!(row[date_idx].as_date(), Some(d(2024, 1, 5 + offset as u32)));
        }
    }

    #[test]
    fn derived_fields_for_one_day() {
        let series = vec![DateSeries::new("Approved Date", texts(&["2024-04-01"]))];
        let output = build_calendar(&series);
        let dim = &output.dim_dates;
        assert_eq!(dim.n_rows(), 1);
        let get = |col: &str| dim.cell(0, dim.col(col).unwrap()).clone();
        assert_eq!(get("Year"), Cell::Int(2024));
        assert_eq!(get("Month"), Cell::Int(4));
        assert_eq!(get("MonthName"), Cell::Text("Apr".into()));
        assert_eq!(get("MonthYear"), Cell::Text("Apr 2024".into()));
        assert_eq!(get("MonthYearSort"), Cell::Int(2024 * 12 + 4));
        assert_eq!(get("Quarter"), Cell::Text("Q2".into()));
        assert_eq!(get("Week"), Cell::Int(14));
    }

    #[test]
    fn bridge_deduplicates_per_role_not_globally() {
        let series = vec![
            DateSeries::new("Approved Date", texts(&["2024-01-05", "2024-01-05"])),
            DateSeries::new("PSW Date", texts(&["2024-01-05"])),
        ];
        let output = build_calendar(&series);
        let bridge = &output.date_role_bridge;

        // the same date appears once per role
        assert_eq!(bridge.n_rows(), 2);
        let role_idx = bridge.col("Role").unwrap();
        assert_eq!(bridge.cell(0, role_idx), &Cell::Text("Approved Date".into()));
        assert_eq!(bridge.cell(1, role_idx), &Cell::Text("PSW Date".into()));
    }

    #[test]
    fn bridge_only_holds_observed_dates() {
        let series = vec![DateSeries::new(
            "Approved Date",
            texts(&["2024-01-05", "2024-01-10"]),
        )];
        let output = build_calendar(&series);
        // calendar padded to 6 days, bridge keeps the 2 observed
        assert_eq!(output.dim_dates.n_rows(), 6);
        assert_eq!(output.date_role_bridge.n_rows(), 2);
    }

    #[test]
    fn no_parseable_input_yields_empty_tables() {
        let series = vec![DateSeries::new("Approved Date", texts(&["junk", ""]))];
        let output = build_calendar(&series);
        assert_eq!(output.dim_dates.n_rows(), 0);
        assert_eq!(output.date_role_bridge.n_rows(), 0);
        assert!(build_calendar(&[]).dim_dates.is_empty());
    }
}
