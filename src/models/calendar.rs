use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarView {
    Day,
    Week,
    Month,
}

impl CalendarView {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarView::Day => "day",
            CalendarView::Week => "week",
            CalendarView::Month => "month",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "day" => CalendarView::Day,
            "month" => CalendarView::Month,
            _ => CalendarView::Week,
        }
    }

    /// Inclusive date range shown around `anchor`. Weeks start on Monday.
    pub fn visible_period(&self, anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            CalendarView::Day => (anchor, anchor),
            CalendarView::Week => {
                let offset = anchor.weekday().num_days_from_monday() as i64;
                let start = anchor - Duration::days(offset);
                (start, start + Duration::days(6))
            }
            CalendarView::Month => {
                let start = anchor.with_day(1).unwrap_or(anchor);
                let next_month = if start.month() == 12 {
                    NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
                };
                let end = next_month
                    .and_then(|d| d.pred_opt())
                    .unwrap_or(start);
                (start, end)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_day_period() {
        assert_eq!(
            CalendarView::Day.visible_period(d("2024-06-01")),
            (d("2024-06-01"), d("2024-06-01"))
        );

    }

    #[test]
    fn test_week_period_starts_monday() {
        // 2024-06-01 is a Saturday
        assert_eq!(
            CalendarView::Week.visible_period(d("2024-06-01")),
            (d("2024-05-27"), d("2024-06-02"))
        );
        assert_eq!(
            CalendarView::Week.visible_period(d("2024-06-03")),
            (d("2024-06-03"), d("2024-06-09"))
        );
    }

    #[test]
    fn test_month_period() {
        assert_eq!(
            CalendarView::Month.visible_period(d("2024-02-14")),
            (d("2024-02-01"), d("2024-02-29"))
        );
        assert_eq!(
            CalendarView::Month.visible_period(d("2024-12-31")),
            (d("2024-12-01"), d("2024-12-31"))
        );
    }

    #[test]
    fn test_parse_defaults_to_week() {
        assert_eq!(CalendarView::parse("MONTH"), CalendarView::Month);
        assert_eq!(CalendarView::parse("agenda"), CalendarView::Week);
    }
}
