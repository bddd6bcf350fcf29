use crate::models::{DailyPoint, FeedbackItem, RatingTrends, StatsResponse, TrendPoint};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const TOP_ATTENTION: usize = 3;
const WINDOW_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn build_stats(items: &[FeedbackItem]) -> StatsResponse {
    build_stats_at(Utc::now().naive_utc(), items)
}

pub fn build_stats_at(now: NaiveDateTime, items: &[FeedbackItem]) -> StatsResponse {
    let stamped: Vec<(NaiveDateTime, &FeedbackItem)> = items
        .iter()
        .filter_map(|item| match parse_timestamp(&item.created_at) {
            Some(created_at) => Some((created_at, item)),
            None => {
                debug!(id = item.id, created_at = %item.created_at, "skipping unparseable timestamp");
                None
            }
        })
        .collect();

    let mut status_counts = BTreeMap::new();
    let mut category_counts = BTreeMap::new();
    for item in items {
        *status_counts.entry(item.status).or_insert(0) += 1;
        // a category repeated on one item counts once for that item
        let categories: BTreeSet<&String> = item.categories.iter().collect();
        for category in categories {
            *category_counts.entry(category.clone()).or_insert(0) += 1;
        }
    }

    StatsResponse {
        total: items.len() as u64,
        average_rating: average(items.iter()),
        status_counts,
        category_counts,
        daily_trend: daily_trend(now.date(), &stamped),
        rating_trends: RatingTrends {
            hours: rating_trend(Granularity::Hour, now, &stamped),
            days: rating_trend(Granularity::Day, now, &stamped),
            weeks: rating_trend(Granularity::Week, now, &stamped),
            months: rating_trend(Granularity::Month, now, &stamped),
        },
        top_attention: top_attention(items),
    }
}

/// Accepts both `T` and space separated ISO-8601, with optional fraction.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

fn average<'a>(items: impl Iterator<Item = &'a FeedbackItem>) -> Option<f64> {
    let (sum, count) = items.fold((0u64, 0u64), |(sum, count), item| {
        (sum + u64::from(item.rating), count + 1)
    });
    if count == 0 {
        None
    } else {
        Some(sum as f64 / count as f64)
    }
}

fn daily_trend(today: NaiveDate, stamped: &[(NaiveDateTime, &FeedbackItem)]) -> Vec<DailyPoint> {
    (0..7)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            let count = stamped
                .iter()
                .filter(|(created_at, _)| created_at.date() == date)
                .count() as u64;
            DailyPoint {
                date: date.to_string(),
                count,
            }
        })
        .collect()
}

fn top_attention(items: &[FeedbackItem]) -> Vec<FeedbackItem> {
    let mut ranked: Vec<&FeedbackItem> = items.iter().collect();
    // stable: equal tallies keep input order
    ranked.sort_by(|a, b| b.votes.cmp(&a.votes));
    ranked.into_iter().take(TOP_ATTENTION).cloned().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Granularity {
    Hour,
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl Window {
    fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at < self.end
    }
}

impl Granularity {
    fn window_count(self) -> i64 {
        match self {
            Granularity::Hour => 24,
            Granularity::Day => 7,
            Granularity::Week => 8,
            Granularity::Month => 7,
        }
    }

    /// Start of the window that contains `now`.
    fn current_start(self, now: NaiveDateTime) -> NaiveDateTime {
        let midnight = now.date().and_time(NaiveTime::MIN);
        match self {
            Granularity::Hour => midnight + Duration::hours(i64::from(now.hour())),
            Granularity::Day => midnight,
            Granularity::Week => {
                midnight - Duration::days(i64::from(now.weekday().num_days_from_monday()))
            }
            Granularity::Month => midnight - Duration::days(i64::from(now.day0())),
        }
    }

    fn step(self, start: NaiveDateTime, steps: i64) -> Option<NaiveDateTime> {
        match self {
            Granularity::Hour => start.checked_add_signed(Duration::hours(steps)),
            Granularity::Day => start.checked_add_signed(Duration::days(steps)),
            Granularity::Week => start.checked_add_signed(Duration::weeks(steps)),
            Granularity::Month => {
                shift_months(start.date(), steps).map(|date| date.and_time(NaiveTime::MIN))
            }
        }
    }

    /// Oldest first; the last window contains `now`.
    fn windows(self, now: NaiveDateTime) -> Vec<Window> {
        let current = self.current_start(now);
        (0..self.window_count())
            .rev()
            .filter_map(|offset| {
                Some(Window {
                    start: self.step(current, -offset)?,
                    end: self.step(current, 1 - offset)?,
                })
            })
            .collect()
    }

    fn label(self, start: NaiveDateTime) -> String {
        let pattern = match self {
            Granularity::Hour => "%H:%M",
            Granularity::Day => "%a",
            Granularity::Week => "Week of %b %d",
            Granularity::Month => "%b %Y",
        };
        start.format(pattern).to_string()
    }
}

/// First of the month `steps` months away from the month containing `date`.
fn shift_months(date: NaiveDate, steps: i64) -> Option<NaiveDate> {
    let index = i64::from(date.year()) * 12 + i64::from(date.month0()) + steps;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = index.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn rating_trend(
    granularity: Granularity,
    now: NaiveDateTime,
    stamped: &[(NaiveDateTime, &FeedbackItem)],
) -> Vec<TrendPoint> {
    granularity
        .windows(now)
        .into_iter()
        .map(|window| {
            let selected: Vec<&FeedbackItem> = stamped
                .iter()
                .filter(|(created_at, _)| window.contains(*created_at))
                .map(|(_, item)| *item)
                .collect();
            TrendPoint {
                label: granularity.label(window.start),
                start: window.start.format(WINDOW_FORMAT).to_string(),
                end: window.end.format(WINDOW_FORMAT).to_string(),
                average: average(selected.iter().copied()),
                count: selected.len() as u64,
            }
        })
        .collect()
}
