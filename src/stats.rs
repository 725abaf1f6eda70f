//! Route-history statistics and the metric formatting shared with the live
//! stats bar.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::session::CompletedRoute;

/// Days covered by [`RouteStatistics::routes_last_30_days`].
pub const RECENT_WINDOW_DAYS: i64 = 30;

/// One saved route as shown in the profile history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteHistoryEntry {
    pub date: NaiveDate,
    pub distance_km: f64,
    pub elapsed_seconds: u64,
    pub avg_pace_seconds_per_km: u32,
}

impl From<&CompletedRoute> for RouteHistoryEntry {
    fn from(route: &CompletedRoute) -> Self {
        Self {
            date: route.date.date_naive(),
            distance_km: route.distance_km,
            elapsed_seconds: route.elapsed_seconds,
            avg_pace_seconds_per_km: (route.pace_min_per_km * 60.0).round() as u32,
        }
    }
}

/// Aggregates over a route history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct RouteStatistics {
    pub total_distance_km: f64,
    pub total_routes: u32,
    pub routes_last_30_days: u32,
    /// Rounded mean of the per-route paces, 0 for an empty history
    pub average_pace_seconds_per_km: u32,
}

impl RouteStatistics {
    /// Compute statistics relative to `today`.
    ///
    /// A route counts as recent when its date lies in `[today - 30 days, today]`;
    /// future-dated entries are not recent.
    pub fn from_history(entries: &[RouteHistoryEntry], today: NaiveDate) -> Self {
        let window_start = today - Duration::days(RECENT_WINDOW_DAYS);

        let total_distance_km = entries.iter().map(|e| e.distance_km).sum();
        let routes_last_30_days = entries
            .iter()
            .filter(|e| e.date >= window_start && e.date <= today)
            .count() as u32;

        let average_pace_seconds_per_km = if entries.is_empty() {
            0
        } else {
            let total: u64 = entries.iter().map(|e| e.avg_pace_seconds_per_km as u64).sum();
            (total as f64 / entries.len() as f64).round() as u32
        };

        Self {
            total_distance_km,
            total_routes: entries.len() as u32,
            routes_last_30_days,
            average_pace_seconds_per_km,
        }
    }

    pub fn average_pace(&self) -> String {
        format_pace(self.average_pace_seconds_per_km)
    }
}

/// Elapsed time as `MM:SS`, e.g. 75 -> "01:15". Minutes are not capped.
pub fn format_duration_mm_ss(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Route time as `HH:MM:SS` for history rows, e.g. 1695 -> "00:28:15".
pub fn format_duration_hh_mm_ss(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Pace as `M:SS` per km, e.g. 325 -> "5:25".
pub fn format_pace(seconds_per_km: u32) -> String {
    format!("{}:{:02}", seconds_per_km / 60, seconds_per_km % 60)
}

/// Live pace in decimal minutes per km with two decimals.
pub fn format_pace_min_per_km(pace: f64) -> String {
    if pace > 0.0 && pace.is_finite() {
        format!("{:.2}", pace)
    } else {
        "0.00".to_string()
    }
}

/// Parse an `M:SS` pace into seconds per km. Seconds must be below 60.
pub fn parse_pace(text: &str) -> Option<u32> {
    let (min, sec) = text.trim().split_once(':')?;
    let min: u32 = min.trim().parse().ok()?;
    let sec: u32 = sec.trim().parse().ok()?;
    if sec >= 60 {
        return None;
    }
    min.checked_mul(60)?.checked_add(sec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(date: &str, km: f64, pace: &str) -> RouteHistoryEntry {
        RouteHistoryEntry {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            distance_km: km,
            elapsed_seconds: 0,
            avg_pace_seconds_per_km: parse_pace(pace).unwrap(),
        }
    }

    #[test]
    fn test_statistics() {
        let history = vec![
            entry("2024-05-20", 5.2, "5:25"),
            entry("2024-05-01", 3.0, "6:10"),
            entry("2024-04-01", 10.0, "5:00"),
        ];
        let today = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        let stats = RouteStatistics::from_history(&history, today);

        assert!((stats.total_distance_km - 18.2).abs() < 1e-9);
        assert_eq!(stats.total_routes, 3);
        // 2024-05-01 is exactly 30 days before today
        assert_eq!(stats.routes_last_30_days, 2);
        // (325 + 370 + 300) / 3 = 331.67
        assert_eq!(stats.average_pace_seconds_per_km, 332);
        assert_eq!(stats.average_pace(), "5:32");
    }

    #[test]
    fn test_empty_history() {
        let stats = RouteStatistics::from_history(&[], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(stats.total_routes, 0);
        assert_eq!(stats.total_distance_km, 0.0);
        assert_eq!(stats.average_pace(), "0:00");
    }

    #[test]
    fn test_future_entries_not_recent() {
        let history = vec![entry("2024-06-02", 1.0, "5:00")];
        let stats =
            RouteStatistics::from_history(&history, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(stats.routes_last_30_days, 0);
        assert_eq!(stats.total_routes, 1);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_duration_mm_ss(0), "00:00");
        assert_eq!(format_duration_mm_ss(75), "01:15");
        assert_eq!(format_duration_mm_ss(6000), "100:00");
        assert_eq!(format_pace(325), "5:25");
        assert_eq!(format_pace(59), "0:59");
        assert_eq!(format_pace_min_per_km(5.0), "5.00");
        assert_eq!(format_pace_min_per_km(0.0), "0.00");
    }

    #[test]
    fn test_parse_pace() {
        assert_eq!(parse_pace("5:25"), Some(325));
        assert_eq!(parse_pace(" 10:05 "), Some(605));
        assert_eq!(parse_pace("5:60"), None);
        assert_eq!(parse_pace("525"), None);
        assert_eq!(parse_pace("a:bc"), None);
    }

    #[test]
    fn test_parse_pace_rejects_overflow() {
        assert_eq!(parse_pace("4294967295:00"), None);
        assert_eq!(parse_pace("71582788:16"), None);
        assert_eq!(parse_pace("71582788:15"), Some(u32::MAX));
    }

    #[test]
    fn test_format_duration_hh_mm_ss() {
        assert_eq!(format_duration_hh_mm_ss(0), "00:00:00");
        assert_eq!(format_duration_hh_mm_ss(1695), "00:28:15");
        assert_eq!(format_duration_hh_mm_ss(3 * 3600 + 61), "03:01:01");
        assert_eq!(format_duration_hh_mm_ss(100 * 3600), "100:00:00");
    }

    #[test]
    fn test_from_completed_route() {
        let route = CompletedRoute {
            date: Utc.with_ymd_and_hms(2024, 5, 20, 18, 30, 0).unwrap(),
            distance_km: 2.0,
            elapsed_seconds: 600,
            pace_min_per_km: 5.0,
        };
        let entry = RouteHistoryEntry::from(&route);
        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2024, 5, 20).unwrap());
        assert_eq!(entry.avg_pace_seconds_per_km, 300);
    }
}
