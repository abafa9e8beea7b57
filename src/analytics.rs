use serde::Serialize;

use crate::models::{ComplianceEntry, ComplianceSummary, DayScore, Trend};

/// Percentage points two windows must differ by before a trend is reported.
pub const TREND_THRESHOLD: f64 = 5.0;

/// Below this many scored days the midpoint split is meaningless.
pub const MIN_ENTRIES_FOR_TREND: usize = 4;

pub const RECENT_WINDOW_DAYS: usize = 7;

/// Reduced statistics block of the patient-scoped listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientStatistics {
    pub total_records: usize,
    pub average_compliance: i32,
    pub trend: Trend,
}

impl From<&ComplianceSummary> for PatientStatistics {
    fn from(summary: &ComplianceSummary) -> Self {
        Self {
            total_records: summary.total_records,
            average_compliance: summary.average_compliance,
            trend: summary.trend,
        }
    }
}

/// Aggregates daily compliance entries into a summary.
///
/// Input order does not matter: a working copy is sorted ascending by date
/// before the midpoint trend split. Entries without a percentage are counted
/// in `total_records` only.
pub fn summarize(entries: &[ComplianceEntry]) -> ComplianceSummary {
    let mut scored: Vec<DayScore> = entries
        .iter()
        .filter_map(|entry| {
            entry.compliance_percentage.map(|pct| DayScore {
                date: entry.date,
                compliance_percentage: pct,
            })
        })
        .collect();

    if scored.is_empty() {
        return ComplianceSummary {
            average_compliance: 0,
            total_records: entries.len(),
            trend: Trend::Stable,
            best_day: None,
            worst_day: None,
        };
    }

    // Percentage as secondary key keeps same-date duplicates deterministic.
    scored.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then(a.compliance_percentage.cmp(&b.compliance_percentage))
    });

    let total: i64 = scored.iter().map(|s| i64::from(s.compliance_percentage)).sum();
    let average_compliance = round_half_up(total, scored.len());

    let mut best = &scored[0];
    let mut worst = &scored[0];
    for score in scored.iter().skip(1) {
        if score.compliance_percentage > best.compliance_percentage {
            best = score;
        }
        if score.compliance_percentage < worst.compliance_percentage {
            worst = score;
        }
    }

    ComplianceSummary {
        average_compliance,
        total_records: entries.len(),
        trend: midpoint_trend(&scored),
        best_day: Some(best.clone()),
        worst_day: Some(worst.clone()),
    }
}

/// Compares the most recent `window_size` entries against the window before
/// them. Callers are expected to pass entries newest first; the function
/// re-sorts its own copy so a mis-ordered fetch cannot flip the result.
pub fn recent_window_trend(entries: &[ComplianceEntry], window_size: usize) -> Trend {
    if window_size == 0 {
        return Trend::Stable;
    }

    // Same-date entries are ordered by percentage so the window boundary
    // does not depend on fetch order.
    let mut newest_first = entries.to_vec();
    newest_first.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then(b.compliance_percentage.cmp(&a.compliance_percentage))
    });

    let recent: Vec<&ComplianceEntry> = newest_first.iter().take(window_size).collect();
    let previous: Vec<&ComplianceEntry> = newest_first
        .iter()
        .skip(window_size)
        .take(window_size)
        .collect();

    if previous.is_empty() {
        return Trend::Stable;
    }

    let (Some(recent_avg), Some(previous_avg)) = (window_mean(&recent), window_mean(&previous))
    else {
        return Trend::Stable;
    };

    classify_difference(recent_avg - previous_avg)
}

pub fn classify_difference(difference: f64) -> Trend {
    if difference > TREND_THRESHOLD {
        Trend::Improving
    } else if difference < -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Integer mean with ties rounded up, i.e. `floor(sum / count + 0.5)`.
pub fn round_half_up(sum: i64, count: usize) -> i32 {
    if count == 0 {
        return 0;
    }
    let count = count as i64;
    (2 * sum + count).div_euclid(2 * count) as i32
}

fn midpoint_trend(ascending: &[DayScore]) -> Trend {
    if ascending.len() < MIN_ENTRIES_FOR_TREND {
        return Trend::Stable;
    }

    let midpoint = ascending.len() / 2;
    let (first_half, second_half) = ascending.split_at(midpoint);

    classify_difference(mean(second_half) - mean(first_half))
}

fn mean(scores: &[DayScore]) -> f64 {
    let total: i64 = scores.iter().map(|s| i64::from(s.compliance_percentage)).sum();
    total as f64 / scores.len() as f64
}

fn window_mean(window: &[&ComplianceEntry]) -> Option<f64> {
    let values: Vec<i32> = window
        .iter()
        .filter_map(|entry| entry.compliance_percentage)
        .collect();

    if values.is_empty() {
        return None;
    }

    let total: i64 = values.iter().map(|v| i64::from(*v)).sum();
    Some(total as f64 / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use pretty_assertions::assert_eq;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
    }

    fn entry(offset: i64, pct: Option<i32>) -> ComplianceEntry {
        ComplianceEntry {
            date: day(offset),
            compliance_percentage: pct,
            meals_followed: 4,
            meals_total: 5,
        }
    }

    fn series(values: &[i32]) -> Vec<ComplianceEntry> {
        values
            .iter()
            .enumerate()
            .map(|(i, pct)| entry(i as i64, Some(*pct)))
            .collect()
    }

    #[test]
    fn empty_input_yields_zeroed_summary() {
        let summary = summarize(&[]);
        assert_eq!(
            summary,
            ComplianceSummary {
                average_compliance: 0,
                total_records: 0,
                trend: Trend::Stable,
                best_day: None,
                worst_day: None,
            }
        );
    }

    #[test]
    fn entries_without_percentages_only_count_as_records() {
        let entries = vec![entry(0, None), entry(1, None), entry(2, None)];
        let summary = summarize(&entries);
        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.average_compliance, 0);
        assert_eq!(summary.trend, Trend::Stable);
        assert!(summary.best_day.is_none());
        assert!(summary.worst_day.is_none());
    }

    #[test]
    fn seed_patient_one_scenario() {
        let entries = series(&[92, 88, 95, 90, 85, 93]);
        let summary = summarize(&entries);

        assert_eq!(summary.average_compliance, 91);
        assert_eq!(summary.total_records, 6);
        assert_eq!(summary.trend, Trend::Stable);
        assert_eq!(
            summary.best_day,
            Some(DayScore {
                date: day(2),
                compliance_percentage: 95
            })
        );
        assert_eq!(
            summary.worst_day,
            Some(DayScore {
                date: day(4),
                compliance_percentage: 85
            })
        );
    }

    #[test]
    fn shuffled_input_gives_identical_summary() {
        let ordered = series(&[40, 45, 60, 70, 72, 90, 55]);
        let mut descending = ordered.clone();
        descending.reverse();
        let mut scrambled = ordered.clone();
        scrambled.swap(0, 5);
        scrambled.swap(2, 6);

        let expected = summarize(&ordered);
        assert_eq!(expected.trend, Trend::Improving);
        assert_eq!(summarize(&descending), expected);
        assert_eq!(summarize(&scrambled), expected);
    }

    #[test]
    fn nulls_are_skipped_for_average_and_extremes() {
        let entries = vec![
            entry(0, Some(80)),
            entry(1, None),
            entry(2, Some(60)),
            entry(3, None),
        ];
        let summary = summarize(&entries);
        assert_eq!(summary.total_records, 4);
        assert_eq!(summary.average_compliance, 70);
        assert_eq!(summary.best_day.map(|d| d.date), Some(day(0)));
        assert_eq!(summary.worst_day.map(|d| d.date), Some(day(2)));
    }

    #[test]
    fn ties_keep_the_earliest_day() {
        let entries = vec![
            entry(3, Some(90)),
            entry(1, Some(90)),
            entry(2, Some(50)),
            entry(0, Some(50)),
        ];
        let summary = summarize(&entries);
        assert_eq!(summary.best_day.map(|d| d.date), Some(day(1)));
        assert_eq!(summary.worst_day.map(|d| d.date), Some(day(0)));
    }

    #[test]
    fn constant_series_is_stable_at_its_value() {
        let summary = summarize(&series(&[77; 10]));
        assert_eq!(summary.average_compliance, 77);
        assert_eq!(summary.trend, Trend::Stable);
    }

    #[test]
    fn fewer_than_four_scored_days_is_stable() {
        let summary = summarize(&series(&[10, 90, 100]));
        assert_eq!(summary.trend, Trend::Stable);
    }

    #[test]
    fn average_rounds_half_up() {
        assert_eq!(round_half_up(181, 2), 91);
        assert_eq!(round_half_up(179, 2), 90);
        assert_eq!(round_half_up(539, 6), 90);
        assert_eq!(round_half_up(0, 0), 0);
    }

    #[test]
    fn threshold_is_strict() {
        assert_eq!(classify_difference(5.0), Trend::Stable);
        assert_eq!(classify_difference(-5.0), Trend::Stable);
        assert_eq!(classify_difference(5.1), Trend::Improving);
        assert_eq!(classify_difference(-5.1), Trend::Declining);
    }

    #[test]
    fn midpoint_split_boundary() {
        assert_eq!(summarize(&series(&[50, 50, 55, 55])).trend, Trend::Stable);

        // Ten days at 50 followed by ten days averaging 55.1 / 44.9.
        let mut rising = vec![50; 10];
        rising.extend([56, 55, 55, 55, 55, 55, 55, 55, 55, 55]);
        assert_eq!(summarize(&series(&rising)).trend, Trend::Improving);

        let mut falling = vec![50; 10];
        falling.extend([44, 45, 45, 45, 45, 45, 45, 45, 45, 45]);
        assert_eq!(summarize(&series(&falling)).trend, Trend::Declining);
    }

    #[test]
    fn odd_lengths_put_the_extra_day_in_the_second_half() {
        // first = [90, 90], second = [80, 60, 60] -> diff -23.3
        let summary = summarize(&series(&[90, 90, 80, 60, 60]));
        assert_eq!(summary.trend, Trend::Declining);
    }

    #[test]
    fn extremes_bound_every_scored_day() {
        let entries = series(&[33, 71, 12, 99, 64, 12, 99]);
        let summary = summarize(&entries);
        let best = summary.best_day.unwrap().compliance_percentage;
        let worst = summary.worst_day.unwrap().compliance_percentage;
        for e in &entries {
            let pct = e.compliance_percentage.unwrap();
            assert!(best >= pct);
            assert!(worst <= pct);
        }
        assert!((0..=100).contains(&summary.average_compliance));
    }

    #[test]
    fn window_trend_needs_a_previous_window() {
        let entries = series(&[10, 20, 30, 40, 90, 95, 100]);
        assert_eq!(recent_window_trend(&entries, RECENT_WINDOW_DAYS), Trend::Stable);
        assert_eq!(recent_window_trend(&entries, 0), Trend::Stable);
    }

    #[test]
    fn window_trend_compares_recent_week_to_prior_week() {
        let mut values = vec![60; 7];
        values.extend([80; 7]);
        let entries = series(&values);
        assert_eq!(recent_window_trend(&entries, RECENT_WINDOW_DAYS), Trend::Improving);

        let mut values = vec![80; 7];
        values.extend([60; 7]);
        let entries = series(&values);
        assert_eq!(recent_window_trend(&entries, RECENT_WINDOW_DAYS), Trend::Declining);
    }

    #[test]
    fn window_trend_ignores_entries_older_than_two_windows() {
        // Oldest day is far lower but falls outside both windows.
        let mut values = vec![0];
        values.extend([70; 14]);
        let entries = series(&values);
        assert_eq!(recent_window_trend(&entries, RECENT_WINDOW_DAYS), Trend::Stable);
    }

    #[test]
    fn window_trend_partial_previous_window() {
        // 8 entries: recent = 7 newest at 90, previous = the single oldest at 50.
        let mut values = vec![50];
        values.extend([90; 7]);
        let mut entries = series(&values);
        entries.reverse();
        assert_eq!(recent_window_trend(&entries, RECENT_WINDOW_DAYS), Trend::Improving);
    }

    #[test]
    fn window_trend_with_unscored_previous_window_is_stable() {
        let mut entries = vec![entry(0, None)];
        entries.extend((1..8).map(|i| entry(i, Some(90))));
        assert_eq!(recent_window_trend(&entries, RECENT_WINDOW_DAYS), Trend::Stable);
    }

    #[test]
    fn window_trend_ignores_order_of_same_day_entries() {
        let mut entries = vec![
            entry(5, Some(80)),
            entry(4, Some(80)),
            entry(4, Some(80)),
            entry(3, Some(0)),
            entry(3, Some(100)),
        ];
        let trend = recent_window_trend(&entries, 2);
        entries.swap(3, 4);

        assert_eq!(trend, Trend::Declining);
        assert_eq!(recent_window_trend(&entries, 2), trend);
    }

    #[test]
    fn patient_statistics_drop_extremes() {
        let summary = summarize(&series(&[92, 88, 95, 90]));
        let stats = PatientStatistics::from(&summary);
        assert_eq!(
            stats,
            PatientStatistics {
                total_records: 4,
                average_compliance: 91,
                trend: Trend::Stable,
            }
        );
    }
}
