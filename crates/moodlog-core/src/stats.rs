//! Per-period emotion counts.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::{Emotion, Error, NoteMeta, DATE_FORMAT};

/// Chart order of the emotion counts.
const CHART_ORDER: [Emotion; 6] = [
    Emotion::Anger,
    Emotion::Fear,
    Emotion::Joy,
    Emotion::Sadness,
    Emotion::Surprise,
    Emotion::Love,
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    #[default]
    Day,
    /// ISO week containing the anchor day.
    Week,
    /// Calendar month containing the anchor day.
    Month,
}

impl Period {
    fn contains(self, anchor: NaiveDate, date: NaiveDate) -> bool {
        match self {
            Period::Day => date == anchor,
            Period::Week => date.iso_week() == anchor.iso_week(),
            Period::Month => date.year() == anchor.year() && date.month() == anchor.month(),
        }
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            other => Err(Error::Validation(format!("unknown period: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmotionCount {
    pub emotion: Emotion,
    pub count: usize,
}

/// Count emotion labels over notes dated within `period` around `anchor`.
///
/// Every emotion appears in the result, in chart order, even at zero.
/// Labels outside the emotion set and undated entries are skipped.
pub fn count_emotions<'a, I>(metas: I, period: Period, anchor: NaiveDate) -> Vec<EmotionCount>
where
    I: IntoIterator<Item = &'a NoteMeta>,
{
    let mut counts: Vec<EmotionCount> = CHART_ORDER
        .iter()
        .map(|&emotion| EmotionCount { emotion, count: 0 })
        .collect();

    for meta in metas {
        let date = match NaiveDateTime::parse_from_str(&meta.date, DATE_FORMAT) {
            Ok(dt) => dt.date(),
            Err(_) => {
                tracing::debug!(date = %meta.date, "skipping entry with unparseable date");
                continue;
            }
        };
        if !period.contains(anchor, date) {
            continue;
        }
        for label in &meta.emotions {
            if let Ok(emotion) = label.parse::<Emotion>() {
                if let Some(slot) = counts.iter_mut().find(|c| c.emotion == emotion) {
                    slot.count += 1;
                }
            }
        }
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(date: &str, emotions: &[&str]) -> NoteMeta {
        NoteMeta {
            date: date.to_string(),
            emotions: emotions.iter().map(|e| e.to_string()).collect(),
        }
    }

    fn count_of(counts: &[EmotionCount], emotion: Emotion) -> usize {
        counts.iter().find(|c| c.emotion == emotion).unwrap().count
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_chart_order_and_zeroes() {
        let counts = count_emotions(&Vec::<NoteMeta>::new(), Period::Day, day(2024, 7, 21));
        let order: Vec<Emotion> = counts.iter().map(|c| c.emotion).collect();
        assert_eq!(order, CHART_ORDER.to_vec());
        assert!(counts.iter().all(|c| c.count == 0));
    }

    #[test]
    fn test_day_period() {
        let metas = vec![
            meta("2024-07-21 08:00:00", &["joy"]),
            meta("2024-07-21 23:59:59", &["joy", "fear"]),
            meta("2024-07-22 00:00:00", &["joy"]),
        ];
        let counts = count_emotions(&metas, Period::Day, day(2024, 7, 21));
        assert_eq!(count_of(&counts, Emotion::Joy), 2);
        assert_eq!(count_of(&counts, Emotion::Fear), 1);
    }

    #[test]
    fn test_week_period_uses_iso_week() {
        // 2024-07-21 is a Sunday; its ISO week starts Monday 2024-07-15.
        let metas = vec![
            meta("2024-07-15 09:00:00", &["anger"]),
            meta("2024-07-14 09:00:00", &["anger"]),
            meta("2023-07-17 09:00:00", &["anger"]),
        ];
        let counts = count_emotions(&metas, Period::Week, day(2024, 7, 21));
        assert_eq!(count_of(&counts, Emotion::Anger), 1);
    }

    #[test]
    fn test_month_period() {
        let metas = vec![
            meta("2024-07-01 00:00:00", &["love"]),
            meta("2024-07-31 12:00:00", &["love", "surprise"]),
            meta("2023-07-15 12:00:00", &["love"]),
        ];
        let counts = count_emotions(&metas, Period::Month, day(2024, 7, 10));
        assert_eq!(count_of(&counts, Emotion::Love), 2);
        assert_eq!(count_of(&counts, Emotion::Surprise), 1);
    }

    #[test]
    fn test_unknown_labels_and_bad_dates_skipped() {
        let metas = vec![
            meta("2024-07-21 10:00:00", &["happy", "Sadness"]),
            meta("yesterday-ish", &["sadness"]),
        ];
        let counts = count_emotions(&metas, Period::Day, day(2024, 7, 21));
        assert_eq!(count_of(&counts, Emotion::Sadness), 1);
        assert_eq!(counts.iter().map(|c| c.count).sum::<usize>(), 1);
    }

    #[test]
    fn test_parse_period() {
        assert_eq!("Week".parse::<Period>().unwrap(), Period::Week);
        assert!("year".parse::<Period>().is_err());
    }
}
