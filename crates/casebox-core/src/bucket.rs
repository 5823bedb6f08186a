//! Groups cases into "most recent day, then 7-day bins" for the box grid.
//!
//! The first record of the input is the anchor: its confirmation date gets a
//! bucket of its own. Every earlier day down to (but excluding) the fixed
//! start date belongs to a 7-day range counted back from the day before the
//! anchor. Ranges are not aligned to calendar weeks.

use std::collections::HashMap;
use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::datetime::format_iso;

/// Width of every range bucket, in days.
pub const RANGE_DAYS: u64 = 7;

/// A record that can be bucketed by its confirmation date.
pub trait Dated {
    fn confirmation_date(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateLabel {
    /// The single most recent date.
    Anchor(NaiveDate),
    /// `start` is the more recent end; `end` is `start - 7 days`.
    Range { start: NaiveDate, end: NaiveDate },
}

impl fmt::Display for DateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anchor(date) => f.write_str(&format_iso(*date)),
            Self::Range { start, end } => {
                write!(f, "{} - {}", format_iso(*start), format_iso(*end))
            }
        }
    }
}

impl Serialize for DateLabel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket<'a, T> {
    pub label: DateLabel,
    pub cases: Vec<&'a T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BucketError {
    #[error(
        "case at position {index} is dated {date}, after the anchor date {anchor}; \
         cases must be ordered most recent first"
    )]
    AnchorNotLatest {
        anchor: NaiveDate,
        index: usize,
        date: NaiveDate,
    },
}

/// Date-to-label assignment for one anchor and start date.
#[derive(Debug, Clone)]
pub struct BucketPlan {
    labels: Vec<DateLabel>,
    by_date: HashMap<NaiveDate, usize>,
}

impl BucketPlan {
    #[tracing::instrument]
    pub fn new(anchor: NaiveDate, fixed_start: NaiveDate) -> Self {
        let mut labels = vec![DateLabel::Anchor(anchor)];
        let mut by_date = HashMap::from([(anchor, 0)]);

        // The step counter runs across ranges; a new range opens every 7th step.
        let mut step: u64 = 0;
        let mut cursor = anchor.pred_opt();
        while let Some(date) = cursor.filter(|date| *date > fixed_start) {
            if step % RANGE_DAYS == 0 {
                let end = date
                    .checked_sub_days(Days::new(RANGE_DAYS))
                    .unwrap_or(NaiveDate::MIN);
                labels.push(DateLabel::Range { start: date, end });
            }
            by_date.insert(date, labels.len() - 1);
            step += 1;
            cursor = date.pred_opt();
        }

        debug!(
            %anchor,
            %fixed_start,
            days = by_date.len(),
            labels = labels.len(),
            "computed bucket plan"
        );

        Self { labels, by_date }
    }

    /// Labels in descending chronological order, anchor first.
    pub fn labels(&self) -> &[DateLabel] {
        &self.labels
    }

    pub fn label_for(&self, date: NaiveDate) -> Option<DateLabel> {
        self.index_for(date).map(|idx| self.labels[idx])
    }

    fn index_for(&self, date: NaiveDate) -> Option<usize> {
        self.by_date.get(&date).copied()
    }
}

/// Partitions `cases` into the anchor bucket followed by 7-day ranges.
///
/// `cases[0]` must hold the latest date; any later record is rejected.
/// Records dated on or before `fixed_start` fall outside every label and are
/// left out (see [`unbucketed`]). Empty buckets are never returned.
#[tracing::instrument(skip(cases), fields(count = cases.len()))]
pub fn group_by_recency<T: Dated>(
    cases: &[T],
    fixed_start: NaiveDate,
) -> Result<Vec<Bucket<'_, T>>, BucketError> {
    let Some(plan) = validated_plan(cases, fixed_start)? else {
        debug!("no cases to bucket");
        return Ok(vec![]);
    };

    let mut members: Vec<Vec<&T>> = vec![Vec::new(); plan.labels().len()];
    let mut dropped = 0usize;
    for case in cases {
        match plan.index_for(case.confirmation_date()) {
            Some(idx) => members[idx].push(case),
            None => dropped += 1,
        }
    }

    let buckets: Vec<Bucket<'_, T>> = plan
        .labels()
        .iter()
        .zip(members)
        .filter(|(_, cases)| !cases.is_empty())
        .map(|(label, cases)| Bucket {
            label: *label,
            cases,
        })
        .collect();

    debug!(buckets = buckets.len(), dropped, "grouped cases by recency");
    Ok(buckets)
}

/// Records that [`group_by_recency`] leaves out for the same input.
pub fn unbucketed<T: Dated>(cases: &[T], fixed_start: NaiveDate) -> Result<Vec<&T>, BucketError> {
    let Some(plan) = validated_plan(cases, fixed_start)? else {
        return Ok(vec![]);
    };

    Ok(cases
        .iter()
        .filter(|case| plan.label_for(case.confirmation_date()).is_none())
        .collect())
}

fn validated_plan<T: Dated>(
    cases: &[T],
    fixed_start: NaiveDate,
) -> Result<Option<BucketPlan>, BucketError> {
    let Some(first) = cases.first() else {
        return Ok(None);
    };

    let anchor = first.confirmation_date();
    let later = cases
        .iter()
        .map(Dated::confirmation_date)
        .enumerate()
        .find(|(_, date)| *date > anchor);
    if let Some((index, date)) = later {
        return Err(BucketError::AnchorNotLatest {
            anchor,
            index,
            date,
        });
    }

    Ok(Some(BucketPlan::new(anchor, fixed_start)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Rec {
        id: u32,
        date: NaiveDate,
    }

    impl Dated for Rec {
        fn confirmation_date(&self) -> NaiveDate {
            self.date
        }
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid test date")
    }

    fn rec(id: u32, raw: &str) -> Rec {
        Rec {
            id,
            date: date(raw),
        }
    }

    fn summary(buckets: &[Bucket<'_, Rec>]) -> Vec<(String, Vec<u32>)> {
        buckets
            .iter()
            .map(|bucket| {
                (
                    bucket.label.to_string(),
                    bucket.cases.iter().map(|case| case.id).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn groups_anchor_day_then_weekly_ranges() {
        let cases = vec![
            rec(1, "2020-03-08"),
            rec(2, "2020-03-02"),
            rec(3, "2020-03-01"),
            rec(4, "2020-02-20"),
        ];
        let buckets = group_by_recency(&cases, date("2020-01-21")).expect("group");
        assert_eq!(
            summary(&buckets),
            vec![
                ("2020-03-08".to_string(), vec![1]),
                ("2020-03-07 - 2020-02-29".to_string(), vec![2, 3]),
                ("2020-02-22 - 2020-02-15".to_string(), vec![4]),
            ]
        );
    }

    #[test]
    fn empty_input_yields_no_buckets() {
        let cases: Vec<Rec> = vec![];
        let buckets = group_by_recency(&cases, date("2020-01-21")).expect("group");
        assert!(buckets.is_empty());
        assert!(unbucketed(&cases, date("2020-01-21")).expect("unbucketed").is_empty());
    }

    #[test]
    fn anchor_bucket_holds_every_record_of_that_day() {
        let cases = vec![
            rec(9, "2020-02-10"),
            rec(8, "2020-02-10"),
            rec(7, "2020-02-09"),
            rec(6, "2020-02-10"),
        ];
        let buckets = group_by_recency(&cases, date("2020-01-21")).expect("group");
        assert_eq!(
            summary(&buckets),
            vec![
                ("2020-02-10".to_string(), vec![9, 8, 6]),
                ("2020-02-09 - 2020-02-02".to_string(), vec![7]),
            ]
        );
    }

    #[test]
    fn start_on_or_after_anchor_keeps_only_anchor_bucket() {
        let cases = vec![rec(3, "2020-01-25"), rec(2, "2020-01-24"), rec(1, "2020-01-10")];
        for start in ["2020-01-25", "2020-02-01"] {
            let buckets = group_by_recency(&cases, date(start)).expect("group");
            assert_eq!(summary(&buckets), vec![("2020-01-25".to_string(), vec![3])]);
        }
    }

    #[test]
    fn records_on_or_before_start_are_dropped() {
        let cases = vec![
            rec(4, "2020-01-25"),
            rec(3, "2020-01-22"),
            rec(2, "2020-01-21"),
            rec(1, "2020-01-19"),
        ];
        let start = date("2020-01-21");
        let buckets = group_by_recency(&cases, start).expect("group");
        assert_eq!(
            summary(&buckets),
            vec![
                ("2020-01-25".to_string(), vec![4]),
                ("2020-01-24 - 2020-01-17".to_string(), vec![3]),
            ]
        );

        let dropped: Vec<u32> = unbucketed(&cases, start)
            .expect("unbucketed")
            .iter()
            .map(|case| case.id)
            .collect();
        assert_eq!(dropped, vec![2, 1]);
    }

    #[test]
    fn ranges_count_from_anchor_not_calendar_weeks() {
        // 2020-03-11 is a Wednesday; ranges still start the day before it.
        let plan = BucketPlan::new(date("2020-03-11"), date("2020-02-01"));
        let labels: Vec<String> = plan.labels().iter().take(3).map(ToString::to_string).collect();
        assert_eq!(
            labels,
            vec![
                "2020-03-11".to_string(),
                "2020-03-10 - 2020-03-03".to_string(),
                "2020-03-03 - 2020-02-25".to_string(),
            ]
        );
        assert_eq!(
            plan.label_for(date("2020-03-04")),
            Some(DateLabel::Range {
                start: date("2020-03-10"),
                end: date("2020-03-03"),
            })
        );
        assert_eq!(plan.label_for(date("2020-03-12")), None);
    }

    #[test]
    fn range_labels_span_seven_days_and_descend() {
        let plan = BucketPlan::new(date("2020-04-30"), date("2020-01-21"));
        let labels = plan.labels();
        assert_eq!(labels[0], DateLabel::Anchor(date("2020-04-30")));

        for label in &labels[1..] {
            let DateLabel::Range { start, end } = *label else {
                panic!("expected a range label, got {label:?}");
            };
            assert_eq!((start - end).num_days(), 7);
        }
        let newest = |label: &DateLabel| match *label {
            DateLabel::Anchor(date) => date,
            DateLabel::Range { start, .. } => start,
        };
        for pair in labels.windows(2) {
            assert!(newest(&pair[0]) > newest(&pair[1]));
        }
    }

    #[test]
    fn every_record_lands_in_at_most_one_bucket() {
        let start = date("2020-01-21");
        let anchor = date("2020-03-31");
        let cases: Vec<Rec> = (0..80u32)
            .map(|offset| Rec {
                id: offset,
                date: anchor - Days::new(u64::from(offset)),
            })
            .collect();

        let buckets = group_by_recency(&cases, start).expect("group");
        let mut seen: Vec<u32> = buckets
            .iter()
            .flat_map(|bucket| bucket.cases.iter().map(|case| case.id))
            .collect();
        let dropped = unbucketed(&cases, start).expect("unbucketed");

        assert_eq!(seen.len() + dropped.len(), cases.len());
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len() + dropped.len(), cases.len());
        assert!(dropped.iter().all(|case| case.date <= start));
    }

    #[test]
    fn rejects_input_whose_first_record_is_not_latest() {
        let cases = vec![rec(1, "2020-03-01"), rec(2, "2020-03-02")];
        let err = group_by_recency(&cases, date("2020-01-21")).expect_err("unsorted input");
        assert_eq!(
            err,
            BucketError::AnchorNotLatest {
                anchor: date("2020-03-01"),
                index: 1,
                date: date("2020-03-02"),
            }
        );
        assert!(err.to_string().contains("most recent first"));
    }

    #[test]
    fn grouping_is_repeatable() {
        let cases = vec![rec(3, "2020-02-29"), rec(2, "2020-02-21"), rec(1, "2020-02-01")];
        let first = group_by_recency(&cases, date("2020-01-21")).expect("first");
        let second = group_by_recency(&cases, date("2020-01-21")).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn labels_serialize_as_display_text() {
        let label = DateLabel::Range {
            start: date("2020-03-07"),
            end: date("2020-02-29"),
        };
        assert_eq!(
            serde_json::to_string(&label).expect("serialize"),
            "\"2020-03-07 - 2020-02-29\""
        );
    }
}
