use anyhow::{
  Context,
  anyhow
};
use chrono::NaiveDate;
use regex::Regex;
use tracing::trace;

use crate::case::{
  CaseRecord,
  Classification,
  Gender,
  Status
};
use crate::datetime::parse_iso_date;

#[derive(Debug, Clone)]
pub enum Pred {
  CaseNo(u32),
  ClassificationEq(Classification),
  StatusEq(Status),
  GenderEq(Gender),
  ConfirmedSince(NaiveDate),
  ConfirmedUntil(NaiveDate),
  DetailMatches(Regex)
}

/// Case-number terms are alternatives
/// (`12 13` selects both cases); every
/// other term must hold. The empty
/// filter matches every case.
#[derive(Debug, Clone, Default)]
pub struct Filter {
  case_nos: Vec<Pred>,
  preds:    Vec<Pred>
}

impl Filter {
  #[tracing::instrument]
  pub fn parse(
    terms: &[String]
  ) -> anyhow::Result<Self> {
    let (case_nos, preds): (
      Vec<Pred>,
      Vec<Pred>
    ) = terms
      .iter()
      .map(|term| parse_term(term))
      .collect::<anyhow::Result<Vec<_>>>()?
      .into_iter()
      .partition(|pred| {
        matches!(pred, Pred::CaseNo(_))
      });
    trace!(
      case_nos = case_nos.len(),
      preds = preds.len(),
      "parsed filter"
    );
    Ok(Self {
      case_nos,
      preds
    })
  }

  pub fn is_empty(&self) -> bool {
    self.case_nos.is_empty()
      && self.preds.is_empty()
  }

  pub fn matches(
    &self,
    case: &CaseRecord
  ) -> bool {
    let numbered = self
      .case_nos
      .is_empty()
      || self
        .case_nos
        .iter()
        .any(|pred| eval_pred(pred, case));

    numbered
      && self
        .preds
        .iter()
        .all(|pred| eval_pred(pred, case))
  }
}

fn parse_term(
  term: &str
) -> anyhow::Result<Pred> {
  let term = term.trim();

  let number = term
    .strip_prefix('#')
    .unwrap_or(term);
  if let Ok(case_no) =
    number.parse::<u32>()
  {
    return Ok(Pred::CaseNo(case_no));
  }

  if let Some(pattern) =
    term.strip_prefix("detail~")
  {
    let re = Regex::new(&format!(
      "(?i){pattern}"
    ))
    .with_context(|| {
      format!(
        "invalid detail pattern: \
         {pattern}"
      )
    })?;
    return Ok(Pred::DetailMatches(re));
  }

  let (key, value) =
    term.split_once(':').ok_or_else(
      || {
        anyhow!(
          "unrecognised filter term: \
           {term}"
        )
      }
    )?;

  match key {
    | "classification" => {
      Classification::from_key(value)
        .map(Pred::ClassificationEq)
        .ok_or_else(|| {
          anyhow!(
            "unknown classification: \
             {value}"
          )
        })
    }
    | "status" => {
      Status::from_key(value)
        .map(Pred::StatusEq)
        .ok_or_else(|| {
          anyhow!(
            "unknown status: {value}"
          )
        })
    }
    | "gender" => {
      Gender::from_key(value)
        .map(Pred::GenderEq)
        .ok_or_else(|| {
          anyhow!(
            "unknown gender: {value}"
          )
        })
    }
    | "since" => {
      Ok(Pred::ConfirmedSince(
        parse_iso_date(value)?
      ))
    }
    | "until" => {
      Ok(Pred::ConfirmedUntil(
        parse_iso_date(value)?
      ))
    }
    | other => Err(anyhow!(
      "unknown filter key: {other}"
    ))
  }
}

fn eval_pred(
  pred: &Pred,
  case: &CaseRecord
) -> bool {
  match pred {
    | Pred::CaseNo(no) => {
      case.case_no == *no
    }
    | Pred::ClassificationEq(c) => {
      case.classification == *c
    }
    | Pred::StatusEq(s) => {
      case.status == *s
    }
    | Pred::GenderEq(g) => {
      case.gender == *g
    }
    | Pred::ConfirmedSince(date) => {
      case.confirmation_date >= *date
    }
    | Pred::ConfirmedUntil(date) => {
      case.confirmation_date <= *date
    }
    | Pred::DetailMatches(re) => {
      case.detail.contains(re)
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::Filter;
  use crate::case::{
    CaseRecord,
    Classification,
    Status
  };
  use crate::labels::Localized;

  fn sample() -> CaseRecord {
    let mut case = CaseRecord::new(
      42,
      NaiveDate::from_ymd_opt(
        2020, 2, 14
      )
      .expect("valid date")
    );
    case.classification =
      Classification::LocalCloseContact;
    case.status = Status::Discharged;
    case.detail = Localized::new(
      "與第38宗個案同住",
      "Lives with case 38"
    );
    case
  }

  fn terms(raw: &[&str]) -> Vec<String> {
    raw
      .iter()
      .map(|s| s.to_string())
      .collect()
  }

  #[test]
  fn empty_filter_matches_everything() {
    let filter = Filter::parse(&[])
      .expect("parse filter");
    assert!(filter.is_empty());
    assert!(filter.matches(&sample()));
  }

  #[test]
  fn terms_are_conjunctive() {
    let filter = Filter::parse(&terms(&[
      "classification:local_close_contact",
      "status:discharged",
      "since:2020-02-14",
      "until:2020-02-20"
    ]))
    .expect("parse filter");
    assert!(filter.matches(&sample()));

    let filter = Filter::parse(&terms(&[
      "#42",
      "status:deceased"
    ]))
    .expect("parse filter");
    assert!(!filter.matches(&sample()));
  }

  #[test]
  fn case_numbers_are_alternatives() {
    let mut other = sample();
    other.case_no = 43;
    other.status = Status::Hospitalised;

    let filter = Filter::parse(&terms(&[
      "42", "#43"
    ]))
    .expect("parse filter");
    assert!(filter.matches(&sample()));
    assert!(filter.matches(&other));

    let filter = Filter::parse(&terms(&[
      "42",
      "43",
      "status:discharged"
    ]))
    .expect("parse filter");
    assert!(filter.matches(&sample()));
    assert!(!filter.matches(&other));

    let filter =
      Filter::parse(&terms(&["44"]))
        .expect("parse filter");
    assert!(!filter.is_empty());
    assert!(!filter.matches(&sample()));
  }

  #[test]
  fn detail_pattern_checks_both_languages()
  {
    let en = Filter::parse(&terms(&[
      "detail~LIVES WITH"
    ]))
    .expect("parse filter");
    assert!(en.matches(&sample()));

    let zh = Filter::parse(&terms(&[
      "detail~同住"
    ]))
    .expect("parse filter");
    assert!(zh.matches(&sample()));
  }

  #[test]
  fn rejects_unknown_terms() {
    assert!(
      Filter::parse(&terms(&[
        "status:recovering"
      ]))
      .is_err()
    );
    assert!(
      Filter::parse(&terms(&["urgent"]))
        .is_err()
    );
    assert!(
      Filter::parse(&terms(&[
        "since:yesterday"
      ]))
      .is_err()
    );
  }
}
