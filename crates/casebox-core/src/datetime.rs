use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::NaiveDate;
use regex::Regex;

/// Earliest confirmation date the dataset can contain.
pub const DEFAULT_START_DATE: &str =
  "2020-01-21";

const ISO_FORMAT: &str = "%Y-%m-%d";

/// Parses a strict `YYYY-MM-DD` date.
///
/// Unpadded fields like `2020-3-8`,
/// which chrono alone accepts, are
/// rejected.
pub fn parse_iso_date(
  raw: &str
) -> anyhow::Result<NaiveDate> {
  let iso_re = iso_pattern()?;

  let trimmed = raw.trim();
  if !iso_re.is_match(trimmed) {
    return Err(anyhow!(
      "invalid date '{raw}': expected \
       YYYY-MM-DD"
    ));
  }

  NaiveDate::parse_from_str(
    trimmed,
    ISO_FORMAT
  )
  .map_err(|e| {
    anyhow!("invalid date '{raw}': {e}")
  })
}

fn iso_pattern()
-> anyhow::Result<&'static Regex> {
  static ISO_RE: OnceLock<
    Result<Regex, regex::Error>
  > = OnceLock::new();
  ISO_RE
    .get_or_init(|| {
      Regex::new(r"^\d{4}-\d{2}-\d{2}$")
    })
    .as_ref()
    .map_err(|e| {
      anyhow!(
        "internal regex compile \
         failure: {e}"
      )
    })
}

#[must_use]
pub fn format_iso(
  date: NaiveDate
) -> String {
  date.format(ISO_FORMAT).to_string()
}

#[must_use]
pub fn format_day_month(
  date: NaiveDate
) -> String {
  date.format("%d/%m").to_string()
}


pub mod iso_date_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    date: &NaiveDate,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &super::format_iso(*date)
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<NaiveDate, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_iso_date(&raw)
      .map_err(serde::de::Error::custom)
  }
}
