use std::cmp::Reverse;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::bucket::Dated;
use crate::datetime::iso_date_serde;
use crate::labels::Localized;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Classification {
    Imported,
    ImportedCloseContact,
    Local,
    LocalPossibly,
    LocalUnknownSource,
    LocalPossiblyCloseContact,
    LocalCloseContact,
    #[default]
    Unknown,
}

impl Classification {
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "imported" => Some(Self::Imported),
            "imported_close_contact" => Some(Self::ImportedCloseContact),
            "local" => Some(Self::Local),
            "local_possibly" => Some(Self::LocalPossibly),
            "local_unknown_source" => Some(Self::LocalUnknownSource),
            "local_possibly_close_contact" => Some(Self::LocalPossiblyCloseContact),
            "local_close_contact" => Some(Self::LocalCloseContact),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Imported => "imported",
            Self::ImportedCloseContact => "imported_close_contact",
            Self::Local => "local",
            Self::LocalPossibly => "local_possibly",
            Self::LocalUnknownSource => "local_unknown_source",
            Self::LocalPossiblyCloseContact => "local_possibly_close_contact",
            Self::LocalCloseContact => "local_close_contact",
            Self::Unknown => "unknown",
        }
    }
}

impl From<String> for Classification {
    fn from(value: String) -> Self {
        Self::from_key(&value).unwrap_or_default()
    }
}

impl From<Classification> for String {
    fn from(value: Classification) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Hospitalised,
    Discharged,
    Serious,
    Critical,
    Deceased,
    #[default]
    Unknown,
}

impl Status {
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "hospitalised" => Some(Self::Hospitalised),
            "discharged" => Some(Self::Discharged),
            "serious" => Some(Self::Serious),
            "critical" => Some(Self::Critical),
            "deceased" => Some(Self::Deceased),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hospitalised => "hospitalised",
            Self::Discharged => "discharged",
            Self::Serious => "serious",
            Self::Critical => "critical",
            Self::Deceased => "deceased",
            Self::Unknown => "unknown",
        }
    }
}

impl From<String> for Status {
    fn from(value: String) -> Self {
        Self::from_key(&value).unwrap_or_default()
    }
}

impl From<Status> for String {
    fn from(value: Status) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Gender {
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim() {
            "M" | "m" => Some(Self::Male),
            "F" | "f" => Some(Self::Female),
            "-" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
            Self::Unknown => "-",
        }
    }
}

impl From<String> for Gender {
    fn from(value: String) -> Self {
        Self::from_key(&value).unwrap_or_default()
    }
}

impl From<Gender> for String {
    fn from(value: Gender) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case_no: u32,

    #[serde(with = "iso_date_serde")]
    pub confirmation_date: NaiveDate,

    #[serde(default)]
    pub onset_date: Option<String>,

    #[serde(default)]
    pub age: Option<u32>,

    #[serde(default)]
    pub gender: Gender,

    #[serde(default)]
    pub classification: Classification,

    #[serde(default)]
    pub status: Status,

    #[serde(default, rename = "type")]
    pub case_type: Localized,

    #[serde(default)]
    pub classification_text: Localized,

    #[serde(default)]
    pub citizenship: Localized,

    #[serde(default)]
    pub hospital: Localized,

    #[serde(default)]
    pub detail: Localized,

    #[serde(default)]
    pub source_url: Option<String>,
}

impl CaseRecord {
    pub fn new(case_no: u32, confirmation_date: NaiveDate) -> Self {
        Self {
            case_no,
            confirmation_date,
            onset_date: None,
            age: None,
            gender: Gender::Unknown,
            classification: Classification::Unknown,
            status: Status::Unknown,
            case_type: Localized::default(),
            classification_text: Localized::default(),
            citizenship: Localized::default(),
            hospital: Localized::default(),
            detail: Localized::default(),
            source_url: None,
        }
    }
}

impl Dated for CaseRecord {
    fn confirmation_date(&self) -> NaiveDate {
        self.confirmation_date
    }
}

/// One row of a patient's movement history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEntry {
    pub case_no: u32,

    #[serde(with = "iso_date_serde")]
    pub start_date: NaiveDate,

    #[serde(with = "iso_date_serde")]
    pub end_date: NaiveDate,

    #[serde(default)]
    pub action: Localized,

    #[serde(default)]
    pub location: Localized,

    #[serde(default)]
    pub remarks: Localized,
}

/// Orders cases the way the dashboard feed does: newest confirmation first,
/// higher case number first within a day.
pub fn sort_most_recent_first(cases: &mut [CaseRecord]) {
    cases.sort_by_key(|case| (Reverse(case.confirmation_date), Reverse(case.case_no)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_enum_strings_fall_back() {
        let raw = r#"{"case_no":7,"confirmation_date":"2020-02-04","classification":"cruise_ship","status":"","gender":"X"}"#;
        let case: CaseRecord = serde_json::from_str(raw).expect("parse case");
        assert_eq!(case.classification, Classification::Unknown);
        assert_eq!(case.status, Status::Unknown);
        assert_eq!(case.gender, Gender::Unknown);
    }

    #[test]
    fn parses_full_record() {
        let raw = r#"{
            "case_no": 12,
            "confirmation_date": "2020-02-07",
            "onset_date": "2020-02-01",
            "age": 58,
            "gender": "F",
            "classification": "local_close_contact",
            "status": "discharged",
            "type": {"zh": "確診", "en": "Confirmed"},
            "hospital": {"en": "Princess Margaret Hospital"},
            "source_url": "https://example.org/12"
        }"#;
        let case: CaseRecord = serde_json::from_str(raw).expect("parse case");
        assert_eq!(case.case_no, 12);
        assert_eq!(case.age, Some(58));
        assert_eq!(case.gender, Gender::Female);
        assert_eq!(case.classification, Classification::LocalCloseContact);
        assert_eq!(case.status, Status::Discharged);
        assert_eq!(case.hospital.zh, None);

        let out = serde_json::to_value(&case).expect("serialize case");
        assert_eq!(out["classification"], "local_close_contact");
        assert_eq!(out["confirmation_date"], "2020-02-07");
        assert_eq!(out["type"]["en"], "Confirmed");
    }

    #[test]
    fn rejects_malformed_confirmation_date() {
        let raw = r#"{"case_no":1,"confirmation_date":"2020-2-4"}"#;
        assert!(serde_json::from_str::<CaseRecord>(raw).is_err());
    }

    #[test]
    fn sorts_newest_then_highest_case_number() {
        let day = |d| NaiveDate::from_ymd_opt(2020, 2, d).expect("valid date");
        let mut cases = vec![
            CaseRecord::new(1, day(1)),
            CaseRecord::new(3, day(5)),
            CaseRecord::new(2, day(5)),
            CaseRecord::new(4, day(3)),
        ];
        sort_most_recent_first(&mut cases);
        let order: Vec<u32> = cases.iter().map(|case| case.case_no).collect();
        assert_eq!(order, vec![3, 2, 4, 1]);
    }
}
