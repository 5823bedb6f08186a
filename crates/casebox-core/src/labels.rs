use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::case::{Gender, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    Zh,
    #[default]
    En,
}

impl Language {
    /// Value stored under the `language` setting.
    pub fn key(self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::En => "en",
        }
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" | "zh-hk" | "zh_hk" => Ok(Self::Zh),
            "en" => Ok(Self::En),
            other => Err(anyhow!("unsupported language: {other}")),
        }
    }
}

/// Free text carried by a record in both display languages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Localized {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zh: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
}

impl Localized {
    pub fn new(zh: &str, en: &str) -> Self {
        Self {
            zh: Some(zh.to_string()),
            en: Some(en.to_string()),
        }
    }

    /// Text in `lang`, or `None` when that language is missing or blank.
    pub fn get(&self, lang: Language) -> Option<&str> {
        let value = match lang {
            Language::Zh => self.zh.as_deref(),
            Language::En => self.en.as_deref(),
        };
        value.map(str::trim).filter(|text| !text.is_empty())
    }

    pub fn contains(&self, needle: &regex::Regex) -> bool {
        [self.zh.as_deref(), self.en.as_deref()]
            .into_iter()
            .flatten()
            .any(|text| needle.is_match(text))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    OnsetDate,
    ConfirmDate,
    Citizenship,
    Hospital,
    Source,
}

pub fn text(lang: Language, label: Label) -> &'static str {
    match (lang, label) {
        (Language::En, Label::OnsetDate) => "Onset",
        (Language::En, Label::ConfirmDate) => "Confirmed",
        (Language::En, Label::Citizenship) => "Resident",
        (Language::En, Label::Hospital) => "Hospital",
        (Language::En, Label::Source) => "Source",
        (Language::Zh, Label::OnsetDate) => "發病日期",
        (Language::Zh, Label::ConfirmDate) => "確診日期",
        (Language::Zh, Label::Citizenship) => "居民身份",
        (Language::Zh, Label::Hospital) => "入住醫院",
        (Language::Zh, Label::Source) => "資料來源",
    }
}

pub fn status_text(lang: Language, status: Status) -> &'static str {
    match (lang, status) {
        (Language::En, Status::Hospitalised) => "Hospitalised",
        (Language::En, Status::Discharged) => "Discharged",
        (Language::En, Status::Serious) => "Serious",
        (Language::En, Status::Critical) => "Critical",
        (Language::En, Status::Deceased) => "Deceased",
        (Language::En, Status::Unknown) => "Pending",
        (Language::Zh, Status::Hospitalised) => "住院",
        (Language::Zh, Status::Discharged) => "出院",
        (Language::Zh, Status::Serious) => "嚴重",
        (Language::Zh, Status::Critical) => "危殆",
        (Language::Zh, Status::Deceased) => "死亡",
        (Language::Zh, Status::Unknown) => "待定",
    }
}

/// `None` for an unrecorded gender; the card leaves it out.
pub fn gender_text(lang: Language, gender: Gender) -> Option<&'static str> {
    match (lang, gender) {
        (_, Gender::Unknown) => None,
        (Language::En, Gender::Male) => Some("Male"),
        (Language::En, Gender::Female) => Some("Female"),
        (Language::Zh, Gender::Male) => Some("男"),
        (Language::Zh, Gender::Female) => Some("女"),
    }
}

pub fn age_text(lang: Language, age: u32) -> String {
    match lang {
        Language::En => format!("{age} years old"),
        Language::Zh => format!("{age}歲"),
    }
}
