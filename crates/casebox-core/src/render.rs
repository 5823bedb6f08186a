use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::bucket::Bucket;
use crate::case::{CaseRecord, Classification, TrackEntry};
use crate::config::Config;
use crate::datetime::{format_day_month, format_iso};
use crate::labels::{self, Label, Language};
use crate::palette::PaletteEntry;

const CARD_WIDTH: usize = 60;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    language: Language,
    per_row: usize,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true) && io::stdout().is_terminal();

        let language = cfg
            .get("language")
            .map(|raw| raw.parse::<Language>())
            .transpose()?
            .unwrap_or_default();

        let per_row = match cfg.get("boxes.per_row") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow!("invalid boxes.per_row setting: {raw}"))?,
            None => 12,
        };

        Ok(Self {
            color,
            language,
            per_row,
        })
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    #[tracing::instrument(skip(self, buckets))]
    pub fn print_case_boxes(&self, buckets: &[Bucket<'_, CaseRecord>]) -> anyhow::Result<()> {
        self.write_case_boxes(io::stdout().lock(), buckets)
    }

    #[tracing::instrument(skip(self, case, track))]
    pub fn print_case_card(&self, case: &CaseRecord, track: &[TrackEntry]) -> anyhow::Result<()> {
        self.write_case_card(io::stdout().lock(), case, track)
    }

    #[tracing::instrument(skip(self, cases))]
    pub fn print_case_table(&self, cases: &[CaseRecord]) -> anyhow::Result<()> {
        self.write_case_table(io::stdout().lock(), cases)
    }

    /// One header line per bucket followed by its case tiles, `per_row`
    /// tiles to a line.
    pub fn write_case_boxes<W: Write>(
        &self,
        mut out: W,
        buckets: &[Bucket<'_, CaseRecord>],
    ) -> anyhow::Result<()> {
        for (idx, bucket) in buckets.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            writeln!(out, "{}", self.paint(&bucket.label.to_string(), "1"))?;

            for row in bucket.cases.chunks(self.per_row) {
                let tiles: Vec<String> = row.iter().map(|case| self.case_tile(case)).collect();
                writeln!(out, "{}", tiles.join(" "))?;
            }
        }
        Ok(())
    }

    pub fn write_case_card<W: Write>(
        &self,
        mut out: W,
        case: &CaseRecord,
        track: &[TrackEntry],
    ) -> anyhow::Result<()> {
        let lang = self.language;
        let status = case.status.palette();

        writeln!(out, "{}", self.paint(&"━".repeat(CARD_WIDTH), &status.main.fg_code()))?;

        let title = match case.case_type.get(lang) {
            Some(kind) => format!("#{} ({kind})", case.case_no),
            None => format!("#{}", case.case_no),
        };
        let status_chip = self.paint(
            &format!("( {} )", labels::status_text(lang, case.status)),
            &status.main.fg_code(),
        );
        writeln!(out, "{}", two_column(&title, &status_chip))?;

        let patient: Vec<String> = [
            case.age.map(|age| labels::age_text(lang, age)),
            labels::gender_text(lang, case.gender).map(str::to_string),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !patient.is_empty() {
            writeln!(out, "{}", patient.join(" "))?;
        }

        if let Some(chip) = self.classification_chip(case) {
            writeln!(out, "{chip}")?;
        }

        let confirmed = labelled(lang, Label::ConfirmDate, &format_iso(case.confirmation_date));
        match case.onset_date.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(onset) => {
                let onset = labelled(lang, Label::OnsetDate, onset);
                writeln!(out, "{}", two_column(&onset, &confirmed))?;
            }
            None => writeln!(out, "{confirmed}")?,
        }

        writeln!(
            out,
            "{}",
            two_column(
                &labelled(lang, Label::Citizenship, case.citizenship.get(lang).unwrap_or("-")),
                &labelled(lang, Label::Hospital, case.hospital.get(lang).unwrap_or("-")),
            )
        )?;

        if let Some(detail) = case.detail.get(lang) {
            writeln!(out)?;
            writeln!(out, "{detail}")?;
        }

        if let Some(url) = case.source_url.as_deref().filter(|u| !u.trim().is_empty()) {
            writeln!(out, "{}", labelled(lang, Label::Source, url))?;
        }

        for entry in track {
            writeln!(out, "{}", "─".repeat(CARD_WIDTH))?;
            writeln!(
                out,
                "{}",
                two_column(&track_dates(entry), entry.action.get(lang).unwrap_or("-"))
            )?;
            writeln!(out, "{}", entry.location.get(lang).unwrap_or("-"))?;
            if let Some(remarks) = entry.remarks.get(lang) {
                writeln!(out, "{remarks}")?;
            }
        }

        Ok(())
    }

    pub fn write_case_table<W: Write>(&self, out: W, cases: &[CaseRecord]) -> anyhow::Result<()> {
        let headers = vec![
            "No.".to_string(),
            "Confirmed".to_string(),
            "Status".to_string(),
            "Classification".to_string(),
        ];

        let rows = cases
            .iter()
            .map(|case| {
                let classification = case.classification.palette();
                vec![
                    self.paint(&case.case_no.to_string(), "33"),
                    format_iso(case.confirmation_date),
                    self.paint(
                        labels::status_text(self.language, case.status),
                        &case.status.palette().main.fg_code(),
                    ),
                    self.paint(
                        &classification_text(case, self.language),
                        &classification.main.fg_code(),
                    ),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn case_tile(&self, case: &CaseRecord) -> String {
        let number = format!("{:>4}", case.case_no);
        if !self.color {
            return format!("[{number}]");
        }

        let border = case.status.palette().main.fg_code();
        let fill = tile_codes(case.classification.palette());
        format!(
            "{}{}{}",
            self.paint("[", &border),
            self.paint(&number, &fill),
            self.paint("]", &border)
        )
    }

    fn classification_chip(&self, case: &CaseRecord) -> Option<String> {
        if case.classification == Classification::Unknown
            && case.classification_text.get(self.language).is_none()
        {
            return None;
        }

        let text = format!(" {} ", classification_text(case, self.language));
        Some(self.paint(&text, &tile_codes(case.classification.palette())))
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn tile_codes(entry: PaletteEntry) -> String {
    format!("1;{};{}", entry.main.bg_code(), entry.contrast_text.fg_code())
}

fn classification_text(case: &CaseRecord, lang: Language) -> String {
    case.classification_text
        .get(lang)
        .map(str::to_string)
        .unwrap_or_else(|| case.classification.as_str().replace('_', " "))
}

fn labelled(lang: Language, label: Label, value: &str) -> String {
    format!("{}: {value}", labels::text(lang, label))
}

fn track_dates(entry: &TrackEntry) -> String {
    if entry.start_date == entry.end_date {
        format_iso(entry.end_date)
    } else {
        format!(
            "{} - {}",
            format_day_month(entry.start_date),
            format_day_month(entry.end_date)
        )
    }
}

/// Left text, then right text pushed to the card's right edge.
fn two_column(left: &str, right: &str) -> String {
    let used = visible_width(left) + visible_width(right);
    let gap = CARD_WIDTH.saturating_sub(used).max(1);
    format!("{left}{}{right}", " ".repeat(gap))
}

fn visible_width(s: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(s).as_str())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(visible_width(cell));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let padding = widths[idx].saturating_sub(visible_width(cell));
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
