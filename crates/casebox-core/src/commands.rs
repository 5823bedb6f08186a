use std::io::{self, Read};

use anyhow::{Context, anyhow};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::bucket::{group_by_recency, unbucketed};
use crate::case::{CaseRecord, TrackEntry, sort_most_recent_first};
use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::filter::Filter;
use crate::render::Renderer;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "boxes", "groups", "card", "list", "import", "_show", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();

    debug!(
        command,
        filter = ?inv.filter_terms,
        args = ?inv.command_args,
        "dispatching command"
    );

    match command {
        "boxes" => cmd_boxes(store, cfg, renderer, &inv.filter_terms),
        "groups" => cmd_groups(store, cfg, &inv.filter_terms),
        "card" => cmd_card(store, renderer, &inv.filter_terms, &inv.command_args),
        "list" => cmd_list(store, renderer, &inv.filter_terms),
        "import" => cmd_import(store, &inv.command_args),
        "_show" => cmd_show(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Loads the cases matching `filter_terms`, newest first.
#[instrument(skip(store))]
pub fn load_selected(store: &DataStore, filter_terms: &[String]) -> anyhow::Result<Vec<CaseRecord>> {
    let filter = Filter::parse(filter_terms)?;
    if filter.is_empty() {
        debug!("no filter terms, selecting every case");
    }
    let mut cases: Vec<CaseRecord> = store
        .load_cases()?
        .into_iter()
        .filter(|case| filter.matches(case))
        .collect();
    sort_most_recent_first(&mut cases);

    debug!(count = cases.len(), "selected cases");
    Ok(cases)
}

#[instrument(skip(store, cfg, renderer, filter_terms))]
fn cmd_boxes(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    filter_terms: &[String],
) -> anyhow::Result<()> {
    info!("command boxes");

    let start = cfg.start_date()?;
    let cases = load_selected(store, filter_terms)?;
    let buckets = group_by_recency(&cases, start)?;

    let hidden = unbucketed(&cases, start)?;
    if !hidden.is_empty() {
        warn!(
            count = hidden.len(),
            %start,
            "cases confirmed on or before the start date are not shown"
        );
    }

    renderer.print_case_boxes(&buckets)
}

#[instrument(skip(store, cfg, filter_terms))]
fn cmd_groups(store: &DataStore, cfg: &Config, filter_terms: &[String]) -> anyhow::Result<()> {
    info!("command groups");

    let start = cfg.start_date()?;
    let cases = load_selected(store, filter_terms)?;
    let buckets = group_by_recency(&cases, start)?;

    let out = serde_json::to_string_pretty(&buckets)?;
    println!("{out}");
    Ok(())
}

#[instrument(skip(store, renderer, filter_terms, args))]
fn cmd_card(
    store: &DataStore,
    renderer: &Renderer,
    filter_terms: &[String],
    args: &[String],
) -> anyhow::Result<()> {
    info!("command card");

    let mut terms = filter_terms.to_vec();
    terms.extend(args.iter().cloned());
    if terms.is_empty() {
        return Err(anyhow!("card: expected a case number or filter"));
    }

    let cases = if args.is_empty() {
        let selected = load_selected(store, &terms)?;
        if selected.is_empty() {
            return Err(anyhow!("card: no case matches {}", terms.join(" ")));
        }
        selected
    } else {
        let selected = load_selected(store, filter_terms)?;
        args.iter()
            .map(|arg| {
                let case_no = parse_case_no(arg)?;
                selected
                    .iter()
                    .find(|case| case.case_no == case_no)
                    .cloned()
                    .ok_or_else(|| anyhow!("no case #{case_no}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    for (idx, case) in cases.iter().enumerate() {
        if idx > 0 {
            println!();
        }
        let track = store.tracks_for(case.case_no)?;
        renderer.print_case_card(case, &track)?;
    }

    Ok(())
}

#[instrument(skip(store, renderer, filter_terms))]
fn cmd_list(store: &DataStore, renderer: &Renderer, filter_terms: &[String]) -> anyhow::Result<()> {
    info!("command list");

    let cases = load_selected(store, filter_terms)?;
    renderer.print_case_table(&cases)?;
    println!("{} cases", cases.len());
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_import(store: &DataStore, args: &[String]) -> anyhow::Result<()> {
    info!("command import");

    let kind = args.first().map(String::as_str).unwrap_or("cases");

    let mut stdin = String::new();
    io::stdin()
        .read_to_string(&mut stdin)
        .context("failed reading stdin")?;

    let trimmed = stdin.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("import: empty input"));
    }

    match kind {
        "cases" => {
            let incoming: Vec<CaseRecord> = parse_import_items(trimmed)?;
            let mut cases = store.load_cases()?;
            let (added, updated) = merge_cases(&mut cases, incoming);
            store.save_cases(&cases)?;
            println!("Imported cases: {added} added, {updated} updated.");
        }
        "tracks" => {
            let incoming: Vec<TrackEntry> = parse_import_items(trimmed)?;
            let added = incoming.len();
            let mut tracks = store.load_tracks()?;
            tracks.extend(incoming);
            store.save_tracks(&tracks)?;
            println!("Imported tracks: {added} added.");
        }
        other => return Err(anyhow!("import: unknown kind '{other}', expected cases or tracks")),
    }

    Ok(())
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        println!("{k}={v}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Usage: casebox [options] [filter] [command] [args]\n\n\
         Commands:\n  \
         boxes              case boxes grouped by recency (default)\n  \
         groups             the same grouping as JSON\n  \
         card <no>...       case cards with movement history\n  \
         list               table of cases\n  \
         import [cases|tracks]  read JSON from stdin into the data files\n\n\
         Options:\n  \
         -l, --lang <zh|en>      display language\n  \
         --start <YYYY-MM-DD>    earliest date of the box grid\n  \
         --no-color              plain output\n  \
         --rc KEY=VALUE          override a caseboxrc setting\n\n\
         Filter terms: <no>, classification:<v>, status:<v>, gender:<M|F|->,\n  \
         since:<YYYY-MM-DD>, until:<YYYY-MM-DD>, detail~<regex>\n  \
         Several case numbers select any of them; other terms must all hold."
    );
    Ok(())
}

fn parse_case_no(raw: &str) -> anyhow::Result<u32> {
    raw.trim()
        .trim_start_matches('#')
        .parse::<u32>()
        .map_err(|_| anyhow!("invalid case number: {raw}"))
}

/// Accepts either a JSON array or a single JSON object.
fn parse_import_items<T: DeserializeOwned>(raw: &str) -> anyhow::Result<Vec<T>> {
    if raw.starts_with('[') {
        serde_json::from_str(raw).context("import: invalid JSON array")
    } else {
        let item = serde_json::from_str(raw).context("import: invalid JSON object")?;
        Ok(vec![item])
    }
}

/// Replaces cases with a matching number, appends the rest.
fn merge_cases(cases: &mut Vec<CaseRecord>, incoming: Vec<CaseRecord>) -> (usize, usize) {
    let mut added = 0;
    let mut updated = 0;

    for case in incoming {
        match cases.iter_mut().find(|existing| existing.case_no == case.case_no) {
            Some(existing) => {
                *existing = case;
                updated += 1;
            }
            None => {
                cases.push(case);
                added += 1;
            }
        }
    }

    (added, updated)
}
