//! Pathology menu and the choice lists offered to the filter bar.

use crate::filter::priority_rank;
use crate::loader::Table;
use crate::normalize::{contains_normalized, normalize};
use crate::record::ResolvedRecord;
use crate::resolver::{Field, resolve};
use serde::Serialize;
use std::collections::BTreeSet;

const DESCRIPTION_ALIASES: [&str; 2] = ["Description", "Libellé"];
const PARAM_KEY_ALIASES: [&str; 2] = ["Clé", "Key"];
const PARAM_VALUE_ALIASES: [&str; 2] = ["Valeur", "Value"];
const PRIORITY_PARAM: &str = "Priorité";

pub const DEFAULT_PRIORITIES: [&str; 3] = ["Faible", "Moyen", "Urgent"];

/// One line of the pathology menu.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub pathology: String,
    pub description: String,
}

/// Read menu entries from the menu sheet. Rows without a pathology are
/// skipped. Without a recognised pathology header the first column is used.
pub fn menu_entries(table: &Table) -> Vec<MenuEntry> {
    let headers = || table.headers.iter().map(String::as_str);
    let Some(pathology_col) = resolve(headers(), Field::Category.aliases())
        .or_else(|| headers().find(|h| !h.is_empty()))
    else {
        return Vec::new();
    };
    let description_col = resolve(headers(), &DESCRIPTION_ALIASES);

    table
        .records
        .iter()
        .filter_map(|record| {
            let pathology = record.get(pathology_col)?.as_text()?.trim().to_string();
            if pathology.is_empty() {
                return None;
            }
            let description = description_col
                .and_then(|col| record.get(col))
                .and_then(|v| v.as_text().map(|t| t.trim().to_string()))
                .unwrap_or_default();
            Some(MenuEntry {
                pathology,
                description,
            })
        })
        .collect()
}

/// Menu entries whose pathology contains `query`, ignoring case and
/// accents. An empty query returns every entry.
pub fn search_menu<'m>(entries: &'m [MenuEntry], query: &str) -> Vec<&'m MenuEntry> {
    entries
        .iter()
        .filter(|e| contains_normalized(&e.pathology, query))
        .collect()
}

/// Patients filed under `pathology` (exact match on the category field).
pub fn patients_for<'r, 'a>(
    pathology: &str,
    records: &'r [ResolvedRecord<'a>],
) -> Vec<&'r ResolvedRecord<'a>> {
    records
        .iter()
        .filter(|r| r.text(Field::Category).as_deref() == Some(pathology))
        .collect()
}

/// Category values for the filter bar, sorted and deduplicated.
///
/// Taken from the menu when it has entries, otherwise from the categories
/// patients are actually filed under.
pub fn category_choices(entries: &[MenuEntry], records: &[ResolvedRecord<'_>]) -> Vec<String> {
    let choices: BTreeSet<String> = if entries.is_empty() {
        records
            .iter()
            .filter_map(|r| r.text(Field::Category))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    } else {
        entries.iter().map(|e| e.pathology.clone()).collect()
    };
    choices.into_iter().collect()
}

/// Priority values from the parameters sheet (rows whose key is
/// "Priorité"), or the default Faible/Moyen/Urgent scale.
pub fn priority_choices(params: &Table) -> Vec<String> {
    let headers = || params.headers.iter().map(String::as_str);
    let (Some(key_col), Some(value_col)) = (
        resolve(headers(), &PARAM_KEY_ALIASES),
        resolve(headers(), &PARAM_VALUE_ALIASES),
    ) else {
        return default_priorities();
    };

    let wanted = normalize(PRIORITY_PARAM);
    let mut values: Vec<String> = params
        .records
        .iter()
        .filter(|r| {
            r.get(key_col)
                .and_then(|v| v.as_text())
                .is_some_and(|k| normalize(&k) == wanted)
        })
        .filter_map(|r| r.get(value_col)?.as_text().map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
        .collect();
    values.dedup();

    if values.is_empty() {
        default_priorities()
    } else {
        if let Some(unknown) = values.iter().find(|v| priority_rank(v).is_none()) {
            log::warn!("priority `{}` has no rank and will sort last", unknown);
        }
        values
    }
}

fn default_priorities() -> Vec<String> {
    DEFAULT_PRIORITIES.iter().map(|p| p.to_string()).collect()
}
