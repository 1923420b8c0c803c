use crate::normalize::normalize;
use crate::record::{Record, ResolvedRecord, ingest};
use crate::resolver::Field;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::str::FromStr;

/// Label shown for "no filter" in selection lists.
pub const ALL_LABEL: &str = "— Toutes —";

/// A categorical filter value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    /// Interpret a label coming from a selection list. Empty input, `all`
    /// and [`ALL_LABEL`] select everything; any other label is a value.
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed.is_empty() || trimmed == ALL_LABEL || trimmed.eq_ignore_ascii_case("all") {
            Selection::All
        } else {
            Selection::Only(label.to_string())
        }
    }

    fn accepts(&self, value: Option<&str>) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(wanted) => value == Some(wanted.as_str()),
        }
    }
}

/// Ordering applied after filtering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Most recent consultation first.
    #[default]
    RecentDate,
    /// Urgent, then moderate, then low.
    Priority,
    Name,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = normalize(s);
        match norm.as_str() {
            "recent_date" | "recent-date" | "recent date" | "date" | "recent" | "date (recent)" => {
                Ok(SortKey::RecentDate)
            }
            "priority" | "priorite" => Ok(SortKey::Priority),
            "name" | "nom" => Ok(SortKey::Name),
            _ => Err(format!("unknown sort key: {s}")),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::RecentDate => f.write_str("Date (récent)"),
            SortKey::Priority => f.write_str("Priorité"),
            SortKey::Name => f.write_str("Nom"),
        }
    }
}

/// Filter selections for one rendering pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Criteria {
    pub query: String,
    pub category: Selection,
    pub priority: Selection,
    pub sort: SortKey,
}

impl Criteria {
    /// Build criteria from raw UI labels. Unknown sort labels fall back to
    /// the default ordering.
    pub fn from_labels(
        query: Option<&str>,
        category: Option<&str>,
        priority: Option<&str>,
        sort: Option<&str>,
    ) -> Self {
        Criteria {
            query: query.unwrap_or_default().to_string(),
            category: Selection::from_label(category.unwrap_or_default()),
            priority: Selection::from_label(priority.unwrap_or_default()),
            sort: sort.and_then(|s| s.parse().ok()).unwrap_or_default(),
        }
    }
}

/// Rank of a priority label; lower is more urgent.
pub fn priority_rank(value: &str) -> Option<u8> {
    match normalize(value).as_str() {
        "urgent" => Some(0),
        "moyen" | "moderate" | "modere" => Some(1),
        "faible" | "low" => Some(2),
        _ => None,
    }
}

/// Filter and order `records` for display.
///
/// The input is left untouched; matching records are cloned into the
/// returned list.
///
/// # Examples
/// ```
/// use ophtatrack::filter::{Criteria, Selection, SortKey, filter_and_sort};
/// use ophtatrack::record::Record;
///
/// let records = vec![
///     Record::from([("Nom", "Dupont"), ("Pathologie", "Glaucome"), ("Date", "2024-03-01")]),
///     Record::from([("Nom", "Martin"), ("Pathologie", "Cataracte"), ("Date", "2024-05-10")]),
/// ];
/// let criteria = Criteria {
///     category: Selection::Only("Glaucome".into()),
///     sort: SortKey::RecentDate,
///     ..Criteria::default()
/// };
///
/// let shown = filter_and_sort(&records, &criteria);
/// assert_eq!(shown, vec![records[0].clone()]);
/// ```
pub fn filter_and_sort(records: &[Record], criteria: &Criteria) -> Vec<Record> {
    let views = ingest(records);
    filter_and_sort_resolved(&views, criteria)
        .into_iter()
        .map(|v| v.record().clone())
        .collect()
}

/// Same pipeline over records that were already resolved.
pub fn filter_and_sort_resolved<'a>(
    records: &[ResolvedRecord<'a>],
    criteria: &Criteria,
) -> Vec<ResolvedRecord<'a>> {
    let needle = normalize(&criteria.query);

    let mut kept: Vec<ResolvedRecord<'a>> = records
        .iter()
        .filter(|r| matches_query(r, &needle))
        .filter(|r| criteria.category.accepts(r.text(Field::Category).as_deref()))
        .filter(|r| criteria.priority.accepts(r.text(Field::Priority).as_deref()))
        .cloned()
        .collect();

    match criteria.sort {
        SortKey::RecentDate => {
            kept.sort_by_cached_key(|r| MissingLast(r.date(Field::Date).map(Reverse)))
        }
        SortKey::Priority => kept.sort_by_cached_key(|r| {
            MissingLast(r.text(Field::Priority).and_then(|p| priority_rank(&p)))
        }),
        SortKey::Name => {
            kept.sort_by_cached_key(|r| MissingLast(r.text(Field::Name).map(|n| normalize(&n))))
        }
    }

    kept
}

fn matches_query(record: &ResolvedRecord<'_>, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }

    [Field::Name, Field::Diagnosis, Field::Tags]
        .iter()
        .filter_map(|f| record.text(*f))
        .any(|value| normalize(&value).contains(needle))
}

/// Sort key wrapper placing absent values after every present one.
#[derive(PartialEq, Eq)]
struct MissingLast<T>(Option<T>);

impl<T: Ord> PartialOrd for MissingLast<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> Ord for MissingLast<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .map(|r| match r.get("Nom") {
                Some(v) => v.as_text().map(|t| t.into_owned()).unwrap_or_default(),
                None => String::new(),
            })
            .collect()
    }

    fn sample() -> Vec<Record> {
        vec![
            Record::from([
                ("Nom", "Dupont"),
                ("Pathologie", "Glaucome"),
                ("Diagnostic", "Glaucome chronique"),
                ("Priorité", "Faible"),
                ("Date", "2024-03-01"),
            ]),
            Record::from([
                ("Nom", "Martin"),
                ("Pathologie", "Cataracte"),
                ("Diagnostic", "Cataracte sénile"),
                ("Priorité", "Urgent"),
                ("Date", "2024-05-10"),
                ("Tags", "pré-op"),
            ]),
            Record::from([
                ("Nom", "Érard"),
                ("Pathologie", "Rétine"),
                ("Diagnostic", "DMLA"),
                ("Priorité", "Moyen"),
                ("Date", "bientôt"),
            ]),
        ]
    }

    #[test]
    fn empty_criteria_keep_everything() {
        let records = sample();
        let out = filter_and_sort(&records, &Criteria::default());
        assert_eq!(out.len(), records.len());
    }

    #[test]
    fn query_matches_diagnosis() {
        let records = vec![
            Record::from([("Diagnostic", "Glaucome chronique")]),
            Record::from([("Diagnostic", "Cataracte")]),
        ];
        let criteria = Criteria {
            query: "glaucome".into(),
            ..Criteria::default()
        };
        assert_eq!(filter_and_sort(&records, &criteria), vec![records[0].clone()]);
    }

    #[test]
    fn query_matches_any_of_name_diagnosis_tags() {
        let records = sample();
        let by = |q: &str| {
            let c = Criteria {
                query: q.into(),
                sort: SortKey::Name,
                ..Criteria::default()
            };
            names(&filter_and_sort(&records, &c))
        };

        assert_eq!(by("erard"), vec!["Érard"]);
        assert_eq!(by("SENILE"), vec!["Martin"]);
        assert_eq!(by("pre-op"), vec!["Martin"]);
        assert!(by("kératocône").is_empty());
    }

    #[test]
    fn query_fails_records_without_searchable_fields() {
        let records = vec![Record::from([("Date", "2024-03-01")])];
        let criteria = Criteria {
            query: "2024".into(),
            ..Criteria::default()
        };
        assert!(filter_and_sort(&records, &criteria).is_empty());
    }

    #[test]
    fn category_and_priority_are_exact() {
        let records = sample();
        let c = Criteria {
            category: Selection::Only("glaucome".into()),
            ..Criteria::default()
        };
        assert!(filter_and_sort(&records, &c).is_empty());

        let c = Criteria {
            priority: Selection::Only("Urgent".into()),
            ..Criteria::default()
        };
        assert_eq!(names(&filter_and_sort(&records, &c)), vec!["Martin"]);
    }

    #[test]
    fn missing_category_is_excluded() {
        let records = vec![Record::from([("Nom", "Sans catégorie")])];
        let c = Criteria {
            category: Selection::Only("Glaucome".into()),
            ..Criteria::default()
        };
        assert!(filter_and_sort(&records, &c).is_empty());
    }

    #[test]
    fn priority_order() {
        let records = vec![
            Record::from([("Nom", "a"), ("Priorité", "Faible")]),
            Record::from([("Nom", "b"), ("Priorité", "Inconnu")]),
            Record::from([("Nom", "c"), ("Priorité", "Urgent")]),
            Record::from([("Nom", "d"), ("Priorité", "Moyen")]),
        ];
        let c = Criteria {
            sort: SortKey::Priority,
            ..Criteria::default()
        };
        assert_eq!(names(&filter_and_sort(&records, &c)), vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn unparseable_date_sorts_last() {
        let records = sample();
        let out = filter_and_sort(&records, &Criteria::default());
        assert_eq!(names(&out), vec!["Martin", "Dupont", "Érard"]);
    }

    #[test]
    fn name_sort_ignores_accents() {
        let records = vec![
            Record::from([("Nom", "martin")]),
            Record::from([("Diagnostic", "anonyme")]),
            Record::from([("Nom", "Érard")]),
            Record::from([("Nom", "Dupont")]),
        ];
        let c = Criteria {
            sort: SortKey::Name,
            ..Criteria::default()
        };
        assert_eq!(names(&filter_and_sort(&records, &c)), vec!["Dupont", "Érard", "martin", ""]);
    }

    #[test]
    fn input_is_not_mutated() {
        let records = sample();
        let before = records.clone();
        let c = Criteria {
            sort: SortKey::Name,
            priority: Selection::Only("Urgent".into()),
            ..Criteria::default()
        };
        let _ = filter_and_sort(&records, &c);
        assert_eq!(records, before);
    }

    #[test]
    fn labels_from_the_ui() {
        assert_eq!(Selection::from_label(ALL_LABEL), Selection::All);
        assert_eq!(Selection::from_label("all"), Selection::All);
        assert_eq!(Selection::from_label(""), Selection::All);
        assert_eq!(Selection::from_label("Glaucome"), Selection::Only("Glaucome".into()));
        assert_eq!(Selection::from_label("Tous"), Selection::Only("Tous".into()));
        assert_eq!(Selection::from_label("Toutes"), Selection::Only("Toutes".into()));

        assert_eq!("Date (récent)".parse::<SortKey>(), Ok(SortKey::RecentDate));
        assert_eq!("Priorité".parse::<SortKey>(), Ok(SortKey::Priority));
        assert_eq!("nom".parse::<SortKey>(), Ok(SortKey::Name));
        assert!("taille".parse::<SortKey>().is_err());

        let c = Criteria::from_labels(Some("glau"), Some(ALL_LABEL), None, Some("???"));
        assert_eq!(c.sort, SortKey::RecentDate);
        assert_eq!(c.category, Selection::All);
    }

    #[test]
    fn ranks() {
        assert_eq!(priority_rank("URGENT"), Some(0));
        assert_eq!(priority_rank("Moderate"), Some(1));
        assert_eq!(priority_rank(" faible "), Some(2));
        assert_eq!(priority_rank("?"), None);
    }
}
