use crate::normalize::normalize;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Logical fields of a patient, consultation or event record.
///
/// Each variant carries a static alias set: the literal header spellings
/// that have been seen for it across sheet revisions, most preferred first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Phone,
    Date,
    Category,
    Diagnosis,
    Tags,
    Priority,
    NextVisit,
    Photos,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Name,
        Field::Phone,
        Field::Date,
        Field::Category,
        Field::Diagnosis,
        Field::Tags,
        Field::Priority,
        Field::NextVisit,
        Field::Photos,
    ];

    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Name => &["Nom du patient", "Nom", "Patient", "Name"],
            Field::Phone => &["Numéro de téléphone", "Telephone", "Téléphone", "Phone"],
            Field::Date => &["Date de consultation", "Date", "Date consultation"],
            Field::Category => &[
                "Pathologie / Catégorie",
                "Pathologie",
                "Catégorie",
                "Categorie",
                "Category",
            ],
            Field::Diagnosis => &["Diagnostic", "Diagnosis"],
            Field::Tags => &["Tags", "Mots-clés"],
            Field::Priority => &["Priorité (Faible/Moyen/Urgent)", "Priorité", "Priority"],
            Field::NextVisit => &[
                "Prochain rendez-vous / Suivi (date)",
                "Prochain rendez-vous",
                "Suivi",
            ],
            Field::Photos => &["Photos", "Pièces jointes", "Media"],
        }
    }

    /// Preferred header label, used when writing new tables.
    pub fn label(self) -> &'static str {
        self.aliases()[0]
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Find the actual field name matching the first candidate alias present.
///
/// Both sides are compared through [`normalize`]. When several actual names
/// normalize identically, the first one wins. Candidates are tried in order,
/// so the most preferred alias must come first.
///
/// # Examples
/// ```
/// use ophtatrack::resolver::resolve;
///
/// let headers = ["Nom", "Date de consultation", "Pathologie"];
/// assert_eq!(resolve(headers, &["Date", "date de CONSULTATION"]), Some("Date de consultation"));
/// assert_eq!(resolve(headers, &["Téléphone"]), None);
/// ```
pub fn resolve<'a, I, C>(actual_names: I, candidates: &[C]) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
    C: AsRef<str>,
{
    let mut by_normal: HashMap<String, &'a str> = HashMap::new();
    for name in actual_names {
        by_normal.entry(normalize(name)).or_insert(name);
    }

    candidates
        .iter()
        .find_map(|cand| by_normal.get(&normalize(cand.as_ref())).copied())
}

/// Resolution of every logical [`Field`] against one header set.
///
/// Built once per data source (or per distinct record shape) so that reads
/// do not renormalize headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: BTreeMap<Field, String>,
}

impl ColumnMap {
    pub fn resolve<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: Vec<&str> = names.into_iter().collect();
        let columns = Field::ALL
            .iter()
            .filter_map(|field| {
                resolve(names.iter().copied(), field.aliases())
                    .map(|actual| (*field, actual.to_string()))
            })
            .collect();

        ColumnMap { columns }
    }

    /// Actual header name for `field`, if the source has one.
    pub fn get(&self, field: Field) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    /// Fields the source does not provide.
    pub fn missing(&self) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|f| !self.columns.contains_key(f))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.columns.iter().map(|(f, name)| (*f, name.as_str()))
    }
}
