use crate::attachments::AttachmentRef;
use crate::resolver::{ColumnMap, Field};
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, warn};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

/// Value held by a record field.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Attachments(Vec<AttachmentRef>),
}

impl FieldValue {
    /// Text rendering of the value. Attachment lists have none.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            FieldValue::Text(s) => Some(Cow::Borrowed(s.as_str())),
            FieldValue::Date(d) => Some(Cow::Owned(d.format("%Y-%m-%d").to_string())),
            FieldValue::Attachments(_) => None,
        }
    }

    /// Calendar date of the value, parsing text when needed.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            FieldValue::Text(s) => parse_date(s),
            FieldValue::Attachments(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Date(_) => false,
            FieldValue::Attachments(list) => list.is_empty(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

impl From<Vec<AttachmentRef>> for FieldValue {
    fn from(list: Vec<AttachmentRef>) -> Self {
        FieldValue::Attachments(list)
    }
}

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M",
];

/// Parse a calendar date written the way clinic sheets write them.
///
/// ISO dates and day-first French dates are accepted, with or without a
/// time part. Anything else is `None`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// One patient, consultation or event entry.
///
/// Field names are kept exactly as the source spelled them and in source
/// order. Use [`ResolvedRecord`] (via [`ingest`]) to read logical fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Record { fields: Vec::new() }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a field. An existing field with the same literal name is updated
    /// in place and keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Attachment references held by the record's photos field.
    pub fn attachments(&self) -> &[AttachmentRef] {
        match self.photos_slot() {
            Some(idx) => match &self.fields[idx].1 {
                FieldValue::Attachments(list) => list.as_slice(),
                _ => &[],
            },
            None => &[],
        }
    }

    /// Attach a photo to this record. Returns `false` if a reference with the
    /// same key is already attached, or if the photos field holds a value
    /// that is not an attachment list (it is left untouched).
    pub fn add_attachment(&mut self, attachment: AttachmentRef) -> bool {
        let idx = match self.photos_slot() {
            Some(idx) => idx,
            None => {
                self.fields
                    .push((Field::Photos.label().to_string(), FieldValue::Attachments(Vec::new())));
                self.fields.len() - 1
            }
        };

        let (name, slot) = &mut self.fields[idx];
        match slot {
            FieldValue::Attachments(list) => {
                if list.iter().any(|a| a.key == attachment.key) {
                    return false;
                }
                list.push(attachment);
                true
            }
            _ => {
                warn!("`{}` does not hold attachments; not attaching {}", name, attachment.key);
                false
            }
        }
    }

    /// Detach one photo. The reference is handed back so the storage side
    /// can revoke it.
    pub fn remove_attachment(&mut self, key: &str) -> Option<AttachmentRef> {
        let idx = self.photos_slot()?;
        match &mut self.fields[idx].1 {
            FieldValue::Attachments(list) => {
                let pos = list.iter().position(|a| a.key == key)?;
                Some(list.remove(pos))
            }
            _ => None,
        }
    }

    /// Drain every attachment, for cascading deletion of the record.
    pub fn take_attachments(&mut self) -> Vec<AttachmentRef> {
        match self.photos_slot() {
            Some(idx) => match &mut self.fields[idx].1 {
                FieldValue::Attachments(list) => std::mem::take(list),
                _ => Vec::new(),
            },
            None => Vec::new(),
        }
    }

    fn photos_slot(&self) -> Option<usize> {
        let name = crate::resolver::resolve(self.field_names(), Field::Photos.aliases())?;
        self.fields.iter().position(|(n, _)| n == name)
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Record {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A record seen through its logical fields.
///
/// Resolution happens once, at ingestion; reads are plain map lookups.
#[derive(Clone, Debug)]
pub struct ResolvedRecord<'a> {
    record: &'a Record,
    fields: BTreeMap<Field, (&'a str, &'a FieldValue)>,
}

impl<'a> ResolvedRecord<'a> {
    pub fn new(record: &'a Record, columns: &ColumnMap) -> Self {
        let fields = columns
            .iter()
            .filter_map(|(field, name)| {
                record
                    .fields
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(n, v)| (field, (n.as_str(), v)))
            })
            .collect();

        ResolvedRecord { record, fields }
    }

    pub fn record(&self) -> &'a Record {
        self.record
    }

    pub fn get(&self, field: Field) -> Option<&'a FieldValue> {
        self.fields.get(&field).map(|(_, v)| *v)
    }

    /// Literal header the value was read from.
    pub fn label(&self, field: Field) -> Option<&'a str> {
        self.fields.get(&field).map(|(n, _)| *n)
    }

    pub fn text(&self, field: Field) -> Option<Cow<'a, str>> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn date(&self, field: Field) -> Option<NaiveDate> {
        self.get(field).and_then(FieldValue::as_date)
    }

    pub fn has(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }
}

/// Resolve a batch of records.
///
/// Records sharing the same field names (the usual case for rows of one
/// sheet) share one [`ColumnMap`].
pub fn ingest(records: &[Record]) -> Vec<ResolvedRecord<'_>> {
    let mut maps: HashMap<Vec<&str>, ColumnMap> = HashMap::new();

    let resolved: Vec<ResolvedRecord<'_>> = records
        .iter()
        .map(|record| {
            let shape: Vec<&str> = record.field_names().collect();
            let columns = maps
                .entry(shape)
                .or_insert_with_key(|names| ColumnMap::resolve(names.iter().copied()));
            ResolvedRecord::new(record, columns)
        })
        .collect();

    debug!("ingested {} records with {} distinct shapes", records.len(), maps.len());
    resolved
}
