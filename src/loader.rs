use crate::attachments::AttachmentRef;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::resolver::{ColumnMap, Field, resolve};
use log::{info, warn};
use std::fs;
use std::path::Path;

/// Rows of one sheet, with the header row kept as found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Column resolution for this table's header row.
    pub fn columns(&self) -> ColumnMap {
        ColumnMap::resolve(self.headers.iter().map(String::as_str))
    }
}

/// Load a table from a CSV file
///
/// The first record holds the column headers. Quoted fields may contain
/// commas, doubled quotes and line breaks. Blank lines are skipped, cells past
/// the header width are ignored and empty cells are left out of the record.
///
/// # Arguments
/// * `filepath` - Path to the CSV file to load
///
/// # Examples
/// ```no_run
/// use ophtatrack::loader::from_csv;
///
/// match from_csv("patients.csv") {
///     Ok(table) => println!("Loaded {} patients", table.records.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<Table> {
    let path = filepath.as_ref();
    let content = fs::read_to_string(path)?;

    let mut rows = parse_csv(content.trim_start_matches('\u{feff}'))
        .into_iter()
        .filter(|cells| cells.iter().any(|c| !c.trim().is_empty()));
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| Error::EmptyFile(path.to_path_buf()))?
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let table = build_table(headers, rows.collect());

    info!("loaded {} records from {}", table.records.len(), path.display());
    Ok(table)
}

/// Build a table from already split cells, typing each cell by its column.
pub fn build_table(headers: Vec<String>, rows: Vec<Vec<String>>) -> Table {
    let photos = resolve(headers.iter().map(String::as_str), Field::Photos.aliases())
        .map(str::to_string);

    let records = rows
        .into_iter()
        .enumerate()
        .map(|(r, cells)| {
            let mut record = Record::new();
            for (header, cell) in headers.iter().zip(cells) {
                if cell.trim().is_empty() || header.is_empty() {
                    continue;
                }
                if photos.as_deref() == Some(header.as_str()) {
                    match parse_attachments(&cell) {
                        Some(list) => record.insert(header.clone(), list),
                        None => warn!("row {}: ignoring malformed `{}` cell", r + 2, header),
                    }
                } else {
                    record.insert(header.clone(), cell);
                }
            }
            record
        })
        .collect();

    Table { headers, records }
}

/// Photos cells hold a JSON list of `{ "key": ..., "url": ... }` objects.
fn parse_attachments(cell: &str) -> Option<Vec<AttachmentRef>> {
    serde_json::from_str(cell.trim()).ok()
}

/// Load a table from one sheet of an Excel workbook
///
/// The sheet is looked up through the same tolerant matching as column
/// headers, so "Parametres" finds "Paramètres". Date cells become
/// [`FieldValue::Date`](crate::record::FieldValue::Date).
#[cfg(feature = "excel")]
pub fn from_excel(filepath: impl AsRef<Path>, sheet: &str) -> Result<Table> {
    use calamine::{Data, DataType, Reader, open_workbook_auto};

    let path = filepath.as_ref();
    let mut workbook = open_workbook_auto(path)?;

    let names = workbook.sheet_names();
    let sheet_name = resolve(names.iter().map(String::as_str), &[sheet])
        .map(str::to_string)
        .ok_or_else(|| Error::SheetNotFound(sheet.to_string()))?;

    let range = workbook.worksheet_range(&sheet_name)?;
    let mut rows = range.rows();

    let headers: Vec<String> = match rows.next() {
        Some(row) => row.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => return Ok(Table::default()),
    };

    let mut cells_by_row = Vec::new();
    let mut dates = Vec::new();
    for row in rows {
        let r = cells_by_row.len();
        let mut cells = Vec::with_capacity(row.len());
        for (c, cell) in row.iter().enumerate() {
            match cell {
                Data::DateTime(_) | Data::DateTimeIso(_) => {
                    if let Some(date) = cell.as_date() {
                        dates.push((r, c, date));
                    }
                    cells.push(cell.to_string());
                }
                Data::Float(f) if f.fract() == 0.0 => cells.push(format!("{}", *f as i64)),
                Data::Empty => cells.push(String::new()),
                other => cells.push(other.to_string()),
            }
        }
        if cells.iter().any(|c| !c.trim().is_empty()) {
            cells_by_row.push(cells);
        }
    }

    let mut table = build_table(headers, cells_by_row);
    for (r, c, date) in dates {
        let header = table.headers.get(c).filter(|h| !h.is_empty()).cloned();
        if let (Some(header), Some(record)) = (header, table.records.get_mut(r)) {
            record.insert(header, crate::record::FieldValue::Date(date));
        }
    }

    info!(
        "loaded {} records from {} [{}]",
        table.records.len(),
        path.display(),
        sheet_name
    );
    Ok(table)
}

/// Load a table, choosing the reader from the file extension.
///
/// `sheet` is only used for workbooks.
pub fn load_table(filepath: impl AsRef<Path>, sheet: &str) -> Result<Table> {
    let path = filepath.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("csv") => from_csv(path),
        #[cfg(feature = "excel")]
        Some("xlsx") | Some("xls") | Some("ods") => from_excel(path, sheet),
        #[cfg(not(feature = "excel"))]
        Some("xlsx") | Some("xls") | Some("ods") => {
            let _ = sheet;
            Err(Error::ExcelDisabled)
        }
        Some(ext) => Err(Error::UnsupportedExtension(ext.to_string())),
        None => Err(Error::MissingExtension(path.to_path_buf())),
    }
}

/// Split CSV text into records of fields, honouring quotes.
///
/// Line breaks inside a quoted field belong to the field; outside quotes
/// they end the record (`\r\n` included).
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut row = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Doubled quote inside a quoted field
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => row.push(std::mem::take(&mut current_field)),
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' if !in_quotes => {
                row.push(std::mem::take(&mut current_field));
                records.push(std::mem::take(&mut row));
            }
            _ => current_field.push(c),
        }
    }

    if !current_field.is_empty() || !row.is_empty() {
        row.push(current_field);
        records.push(row);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;

    #[test]
    fn splits_quoted_fields() {
        assert_eq!(
            parse_csv(r#"Dupont,"Glaucome, chronique","dit ""urgent""",,"#),
            vec![vec!["Dupont", "Glaucome, chronique", r#"dit "urgent""#, "", ""]]
        );
    }

    #[test]
    fn quoted_line_breaks_stay_in_the_field() {
        let rows = parse_csv("Nom,Notes\r\nDupont,\"OD\n\nOG\"\r\nMartin,\n");
        assert_eq!(
            rows,
            vec![
                vec!["Nom", "Notes"],
                vec!["Dupont", "OD\n\nOG"],
                vec!["Martin", ""],
            ]
        );
    }

    #[test]
    fn types_cells_by_column() {
        let headers = vec!["Nom".to_string(), "Photos".to_string(), "Tags".to_string()];
        let rows = vec![
            vec![
                "Dupont".to_string(),
                r#"[{"key":"dupont/c1/oct_v1.png","url":"https://s/1"}]"#.to_string(),
                String::new(),
            ],
            vec!["Martin".to_string(), "MEDIA:42".to_string()],
        ];
        let table = build_table(headers, rows);

        let dupont = &table.records[0];
        assert_eq!(dupont.attachments().len(), 1);
        assert_eq!(dupont.get("Tags"), None);

        let martin = &table.records[1];
        assert_eq!(martin.get("Photos"), None);
        assert_eq!(martin.get("Nom"), Some(&FieldValue::from("Martin")));
    }

    #[cfg(feature = "excel")]
    #[test]
    fn reads_workbook_sheets() {
        use chrono::NaiveDate;
        use rust_xlsxwriter::{Format, Workbook, Worksheet};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suivi.xlsx");

        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let mut patients = Worksheet::new();
        patients.set_name("PATIENTS").unwrap();
        for (c, h) in ["Nom", "Téléphone", "Date de consultation", "Score"].iter().enumerate() {
            patients.write_string(0, c as u16, *h).unwrap();
        }
        patients.write_string(1, 0, "Dupont").unwrap();
        patients.write_number(1, 1, 612345678.0).unwrap();
        patients.write_number_with_format(1, 2, 45352.0, &date_format).unwrap();
        patients.write_number(1, 3, 1.5).unwrap();
        patients.write_string(3, 0, "Martin").unwrap();

        let mut params = Worksheet::new();
        params.set_name("Paramètres").unwrap();
        params.write_string(0, 0, "Clé").unwrap();
        params.write_string(0, 1, "Valeur").unwrap();
        params.write_string(1, 0, "Priorité").unwrap();
        params.write_string(1, 1, "Urgent").unwrap();

        let mut workbook = Workbook::new();
        workbook.push_worksheet(patients);
        workbook.push_worksheet(params);
        workbook.save(&path).unwrap();

        let table = load_table(&path, "Patients").unwrap();
        assert_eq!(table.records.len(), 2);
        let dupont = &table.records[0];
        assert_eq!(dupont.get("Téléphone"), Some(&FieldValue::from("612345678")));
        assert_eq!(
            dupont.get("Date de consultation"),
            Some(&FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
        );
        assert_eq!(dupont.get("Score"), Some(&FieldValue::from("1.5")));
        assert_eq!(table.records[1].get("Nom"), Some(&FieldValue::from("Martin")));

        let params = from_excel(&path, "Parametres").unwrap();
        assert_eq!(params.headers, vec!["Clé", "Valeur"]);
        assert!(matches!(from_excel(&path, "Menu"), Err(Error::SheetNotFound(_))));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(matches!(
            load_table("patients.txt", "Patients"),
            Err(Error::UnsupportedExtension(ext)) if ext == "txt"
        ));
        assert!(matches!(load_table("patients", "Patients"), Err(Error::MissingExtension(_))));
    }
}
