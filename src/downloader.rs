use crate::error::Result;
use crate::record::ResolvedRecord;
use crate::resolver::Field;

/// Columns shown in patient tables, in display order.
pub const DISPLAY_FIELDS: [Field; 7] = [
    Field::Name,
    Field::Category,
    Field::Diagnosis,
    Field::Date,
    Field::NextVisit,
    Field::Priority,
    Field::Phone,
];

/// The display columns present in at least one record.
pub fn display_fields(records: &[ResolvedRecord<'_>]) -> Vec<Field> {
    DISPLAY_FIELDS
        .iter()
        .copied()
        .filter(|f| records.iter().any(|r| r.has(*f)))
        .collect()
}

/// Header label for `field`: the literal header of the first record that
/// has it, so exports keep the sheet's own spelling.
pub fn column_label(records: &[ResolvedRecord<'_>], field: Field) -> String {
    records
        .iter()
        .find_map(|r| r.label(field))
        .unwrap_or(field.label())
        .to_string()
}

/// Cell text for one record and field; empty when absent.
pub fn cell_text(record: &ResolvedRecord<'_>, field: Field) -> String {
    record
        .text(field)
        .map(|t| t.into_owned())
        .unwrap_or_default()
}

/// Convert records to CSV format
///
/// One header row of column labels, then one row per record. Values holding
/// commas, quotes or newlines are quoted, with inner quotes doubled.
///
/// # Arguments
/// * `records` - Records to write, already filtered and sorted
/// * `fields` - Columns to include, in order
///
/// # Examples
/// ```
/// use ophtatrack::downloader::{display_fields, to_csv};
/// use ophtatrack::record::{Record, ingest};
///
/// let records = vec![Record::from([("Nom", "Dupont"), ("Diagnostic", "Glaucome, OD")])];
/// let views = ingest(&records);
/// let csv = to_csv(&views, &display_fields(&views));
/// assert_eq!(csv, "Nom,Diagnostic\nDupont,\"Glaucome, OD\"\n");
/// ```
pub fn to_csv(records: &[ResolvedRecord<'_>], fields: &[Field]) -> String {
    let mut csv_content = String::new();

    let header: Vec<String> = fields
        .iter()
        .map(|f| escape_csv(&column_label(records, *f)))
        .collect();
    csv_content.push_str(&header.join(","));
    csv_content.push('\n');

    for record in records {
        let row: Vec<String> = fields
            .iter()
            .map(|f| escape_csv(&cell_text(record, *f)))
            .collect();
        csv_content.push_str(&row.join(","));
        csv_content.push('\n');
    }

    csv_content
}

fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Convert records to XLSX format
///
/// Writes a single "Patients" worksheet with the same layout as
/// [`to_csv`]. Dates are written as text in ISO form.
#[cfg(feature = "excel")]
pub fn to_xlsx(records: &[ResolvedRecord<'_>], fields: &[Field]) -> Result<Vec<u8>> {
    use crate::error::Error;
    use rust_xlsxwriter::{Workbook, Worksheet};

    let export_err = |e: rust_xlsxwriter::XlsxError| Error::Export(e.to_string());

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name("Patients").map_err(export_err)?;

    for (c, field) in fields.iter().enumerate() {
        worksheet
            .write_string(0, c as u16, &column_label(records, *field))
            .map_err(export_err)?;
    }

    for (r, record) in records.iter().enumerate() {
        for (c, field) in fields.iter().enumerate() {
            let text = cell_text(record, *field);
            if !text.is_empty() {
                worksheet
                    .write_string((r + 1) as u32, c as u16, &text)
                    .map_err(export_err)?;
            }
        }
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer().map_err(export_err)
}

/// Write `records` to `path`, picking the format from the extension.
pub fn export(
    records: &[ResolvedRecord<'_>],
    fields: &[Field],
    path: impl AsRef<std::path::Path>,
) -> Result<()> {
    use crate::error::Error;

    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    let bytes = match extension.as_deref() {
        Some("csv") => to_csv(records, fields).into_bytes(),
        #[cfg(feature = "excel")]
        Some("xlsx") => to_xlsx(records, fields)?,
        #[cfg(not(feature = "excel"))]
        Some("xlsx") => return Err(Error::ExcelDisabled),
        Some(ext) => return Err(Error::UnsupportedExtension(ext.to_string())),
        None => return Err(Error::MissingExtension(path.to_path_buf())),
    };

    std::fs::write(path, bytes)?;
    log::info!("exported {} records to {}", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, ingest};

    #[test]
    fn display_columns_follow_fixed_order() {
        let records = vec![
            Record::from([("Téléphone", "0600"), ("Nom du patient", "Dupont")]),
            Record::from([("Nom", "Martin"), ("Priorité", "Urgent"), ("Notes", "x")]),
            Record::from([("Nom", "Petit"), ("Suivi", "2024-09-01")]),
        ];
        let views = ingest(&records);
        assert_eq!(
            display_fields(&views),
            vec![Field::Name, Field::NextVisit, Field::Priority, Field::Phone]
        );
        assert_eq!(column_label(&views, Field::NextVisit), "Suivi");
        assert_eq!(column_label(&views, Field::Name), "Nom du patient");
        assert_eq!(column_label(&views, Field::Date), "Date de consultation");
    }

    #[test]
    fn csv_escapes_and_fills_gaps() {
        let records = vec![
            Record::from([("Nom", "Dupont"), ("Diagnostic", "dit \"urgent\"")]),
            Record::from([("Nom", "Martin")]),
        ];
        let views = ingest(&records);
        let csv = to_csv(&views, &[Field::Name, Field::Diagnosis]);
        assert_eq!(csv, "Nom,Diagnostic\nDupont,\"dit \"\"urgent\"\"\"\nMartin,\n");
    }

    #[test]
    fn export_writes_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vue.csv");
        let records = vec![Record::from([("Nom", "Dupont")])];
        let views = ingest(&records);

        export(&views, &[Field::Name], &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Nom\nDupont\n");
        assert!(export(&views, &[Field::Name], dir.path().join("vue.pdf")).is_err());
    }
}
