#![cfg(not(tarpaulin_include))]

use clap::{Parser, Subcommand};
use ophtatrack::config::Settings;
use ophtatrack::contact::ContactLinks;
use ophtatrack::downloader::{cell_text, column_label, display_fields, export};
use ophtatrack::filter::{Criteria, SortKey, filter_and_sort_resolved};
use ophtatrack::menu;
use ophtatrack::normalize::normalize;
use ophtatrack::record::{ResolvedRecord, ingest};
use ophtatrack::resolver::Field;
use ophtatrack::source::{FileSource, RecordSource};
use std::path::PathBuf;

/// Patient follow-up for an ophthalmology practice
#[derive(Parser, Debug)]
#[command(name = "ophtatrack", version)]
struct Cli {
    /// Settings file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Patients workbook or CSV file
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List patients, filtered and sorted
    Patients {
        /// Search in name, diagnosis and tags
        #[arg(short, long, default_value = "")]
        query: String,

        /// Pathology / category to keep
        #[arg(long)]
        category: Option<String>,

        /// Priority to keep (Faible, Moyen, Urgent)
        #[arg(long)]
        priority: Option<String>,

        /// date, priority or name
        #[arg(short, long)]
        sort: Option<SortKey>,

        /// Write the listed patients to a .csv or .xlsx file
        #[arg(short, long)]
        export: Option<PathBuf>,
    },
    /// Pathology menu with patient counts
    Menu {
        #[arg(short, long, default_value = "")]
        query: String,
    },
    /// Call and WhatsApp links for a patient
    Contact { name: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    }
    .with_env();
    if let Some(data) = cli.data {
        settings.patients_path = data;
    }

    let data = FileSource::new(&settings).fetch()?;
    let views = ingest(&data.patients.records);

    match cli.command {
        Command::Patients {
            query,
            category,
            priority,
            sort,
            export: export_path,
        } => {
            let criteria = Criteria {
                query,
                sort: sort.unwrap_or(settings.default_sort),
                ..Criteria::from_labels(None, category.as_deref(), priority.as_deref(), None)
            };
            let shown = filter_and_sort_resolved(&views, &criteria);
            let fields = display_fields(&shown);

            if fields.is_empty() {
                println!("Aucune colonne trouvée à afficher. Vérifie les entêtes.");
            } else {
                print_table(&shown, &fields);
            }
            println!("{} / {} patients", shown.len(), views.len());

            if let Some(path) = export_path {
                export(&shown, &fields, &path)?;
                println!("exported to {}", path.display());
            }
        }
        Command::Menu { query } => {
            let entries = menu::menu_entries(&data.menu);
            for entry in menu::search_menu(&entries, &query) {
                let count = menu::patients_for(&entry.pathology, &views).len();
                if entry.description.is_empty() {
                    println!("{} ({})", entry.pathology, count);
                } else {
                    println!("{} — {} ({})", entry.pathology, entry.description, count);
                }
            }
        }
        Command::Contact { name } => {
            let wanted = normalize(&name);
            let found = views
                .iter()
                .find(|v| v.text(Field::Name).is_some_and(|n| normalize(&n) == wanted));

            match found.and_then(ContactLinks::for_record) {
                Some(links) => {
                    println!("Appeler {}: {}", links.number, links.tel);
                    println!("WhatsApp: {}", links.whatsapp);
                    if links.needs_international_prefix {
                        println!("Pour WhatsApp, utilise le format international (ex. +2126…).");
                    }
                }
                None => eprintln!("no phone number found for {}", name),
            }
        }
    }

    Ok(())
}

fn print_table(records: &[ResolvedRecord<'_>], fields: &[Field]) {
    let headers: Vec<String> = fields.iter().map(|f| column_label(records, *f)).collect();
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| fields.iter().map(|f| cell_text(r, *f)).collect())
        .collect();

    let widths: Vec<usize> = (0..fields.len())
        .map(|c| {
            rows.iter()
                .map(|row| row[c].chars().count())
                .chain(std::iter::once(headers[c].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", line(&headers));
    for row in &rows {
        println!("{}", line(row));
    }
}
