/*!
# OphtaTrack

Patient follow-up for a single ophthalmology practice, built in Rust.

## Overview

Patient, consultation and event records live in spreadsheet-like stores
whose column headers drift from one sheet revision to the next ("Date de
consultation" vs "Date", "Catégorie" vs "CATEGORIE"). This crate reads
those records tolerantly and prepares them for display:

- every header is compared through a canonical form (accents, case and
  whitespace removed),
- each logical field (patient name, date, pathology, priority, ...) is
  resolved once per sheet against a static list of known spellings,
- the resulting records are filtered by free text, pathology and priority,
  then sorted by date, priority or name.

## Architecture

### Core (pure, synchronous)
- **normalize**: canonical form of labels
- **resolver**: logical field to actual header resolution
- **record**: typed field values, attachment references, resolved views
- **filter**: query/filter/sort pipeline

### Edges
- **loader**: CSV and (feature `excel`) XLSX sheets to tables
- **source**: record sources and the TTL read-through cache
- **config**: JSON settings with environment overrides
- **menu**: pathology menu, category and priority choices
- **contact**: call and WhatsApp links
- **attachments**: photo storage keys and versioning
- **downloader**: table views and CSV/XLSX export
- **app** (feature `web`): JSON HTTP API

## Example

```
use ophtatrack::filter::{Criteria, SortKey, filter_and_sort};
use ophtatrack::record::Record;

let records = vec![
    Record::from([("Nom", "Dupont"), ("Priorité", "Faible")]),
    Record::from([("Nom", "Martin"), ("Priorité", "Urgent")]),
];
let criteria = Criteria { sort: SortKey::Priority, ..Criteria::default() };

let shown = filter_and_sort(&records, &criteria);
assert_eq!(shown[0], records[1]);
```
*/

#[cfg(feature = "web")]
pub mod app;
pub mod attachments;
pub mod config;
pub mod contact;
pub mod downloader;
pub mod error;
pub mod filter;
pub mod loader;
pub mod menu;
pub mod normalize;
pub mod record;
pub mod resolver;
pub mod source;

pub use error::{Error, Result};
pub use filter::{Criteria, Selection, SortKey, filter_and_sort};
pub use normalize::normalize;
pub use record::{FieldValue, Record, ResolvedRecord, ingest};
pub use resolver::{ColumnMap, Field, resolve};
