//! Record sources and the read-through cache in front of them.
//!
//! The filter pipeline is stateless; anything that should not be re-read on
//! every pass is cached here, with a bounded lifetime and an explicit
//! [`CachedSource::invalidate`] for callers that just wrote to the store.

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::loader::{Table, load_table};
use crate::resolver::Field;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// The three sheets the application reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dataset {
    pub patients: Table,
    pub menu: Table,
    pub params: Table,
}

/// Something able to produce a fresh [`Dataset`].
pub trait RecordSource: Send + Sync {
    fn fetch(&self) -> Result<Dataset>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}

/// Sheets read from local files.
#[derive(Clone, Debug)]
pub struct FileSource {
    patients: (PathBuf, String),
    menu: (PathBuf, String),
    params: (PathBuf, String),
}

impl FileSource {
    pub fn new(settings: &Settings) -> Self {
        FileSource {
            patients: (settings.patients_path.clone(), settings.patients_sheet.clone()),
            menu: (settings.menu_location().to_path_buf(), settings.menu_sheet.clone()),
            params: (settings.params_location().to_path_buf(), settings.params_sheet.clone()),
        }
    }

    /// Menu and parameters are optional: a CSV patients file has no other
    /// sheets, and a workbook may lack them.
    fn optional(path: &Path, sheet: &str) -> Result<Table> {
        match load_table(path, sheet) {
            Ok(table) => Ok(table),
            Err(Error::SheetNotFound(_)) => Ok(Table::default()),
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(Table::default()),
            Err(e) => Err(e),
        }
    }
}

impl RecordSource for FileSource {
    fn fetch(&self) -> Result<Dataset> {
        let patients = load_table(&self.patients.0, &self.patients.1)?;
        let columns = patients.columns();
        for field in [Field::Name, Field::Date, Field::Category] {
            if !columns.contains(field) {
                warn!("no column found for `{}`; check the sheet headers", field);
            }
        }

        let same_csv = |p: &Path| p == self.patients.0 && is_csv(p);
        let menu = if same_csv(&self.menu.0) {
            Table::default()
        } else {
            Self::optional(&self.menu.0, &self.menu.1)?
        };
        let params = if same_csv(&self.params.0) {
            Table::default()
        } else {
            Self::optional(&self.params.0, &self.params.1)?
        };

        Ok(Dataset {
            patients,
            menu,
            params,
        })
    }

    fn describe(&self) -> String {
        self.patients.0.display().to_string()
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

struct CacheEntry {
    fetched_at: Instant,
    data: Arc<Dataset>,
}

/// Read-through cache with a time-to-live.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
}

impl<S: RecordSource> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        CachedSource {
            inner,
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// Cached dataset if still fresh, otherwise a newly fetched one.
    pub fn get(&self) -> Result<Arc<Dataset>> {
        {
            let entry = self.entry.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = entry.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    debug!("cache hit for {}", self.inner.describe());
                    return Ok(Arc::clone(&cached.data));
                }
            }
        }

        debug!("cache miss for {}", self.inner.describe());
        let data = Arc::new(self.inner.fetch()?);
        let mut entry = self.entry.write().unwrap_or_else(|e| e.into_inner());
        *entry = Some(CacheEntry {
            fetched_at: Instant::now(),
            data: Arc::clone(&data),
        });
        Ok(data)
    }

    /// Drop the cached dataset; the next [`get`](Self::get) refetches.
    pub fn invalidate(&self) {
        let mut entry = self.entry.write().unwrap_or_else(|e| e.into_inner());
        if entry.take().is_some() {
            info!("cache invalidated for {}", self.inner.describe());
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    impl RecordSource for Counting {
        fn fetch(&self) -> Result<Dataset> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Dataset {
                patients: Table {
                    headers: vec!["Nom".into()],
                    records: vec![Record::from([("Nom", format!("patient {n}").as_str())])],
                },
                ..Dataset::default()
            })
        }

        fn describe(&self) -> String {
            "counting".into()
        }
    }

    fn counting() -> Counting {
        Counting {
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn reuses_fresh_entry() {
        let cache = CachedSource::new(counting(), Duration::from_secs(60));
        let a = cache.get().unwrap();
        let b = cache.get().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalidate_forces_refetch() {
        let cache = CachedSource::new(counting(), Duration::from_secs(60));
        let a = cache.get().unwrap();
        cache.invalidate();
        let b = cache.get().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_ttl_never_caches() {
        let cache = CachedSource::new(counting(), Duration::ZERO);
        cache.get().unwrap();
        cache.get().unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
    }
}
