use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use csv::StringRecord;
use rust_decimal::Decimal;
use shelfsync_core::{AppConfig, ProductRecord, CATALOG_COLUMNS};
use tempfile::NamedTempFile;

use crate::error::StoreError;

/// The catalog file on disk.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.catalog_path())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the stored snapshot with `records`.
    ///
    /// The new file is written and fsynced next to the target, then renamed
    /// over it. An empty slice produces a header-only file: a confirmed
    /// empty catalog, as opposed to no file at all.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if any step fails; the previous file is then
    /// left exactly as it was.
    pub fn replace(&self, records: &[ProductRecord]) -> Result<(), StoreError> {
        self.swap_in(|file| {
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(CATALOG_COLUMNS)?;
            for record in records {
                writer.write_record(to_row(record))?;
            }
            writer.flush().map_err(|source| self.io_err(source))
        })?;

        tracing::info!(
            path = %self.path.display(),
            records = records.len(),
            "catalog replaced"
        );
        Ok(())
    }

    /// Writes a temp file next to the target with `write`, fsyncs it and
    /// renames it over the target. On any error the temp file is removed.
    fn swap_in(
        &self,
        write: impl FnOnce(&mut File) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        write(tmp.as_file_mut())?;
        tmp.as_file()
            .sync_all()
            .map_err(|source| self.io_err(source))?;

        tmp.persist(&self.path).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;
        Ok(())
    }

    /// Reads the stored snapshot.
    ///
    /// Returns `Ok(None)` when nothing was ever stored and `Ok(Some(vec![]))`
    /// for a confirmed empty catalog.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be read or a row is invalid.
    pub fn load(&self) -> Result<Option<Vec<ProductRecord>>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        if headers.iter().ne(CATALOG_COLUMNS) {
            return Err(StoreError::Parse {
                line: 1,
                reason: format!("unexpected header {:?}", headers.iter().collect::<Vec<_>>()),
            });
        }

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let line = row.position().map_or(0, csv::Position::line);
            records.push(from_row(&row).map_err(|reason| StoreError::Parse { line, reason })?);
        }
        Ok(Some(records))
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn to_row(record: &ProductRecord) -> [String; 8] {
    [
        record.title.clone(),
        record.description.clone(),
        format_price(record.base_price),
        format_price(record.resale_price),
        record.currency.clone(),
        record.image_reference.clone().unwrap_or_default(),
        record.source_image_url.clone().unwrap_or_default(),
        record
            .captured_at
            .to_rfc3339_opts(SecondsFormat::AutoSi, true),
    ]
}

fn from_row(row: &StringRecord) -> Result<ProductRecord, String> {
    let field = |idx: usize| row.get(idx).unwrap_or_default();
    let optional = |idx: usize| Some(field(idx).to_owned()).filter(|s| !s.is_empty());
    let price = |idx: usize| {
        Decimal::from_str(field(idx))
            .map_err(|e| format!("{}: {e}", CATALOG_COLUMNS[idx]))
    };

    if row.len() != CATALOG_COLUMNS.len() {
        return Err(format!(
            "expected {} fields, found {}",
            CATALOG_COLUMNS.len(),
            row.len()
        ));
    }

    let captured_at = DateTime::parse_from_rfc3339(field(7))
        .map_err(|e| format!("scraped_at: {e}"))?
        .with_timezone(&Utc);

    Ok(ProductRecord {
        title: field(0).to_owned(),
        description: field(1).to_owned(),
        base_price: price(2)?,
        resale_price: price(3)?,
        currency: field(4).to_owned(),
        image_reference: optional(5),
        source_image_url: optional(6),
        captured_at,
    })
}

/// At least two decimals; more only when the value carries them.
fn format_price(price: Decimal) -> String {
    let mut price = price;
    if price.scale() < 2 {
        price.rescale(2);
    }
    price.to_string()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn failed_write_leaves_previous_catalog_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("products.csv"));
        store
            .replace(&[ProductRecord {
                title: "Kept".to_owned(),
                description: String::new(),
                base_price: Decimal::ONE,
                resale_price: Decimal::new(600, 2),
                currency: "USD".to_owned(),
                image_reference: None,
                source_image_url: None,
                captured_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            }])
            .unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let err = store
            .swap_in(|file| {
                file.write_all(b"title,description\nhalf a ro").unwrap();
                Err(StoreError::Io {
                    path: store.path().to_path_buf(),
                    source: std::io::Error::other("disk full"),
                })
            })
            .unwrap_err();

        assert!(matches!(err, StoreError::Io { .. }), "{err:?}");
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
        assert_eq!(store.load().unwrap().unwrap()[0].title, "Kept");
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1, "temp file must be removed");
    }

    #[test]
    fn prices_are_written_with_two_decimals() {
        assert_eq!(format_price(Decimal::from(120)), "120.00");
        assert_eq!(format_price(Decimal::new(175, 1)), "17.50");
        assert_eq!(format_price(Decimal::new(10_005, 3)), "10.005");
    }

    #[test]
    fn short_rows_are_rejected() {
        let row = StringRecord::from(vec!["Phone", "", "1.00"]);
        let err = from_row(&row).unwrap_err();
        assert!(err.contains("expected 8 fields"), "{err}");
    }

    #[test]
    fn bad_price_names_the_column() {
        let row = StringRecord::from(vec![
            "Phone",
            "",
            "abc",
            "5.00",
            "USD",
            "",
            "",
            "2024-03-01T12:00:00Z",
        ]);
        let err = from_row(&row).unwrap_err();
        assert!(err.starts_with("price_base"), "{err}");
    }
}
