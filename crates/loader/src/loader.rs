use crate::error::{LoaderError, Result};
use crate::numeric::{parse_amount, parse_count};
use crate::schema::{SchemaMapping, TaxonomySchema};
use crate::types::{LoadOutput, Observation, Taxonomy, TaxonomyDiagnostics};
use csv::{ByteRecord, ReaderBuilder};
use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Reads the flat observation table into typed rows.
///
/// Only a missing header or missing required columns abort the load. Bad
/// cells are coerced and bad rows dropped, both counted in
/// [`crate::LoadDiagnostics`].
pub struct ObservationLoader {
    schema: SchemaMapping,
}

impl ObservationLoader {
    pub fn new(schema: SchemaMapping) -> Result<Self> {
        schema.validate()?;
        Ok(Self { schema })
    }

    /// Load from a CSV file
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<LoadOutput> {
        let path = path.as_ref();
        let file = File::open(path)?;
        log::debug!("Loading observations from {}", path.display());
        self.load_reader(file)
    }

    /// Load from any CSV byte stream with a header row
    pub fn load_reader<R: Read>(&self, reader: R) -> Result<LoadOutput> {
        let mut rdr = ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let headers = read_headers(&mut rdr)?;
        let cols = self.schema.resolve(&headers)?;

        let mut out = LoadOutput::default();
        let mut record = ByteRecord::new();

        loop {
            match rdr.read_byte_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) if err.is_io_error() => return Err(err.into()),
                Err(err) => {
                    out.diagnostics.rows_seen += 1;
                    out.diagnostics.drop_unreadable();
                    log::debug!("Dropping unreadable record: {err}");
                    continue;
                }
            }
            out.diagnostics.rows_seen += 1;

            let slug = cell(&record, cols.slug);
            let slug = slug.trim();
            if slug.is_empty() {
                out.diagnostics.drop_missing_slug();
                continue;
            }
            let keyword = cell(&record, cols.keyword);
            let keyword = keyword.trim();
            if keyword.is_empty() {
                out.diagnostics.drop_missing_keyword();
                continue;
            }

            let revenue = parse_amount(&cell(&record, cols.revenue));
            let clicks = parse_amount(&cell(&record, cols.clicks));
            let searches = parse_count(&cell(&record, cols.searches));
            if revenue.coerced || clicks.coerced || searches.coerced {
                out.diagnostics.rows_coerced += 1;
            }

            let region = cols.region.and_then(|pos| {
                let raw = cell(&record, pos);
                let trimmed = raw.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            });

            out.observations.push(Observation {
                keyword: keyword.to_string(),
                slug: slug.to_string(),
                region,
                revenue: revenue.value,
                clicks: clicks.value,
                searches: searches.value,
            });
        }

        let d = &out.diagnostics;
        log::info!(
            "Loaded {} observations (seen={}, dropped={}, coerced={})",
            out.observations.len(),
            d.rows_seen,
            d.rows_dropped,
            d.rows_coerced
        );
        if d.rows_dropped > 0 {
            log::debug!(
                "Dropped rows: missing_slug={}, missing_keyword={}, unreadable={}",
                d.dropped_missing_slug,
                d.dropped_missing_keyword,
                d.dropped_unreadable
            );
        }

        Ok(out)
    }
}

/// Reads the keyword → angle/category side table.
pub struct TaxonomyLoader {
    schema: TaxonomySchema,
}

impl TaxonomyLoader {
    pub fn new(schema: TaxonomySchema) -> Self {
        Self { schema }
    }

    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<(Taxonomy, TaxonomyDiagnostics)> {
        let file = File::open(path.as_ref())?;
        self.load_reader(file)
    }

    pub fn load_reader<R: Read>(&self, reader: R) -> Result<(Taxonomy, TaxonomyDiagnostics)> {
        let mut rdr = ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let headers = read_headers(&mut rdr)?;
        let cols = self.schema.resolve(&headers)?;

        let mut taxonomy = Taxonomy::new();
        let mut diag = TaxonomyDiagnostics::default();
        let mut record = ByteRecord::new();

        loop {
            match rdr.read_byte_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) if err.is_io_error() => return Err(err.into()),
                Err(_) => {
                    diag.rows_seen += 1;
                    diag.rows_skipped += 1;
                    continue;
                }
            }
            diag.rows_seen += 1;

            let keyword = cell(&record, cols.keyword);
            if keyword.trim().is_empty() {
                diag.rows_skipped += 1;
                continue;
            }
            let angle = cell(&record, cols.angle);
            let category = cols.category.map(|pos| cell(&record, pos));
            if taxonomy.insert(&keyword, Some(&*angle), category.as_deref()) {
                diag.overrides += 1;
                log::debug!("Taxonomy entry for `{}` overridden", keyword.trim());
            }
        }

        log::info!(
            "Loaded taxonomy: {} keywords (seen={}, skipped={}, overrides={})",
            taxonomy.len(),
            diag.rows_seen,
            diag.rows_skipped,
            diag.overrides
        );
        Ok((taxonomy, diag))
    }
}

fn read_headers<R: Read>(rdr: &mut csv::Reader<R>) -> Result<Vec<String>> {
    let headers = rdr.byte_headers()?;
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(LoaderError::MissingHeader);
    }
    Ok(headers
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect())
}

fn cell(record: &ByteRecord, pos: usize) -> Cow<'_, str> {
    record
        .get(pos)
        .map(String::from_utf8_lossy)
        .unwrap_or(Cow::Borrowed(""))
}
