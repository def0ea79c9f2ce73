//! Catalog loading from TLE text and JSON files (optionally gzipped)
//!
//! Malformed records are rejected here so the propagation layer only ever
//! sees well-formed elements.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;

use super::SpaceObjectDatabase;
use crate::propagation::OrbitalObject;

/// A loaded, propagatable catalog entry
#[derive(Debug, Clone)]
pub struct CatalogObject {
    pub object: Arc<OrbitalObject>,
    pub standard_magnitude: Option<f64>,
}

/// Counts from converting a catalog into objects
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CatalogStats {
    pub total_entries: usize,
    pub loaded: usize,
    pub missing_tle: usize,
    pub decayed: usize,
    pub rejected: usize,
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

fn is_json(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    name.ends_with(".json") || name.ends_with(".json.gz")
}

/// Open a file, transparently decompressing `.gz`
fn open_reader(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("Failed to open catalog: {:?}", path))?;
    let reader = BufReader::new(file);
    if is_gzip(path) {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Load a catalog file, choosing the format from the file name
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Vec<CatalogObject>> {
    let path = path.as_ref();
    if is_json(path) {
        let db = load_catalog_json(path)?;
        let (objects, stats) = catalog_objects(&db);
        log::info!(
            "Loaded {} of {} catalog entries ({} without elements, {} decayed, {} rejected)",
            stats.loaded,
            stats.total_entries,
            stats.missing_tle,
            stats.decayed,
            stats.rejected
        );
        Ok(objects)
    } else {
        load_tle_file(path)
    }
}

/// Parse a JSON catalog
pub fn load_catalog_json(path: impl AsRef<Path>) -> Result<SpaceObjectDatabase> {
    let path = path.as_ref();
    log::info!("Loading catalog from {:?}", path);

    let reader = open_reader(path)?;
    let db: SpaceObjectDatabase = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse catalog JSON: {:?}", path))?;

    log::info!(
        "Catalog has {} entries (generated at {})",
        db.objects.len(),
        db.generated_at
    );
    Ok(db)
}

/// Convert catalog entries into objects, skipping entries that cannot be
/// propagated
pub fn catalog_objects(db: &SpaceObjectDatabase) -> (Vec<CatalogObject>, CatalogStats) {
    let mut stats = CatalogStats {
        total_entries: db.objects.len(),
        ..Default::default()
    };
    let mut objects = Vec::with_capacity(db.objects.len());

    for (key, entry) in &db.objects {
        if entry.is_decayed() {
            stats.decayed += 1;
            continue;
        }
        match entry.to_orbital_object() {
            None => stats.missing_tle += 1,
            Some(Ok(object)) => {
                if key.parse::<u32>().ok() != Some(object.id) {
                    log::trace!("Catalog key {} does not match element set id {}", key, object.id);
                }
                objects.push(CatalogObject {
                    object: Arc::new(object),
                    standard_magnitude: entry.standard_magnitude,
                });
            }
            Some(Err(e)) => {
                log::trace!("Skipping catalog entry {}: {}", key, e);
                stats.rejected += 1;
            }
        }
    }

    objects.sort_by_key(|o| o.object.id);
    stats.loaded = objects.len();
    (objects, stats)
}

/// Load a file of 2- or 3-line element records
pub fn load_tle_file(path: impl AsRef<Path>) -> Result<Vec<CatalogObject>> {
    let path = path.as_ref();
    log::info!("Loading element sets from {:?}", path);

    let mut text = String::new();
    open_reader(path)?
        .read_to_string(&mut text)
        .with_context(|| format!("Failed to read element sets: {:?}", path))?;

    let objects = parse_tle_text(&text);
    log::info!("Loaded {} element sets", objects.len());
    Ok(objects)
}

/// Parse TLE text. Each record is an optional name line (with or without a
/// leading `0 `) followed by lines 1 and 2. Malformed records are skipped.
pub fn parse_tle_text(text: &str) -> Vec<CatalogObject> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();

    let mut objects = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let is_line1 = |l: &str| l.starts_with("1 ");
        let is_line2 = |l: &str| l.starts_with("2 ");

        let (name, line1, line2, consumed) = match lines.get(i..i + 3) {
            Some([name, l1, l2]) if !is_line1(name) && is_line1(l1) && is_line2(l2) => {
                let name = name.strip_prefix("0 ").unwrap_or(*name).trim();
                (Some(name), *l1, *l2, 3)
            }
            _ => match lines.get(i..i + 2) {
                Some([l1, l2]) if is_line1(l1) && is_line2(l2) => (None, *l1, *l2, 2),
                _ => {
                    log::trace!("Skipping unrecognised element line: {}", lines[i]);
                    i += 1;
                    continue;
                }
            },
        };
        i += consumed;

        match OrbitalObject::from_tle(name, line1, line2) {
            Ok(object) => objects.push(CatalogObject {
                object: Arc::new(object),
                standard_magnitude: None,
            }),
            Err(e) => log::trace!("Skipping element set {:?}: {}", name.unwrap_or(line1), e),
        }
    }

    objects
}
