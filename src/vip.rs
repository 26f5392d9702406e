//! VIP plate registry
//!
//! A CSV-backed lookup from plate number to owner record. The file is the
//! source of truth and may be edited while the application runs; callers
//! invoke [`VipRegistry::reload`] to pick up changes. Any problem with the
//! file (missing, unreadable, wrong header set) yields an empty registry
//! and an error-level diagnostic, never a panic: a broken VIP list must
//! not take the capture pipeline down.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Header set the CSV file must carry, in any column order
const EXPECTED_HEADERS: [&str; 6] = [
    "plate_number",
    "owner_name",
    "house_number",
    "land_number",
    "chat_id",
    "type",
];

/// One VIP entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VipRecord {
    /// Plate as written in the file
    pub plate: String,
    /// Owner display name
    pub owner_name: String,
    /// House number within the estate
    pub house_number: String,
    /// Land/lane designation
    pub land_number: String,
    /// Notification destination id
    pub chat_id: String,
    /// Entry kind, e.g. "Residence" or "Visitor"
    pub kind: String,
}

/// Plate-keyed VIP lookup
#[derive(Debug)]
pub struct VipRegistry {
    path: PathBuf,
    records: HashMap<String, VipRecord>,
}

impl VipRegistry {
    /// Load the registry from a CSV file
    ///
    /// Never fails: on any problem the registry is empty and the cause is
    /// logged.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = read_records(&path);
        Self { path, records }
    }

    /// Look up a plate (trimmed, case-insensitive)
    pub fn lookup(&self, plate: &str) -> Option<&VipRecord> {
        self.records.get(&plate.trim().to_uppercase())
    }

    /// Re-read the backing file in place
    pub fn reload(&mut self) {
        tracing::info!(path = %self.path.display(), "reloading VIP list");
        self.records = read_records(&self.path);
    }

    /// Number of loaded records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn read_records(path: &Path) -> HashMap<String, VipRecord> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "VIP list not readable");
            return HashMap::new();
        }
    };

    // Editors on some platforms prepend a BOM; strip it before the header.
    let content = content.trim_start_matches('\u{feff}');
    let mut lines = content.lines();

    let Some(header_line) = lines.next() else {
        tracing::error!(path = %path.display(), "VIP list is empty");
        return HashMap::new();
    };
    let headers: Vec<&str> = header_line.split(',').map(str::trim).collect();

    if !EXPECTED_HEADERS.iter().all(|h| headers.contains(h)) {
        tracing::error!(
            path = %path.display(),
            headers = ?headers,
            expected = ?EXPECTED_HEADERS,
            "VIP list headers are incorrect or missing"
        );
        return HashMap::new();
    }

    let column = |name: &str| headers.iter().position(|h| *h == name).unwrap();
    let plate_col = column("plate_number");
    let owner_col = column("owner_name");
    let house_col = column("house_number");
    let land_col = column("land_number");
    let chat_col = column("chat_id");
    let kind_col = column("type");

    let mut records = HashMap::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let get = |col: usize| fields.get(col).copied().unwrap_or("").to_string();

        let plate = get(plate_col);
        if plate.is_empty() {
            tracing::warn!(path = %path.display(), row = line, "skipping row without plate number");
            continue;
        }

        records.insert(
            plate.to_uppercase(),
            VipRecord {
                plate,
                owner_name: get(owner_col),
                house_number: get(house_col),
                land_number: get(land_col),
                chat_id: get(chat_col),
                kind: get(kind_col),
            },
        );
    }

    tracing::info!(
        path = %path.display(),
        records = records.len(),
        "VIP list loaded"
    );
    records
}
