use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub type BookId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: BookId,
    pub title: String,
    pub summary: String,
}

/// Immutable, ordered set of books. Order is file order and defines the
/// row order of every index artifact built from it.
#[derive(Debug, Clone)]
pub struct Catalog {
    records: Vec<BookRecord>,
    by_id: HashMap<BookId, usize>,
    fingerprint: String,
}

// Keys every JSON row must carry. A row without `summary` is dropped.
const REQUIRED_KEYS: [&str; 2] = ["index", "title"];

#[derive(Debug, Deserialize)]
struct InputBook {
    index: serde_json::Value,
    title: Option<String>,
    summary: Option<String>,
}

impl Catalog {
    /// Load a catalog from `.csv`, `.json` (array or single object) or
    /// `.jsonl`. Rows without a usable summary are skipped.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|s| s.to_str()).map(str::to_ascii_lowercase);
        let rows = match ext.as_deref() {
            Some("csv") => read_csv(path)?,
            Some("jsonl") => read_jsonl(path)?,
            Some("json") => read_json(path)?,
            _ => return Err(LoadError::UnsupportedFormat(path.to_path_buf())),
        };
        let total = rows.len();
        let catalog = Self::build(path, rows)?;
        tracing::info!(path = %path.display(), rows = total, kept = catalog.size(), "catalog loaded");
        Ok(catalog)
    }

    /// Build a catalog from records already in memory, applying the same
    /// rules as [`Catalog::load`].
    pub fn from_records(records: Vec<BookRecord>) -> Result<Self, LoadError> {
        Self::build(Path::new("<memory>"), records.into_iter().map(Some).collect())
    }

    fn build(path: &Path, rows: Vec<Option<BookRecord>>) -> Result<Self, LoadError> {
        let mut records = Vec::with_capacity(rows.len());
        let mut by_id = HashMap::with_capacity(rows.len());
        for rec in rows.into_iter().flatten() {
            if rec.summary.trim().is_empty() {
                continue;
            }
            if by_id.insert(rec.id, records.len()).is_some() {
                return Err(LoadError::DuplicateId { path: path.to_path_buf(), id: rec.id });
            }
            records.push(rec);
        }
        let fingerprint = fingerprint_records(&records);
        Ok(Self { records, by_id, fingerprint })
    }

    pub fn get(&self, id: BookId) -> Option<&BookRecord> {
        self.by_id.get(&id).map(|&row| &self.records[row])
    }

    pub fn size(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn records(&self) -> &[BookRecord] { &self.records }

    pub fn ids(&self) -> impl Iterator<Item = BookId> + '_ { self.records.iter().map(|r| r.id) }

    /// Hex SHA-1 over `(id, title, summary)` of every record in order.
    pub fn fingerprint(&self) -> &str { &self.fingerprint }
}

fn fingerprint_records(records: &[BookRecord]) -> String {
    let mut hasher = Sha1::new();
    for r in records {
        hasher.update(r.id.to_le_bytes());
        hasher.update(r.title.as_bytes());
        hasher.update([0x1f]);
        hasher.update(r.summary.as_bytes());
        hasher.update([0x1e]);
    }
    format!("{:x}", hasher.finalize())
}

fn csv_err(path: &Path) -> impl Fn(csv::Error) -> LoadError + '_ {
    move |source| LoadError::Csv { path: path.to_path_buf(), source }
}

fn read_csv(path: &Path) -> Result<Vec<Option<BookRecord>>, LoadError> {
    let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(BufReader::new(file));
    let headers = reader.headers().map_err(csv_err(path))?.clone();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or(LoadError::MissingColumn { path: path.to_path_buf(), column: name })
    };
    let (id_col, title_col, summary_col) = (column("index")?, column("title")?, column("summary")?);

    let mut rows = Vec::new();
    for (i, rec) in reader.records().enumerate() {
        let rec = rec.map_err(csv_err(path))?;
        let row = rec.position().map(|p| p.line() as usize).unwrap_or(i + 2);
        let summary = rec.get(summary_col).unwrap_or("");
        if summary.trim().is_empty() {
            rows.push(None);
            continue;
        }
        let raw_id = rec.get(id_col).unwrap_or("").trim();
        let id = parse_id(raw_id).ok_or_else(|| LoadError::Malformed {
            path: path.to_path_buf(),
            row,
            reason: format!("`index` value {raw_id:?} is not an integer"),
        })?;
        rows.push(Some(BookRecord {
            id,
            title: rec.get(title_col).unwrap_or("").to_string(),
            summary: summary.to_string(),
        }));
    }
    Ok(rows)
}

// Accepts "12" and the "12.0" that some dataframe exports write.
fn parse_id(raw: &str) -> Option<BookId> {
    if let Ok(id) = raw.parse::<BookId>() {
        return Some(id);
    }
    let f = raw.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then(|| f as BookId)
}

fn json_row(path: &Path, row: usize, value: serde_json::Value) -> Result<Option<BookRecord>, LoadError> {
    let serde_json::Value::Object(fields) = &value else {
        return Err(LoadError::Malformed { path: path.to_path_buf(), row, reason: "expected an object".into() });
    };
    if let Some(&column) = REQUIRED_KEYS.iter().find(|c| !fields.contains_key(**c)) {
        return Err(LoadError::MissingColumn { path: path.to_path_buf(), column });
    }
    let doc: InputBook = serde_json::from_value(value)
        .map_err(|e| LoadError::Malformed { path: path.to_path_buf(), row, reason: e.to_string() })?;
    let Some(summary) = doc.summary.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    let id = match &doc.index {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| parse_id(&n.to_string())),
        serde_json::Value::String(s) => parse_id(s.trim()),
        _ => None,
    }
    .ok_or_else(|| LoadError::Malformed {
        path: path.to_path_buf(),
        row,
        reason: format!("`index` value {} is not an integer", doc.index),
    })?;
    Ok(Some(BookRecord { id, title: doc.title.unwrap_or_default(), summary }))
}

fn read_jsonl(path: &Path) -> Result<Vec<Option<BookRecord>>, LoadError> {
    let f = File::open(path).map_err(|e| LoadError::io(path, e))?;
    let reader = BufReader::new(f);
    let mut rows = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| LoadError::io(path, e))?;
        if line.trim().is_empty() { continue; }
        let value = serde_json::from_str(&line)
            .map_err(|e| LoadError::Malformed { path: path.to_path_buf(), row: i + 1, reason: e.to_string() })?;
        rows.push(json_row(path, i + 1, value)?);
    }
    Ok(rows)
}

fn read_json(path: &Path) -> Result<Vec<Option<BookRecord>>, LoadError> {
    let f = File::open(path).map_err(|e| LoadError::io(path, e))?;
    let json: serde_json::Value = serde_json::from_reader(BufReader::new(f))
        .map_err(|source| LoadError::Json { path: PathBuf::from(path), source })?;
    let values = match json {
        serde_json::Value::Array(arr) => arr,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => return Err(LoadError::Malformed { path: path.to_path_buf(), row: 0, reason: "expected an array or object".into() }),
    };
    values.into_iter().enumerate().map(|(i, v)| json_row(path, i + 1, v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let p = dir.path().join(name);
        File::create(&p).unwrap().write_all(body.as_bytes()).unwrap();
        p
    }

    #[test]
    fn csv_drops_rows_without_summary() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_tmp(
            &dir,
            "books.csv",
            "index,title,genre,summary\n1,Dune,sf,Spice and sand\n2,Blank,sf,\n3,Emma,romance,   \n4,Ubik,sf,\"Time, decay\"\n",
        );
        let c = Catalog::load(&p).unwrap();
        assert_eq!(c.size(), 2);
        assert_eq!(c.get(4).unwrap().summary, "Time, decay");
        assert!(c.get(2).is_none());
    }

    #[test]
    fn csv_missing_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_tmp(&dir, "books.csv", "index,title\n1,Dune\n");
        match Catalog::load(&p) {
            Err(LoadError::MissingColumn { column, .. }) => assert_eq!(column, "summary"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_integer_index_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_tmp(&dir, "books.csv", "index,title,summary\nabc,Dune,Spice\n");
        assert!(matches!(Catalog::load(&p), Err(LoadError::Malformed { row: 2, .. })));
    }

    #[test]
    fn float_formatted_ids_are_accepted() {
        assert_eq!(parse_id("12.0"), Some(12));
        assert_eq!(parse_id("12.5"), None);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let recs = vec![
            BookRecord { id: 1, title: "A".into(), summary: "x".into() },
            BookRecord { id: 1, title: "B".into(), summary: "y".into() },
        ];
        assert!(matches!(Catalog::from_records(recs), Err(LoadError::DuplicateId { id: 1, .. })));
    }

    #[test]
    fn jsonl_and_json_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_tmp(
            &dir,
            "books.jsonl",
            "{\"index\":7,\"title\":\"Ubik\",\"summary\":\"decay\"}\n\n{\"index\":8,\"title\":\"Void\"}\n",
        );
        assert_eq!(Catalog::load(&p).unwrap().size(), 1);

        let p = write_tmp(&dir, "books.json", "[{\"index\":1,\"title\":\"Dune\",\"summary\":\"sand\",\"extra\":3}]");
        let c = Catalog::load(&p).unwrap();
        assert_eq!(c.get(1).unwrap().title, "Dune");
    }

    #[test]
    fn json_rows_need_every_column() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_tmp(&dir, "books.json", "[{\"index\":1,\"summary\":\"spice\"},{\"index\":2,\"summary\":\"sand\"}]");
        match Catalog::load(&p) {
            Err(LoadError::MissingColumn { column, .. }) => assert_eq!(column, "title"),
            other => panic!("unexpected {other:?}"),
        }
        let p = write_tmp(&dir, "books.jsonl", "{\"title\":\"Dune\",\"summary\":\"spice\"}\n");
        assert!(matches!(Catalog::load(&p), Err(LoadError::MissingColumn { column: "index", .. })));
    }

    #[test]
    fn json_ids_follow_csv_rules() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_tmp(
            &dir,
            "books.json",
            "[{\"index\":12.0,\"title\":\"Dune\",\"summary\":\"spice\"},{\"index\":\"x\",\"title\":\"Blank\",\"summary\":\"\"}]",
        );
        let c = Catalog::load(&p).unwrap();
        assert_eq!(c.size(), 1);
        assert!(c.get(12).is_some());

        let p = write_tmp(&dir, "bad.json", "[{\"index\":\"x\",\"title\":\"Dune\",\"summary\":\"spice\"}]");
        assert!(matches!(Catalog::load(&p), Err(LoadError::Malformed { row: 1, .. })));
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        assert!(matches!(Catalog::load("/nonexistent/books.csv"), Err(LoadError::Io { .. })));
        assert!(matches!(Catalog::load("books.parquet"), Err(LoadError::UnsupportedFormat(_))));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = Catalog::from_records(vec![BookRecord { id: 1, title: "Dune".into(), summary: "sand".into() }]).unwrap();
        let b = Catalog::from_records(vec![BookRecord { id: 1, title: "Dune".into(), summary: "sand!".into() }]).unwrap();
        assert_eq!(a.fingerprint().len(), 40);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
