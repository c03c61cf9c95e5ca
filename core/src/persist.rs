//! On-disk index artifacts.
//!
//! An index directory holds four files:
//! - `meta.json`: format header, counts, fingerprints and vectorizer config
//! - `vocabulary.json`: ordered `[{term, df, idf}]`; position is the column
//! - `vectors.bin`: bincode CSR matrix, one row per catalog record
//! - `ids.bin`: bincode list of book ids aligned to matrix rows
//!
//! Nothing time-dependent is written, so rebuilding from an unchanged
//! catalog produces byte-identical files.

use crate::catalog::{BookId, Catalog};
use crate::config::{ARTIFACT_FORMAT_NAME, ARTIFACT_FORMAT_VERSION};
use crate::error::{IndexStaleError, LoadError};
use crate::vectorizer::{DocumentVector, TermId, TfidfIndex, VocabEntry, Vectorizer, VectorizerConfig, Vocabulary};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub format: String,
    pub version: u32,
    pub num_docs: u32,
    pub vocab_size: u32,
    pub catalog_fingerprint: String,
    pub vocabulary_fingerprint: String,
    pub config: VectorizerConfig,
}

/// Compressed sparse row layout of the document vectors.
#[derive(Debug, Serialize, Deserialize)]
struct CsrMatrix {
    dim: u32,
    /// `rows + 1` offsets into `columns` / `weights`.
    row_offsets: Vec<u64>,
    columns: Vec<TermId>,
    weights: Vec<f32>,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn vocabulary(&self) -> PathBuf { self.root.join("vocabulary.json") }
    pub fn vectors(&self) -> PathBuf { self.root.join("vectors.bin") }
    pub fn ids(&self) -> PathBuf { self.root.join("ids.bin") }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), LoadError> {
    let mut f = BufWriter::new(File::create(path).map_err(|e| LoadError::io(path, e))?);
    f.write_all(bytes).and_then(|_| f.flush()).map_err(|e| LoadError::io(path, e))
}

fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    let f = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LoadError::ArtifactMissing(path.to_path_buf()),
        _ => LoadError::io(path, e),
    })?;
    let mut buf = Vec::new();
    BufReader::new(f).read_to_end(&mut buf).map_err(|e| LoadError::io(path, e))?;
    Ok(buf)
}

fn to_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<Vec<u8>, LoadError> {
    let mut json = serde_json::to_vec_pretty(value).map_err(|source| LoadError::Json { path: path.to_path_buf(), source })?;
    json.push(b'\n');
    Ok(json)
}

fn from_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, LoadError> {
    let bytes = read_file(path)?;
    serde_json::from_slice(&bytes).map_err(|source| LoadError::Json { path: path.to_path_buf(), source })
}

fn from_bincode<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, LoadError> {
    let bytes = read_file(path)?;
    bincode::deserialize(&bytes).map_err(|source| LoadError::Bincode { path: path.to_path_buf(), source })
}

pub fn save_index(paths: &IndexPaths, index: &TfidfIndex) -> Result<MetaFile, LoadError> {
    create_dir_all(&paths.root).map_err(|e| LoadError::io(&paths.root, e))?;
    let vocabulary = index.vectorizer.vocabulary();

    let mut matrix = CsrMatrix {
        dim: vocabulary.len() as u32,
        row_offsets: Vec::with_capacity(index.vectors.len() + 1),
        columns: Vec::new(),
        weights: Vec::new(),
    };
    matrix.row_offsets.push(0);
    for v in &index.vectors {
        for &(col, w) in v.entries() {
            matrix.columns.push(col);
            matrix.weights.push(w);
        }
        matrix.row_offsets.push(matrix.columns.len() as u64);
    }

    let meta = MetaFile {
        format: ARTIFACT_FORMAT_NAME.to_string(),
        version: ARTIFACT_FORMAT_VERSION,
        num_docs: index.ids.len() as u32,
        vocab_size: vocabulary.len() as u32,
        catalog_fingerprint: index.catalog_fingerprint.clone(),
        vocabulary_fingerprint: vocabulary.fingerprint(),
        config: *index.vectorizer.config(),
    };

    let vectors = bincode::serialize(&matrix).map_err(|source| LoadError::Bincode { path: paths.vectors(), source })?;
    let ids = bincode::serialize(&index.ids).map_err(|source| LoadError::Bincode { path: paths.ids(), source })?;
    write_file(&paths.vocabulary(), &to_json(&paths.vocabulary(), vocabulary.entries())?)?;
    write_file(&paths.vectors(), &vectors)?;
    write_file(&paths.ids(), &ids)?;
    // header last; an index without meta.json is incomplete
    write_file(&paths.meta(), &to_json(&paths.meta(), &meta)?)?;
    Ok(meta)
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile, LoadError> {
    let meta: MetaFile = from_json(&paths.meta())?;
    if meta.format != ARTIFACT_FORMAT_NAME || meta.version != ARTIFACT_FORMAT_VERSION {
        return Err(LoadError::corrupt(
            paths.meta(),
            format!("unsupported format {} v{} (expected {ARTIFACT_FORMAT_NAME} v{ARTIFACT_FORMAT_VERSION})", meta.format, meta.version),
        ));
    }
    Ok(meta)
}

/// Load and validate every artifact without reference to a catalog.
pub fn load_index(paths: &IndexPaths) -> Result<TfidfIndex, LoadError> {
    let meta = load_meta(paths)?;

    let entries: Vec<VocabEntry> = from_json(&paths.vocabulary())?;
    let vocabulary = Vocabulary::from_entries(entries)
        .map_err(|term| LoadError::corrupt(paths.vocabulary(), format!("term {term:?} appears twice")))?;
    if vocabulary.len() != meta.vocab_size as usize {
        return Err(LoadError::corrupt(
            paths.vocabulary(),
            format!("{} terms, header says {}", vocabulary.len(), meta.vocab_size),
        ));
    }
    if vocabulary.fingerprint() != meta.vocabulary_fingerprint {
        return Err(LoadError::corrupt(paths.vocabulary(), "vocabulary fingerprint does not match header"));
    }

    let matrix: CsrMatrix = from_bincode(&paths.vectors())?;
    let vectors = decode_matrix(&paths.vectors(), matrix, &meta)?;

    let ids: Vec<BookId> = from_bincode(&paths.ids())?;
    if ids.len() != meta.num_docs as usize {
        return Err(LoadError::corrupt(paths.ids(), format!("{} ids, header says {}", ids.len(), meta.num_docs)));
    }

    tracing::debug!(root = %paths.root.display(), num_docs = meta.num_docs, vocab_size = meta.vocab_size, "index artifacts loaded");
    Ok(TfidfIndex {
        vectorizer: Vectorizer::new(meta.config, vocabulary),
        vectors,
        ids,
        catalog_fingerprint: meta.catalog_fingerprint,
    })
}

/// Load the index and check it was built from exactly this catalog.
pub fn load_index_for(paths: &IndexPaths, catalog: &Catalog) -> Result<TfidfIndex, LoadError> {
    let index = load_index(paths)?;
    if index.catalog_fingerprint != catalog.fingerprint() {
        return Err(IndexStaleError {
            expected: index.catalog_fingerprint,
            found: catalog.fingerprint().to_string(),
        }
        .into());
    }
    // a corrupt ids.bin can still pass the length check
    if !index.ids.iter().copied().eq(catalog.ids()) {
        return Err(LoadError::corrupt(paths.ids(), "row ids do not match catalog order"));
    }
    Ok(index)
}

fn decode_matrix(path: &Path, m: CsrMatrix, meta: &MetaFile) -> Result<Vec<DocumentVector>, LoadError> {
    let rows = m.row_offsets.len().saturating_sub(1);
    if m.dim != meta.vocab_size || rows != meta.num_docs as usize {
        return Err(LoadError::corrupt(
            path,
            format!("matrix is {rows}x{}, header says {}x{}", m.dim, meta.num_docs, meta.vocab_size),
        ));
    }
    if m.columns.len() != m.weights.len()
        || m.row_offsets.first().copied() != Some(0)
        || m.row_offsets.last().copied() != Some(m.columns.len() as u64)
    {
        return Err(LoadError::corrupt(path, "row offsets do not cover the column array"));
    }
    let mut vectors = Vec::with_capacity(rows);
    for (r, w) in m.row_offsets.windows(2).enumerate() {
        let (start, end) = (w[0] as usize, w[1] as usize);
        let (Some(cols), Some(weights)) = (m.columns.get(start..end), m.weights.get(start..end)) else {
            return Err(LoadError::corrupt(path, format!("row {r} offsets {start}..{end} are out of bounds")));
        };
        if cols.iter().any(|&c| c >= m.dim) || cols.windows(2).any(|p| p[0] >= p[1]) {
            return Err(LoadError::corrupt(path, format!("row {r} has out-of-range or unsorted columns")));
        }
        vectors.push(DocumentVector::from_sorted(cols.iter().copied().zip(weights.iter().copied()).collect()));
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BookRecord;

    fn catalog() -> Catalog {
        Catalog::from_records(vec![
            BookRecord { id: 10, title: "Dune".into(), summary: "spice and sand worms".into() },
            BookRecord { id: 20, title: "Ubik".into(), summary: "time decay and reality".into() },
        ])
        .unwrap()
    }

    #[test]
    fn save_then_load_preserves_index() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let c = catalog();
        let built = Vectorizer::fit(&c, VectorizerConfig::default());
        save_index(&paths, &built).unwrap();
        let loaded = load_index_for(&paths, &c).unwrap();
        assert_eq!(loaded, built);
    }

    #[test]
    fn missing_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        assert!(matches!(load_index(&paths), Err(LoadError::ArtifactMissing(_))));
    }

    #[test]
    fn changed_catalog_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_index(&paths, &Vectorizer::fit(&catalog(), VectorizerConfig::default())).unwrap();
        let changed = Catalog::from_records(vec![BookRecord { id: 10, title: "Dune".into(), summary: "spice".into() }]).unwrap();
        assert!(matches!(load_index_for(&paths, &changed), Err(LoadError::Stale(_))));
    }

    #[test]
    fn truncated_matrix_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_index(&paths, &Vectorizer::fit(&catalog(), VectorizerConfig::default())).unwrap();
        let bytes = std::fs::read(paths.vectors()).unwrap();
        std::fs::write(paths.vectors(), &bytes[..bytes.len() / 2]).unwrap();
        assert!(matches!(load_index(&paths), Err(LoadError::Bincode { .. })));
    }

    fn rewrite_matrix(paths: &IndexPaths, edit: impl FnOnce(&mut CsrMatrix)) {
        let mut m: CsrMatrix = bincode::deserialize(&std::fs::read(paths.vectors()).unwrap()).unwrap();
        edit(&mut m);
        std::fs::write(paths.vectors(), bincode::serialize(&m).unwrap()).unwrap();
    }

    #[test]
    fn row_offset_past_columns_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_index(&paths, &Vectorizer::fit(&catalog(), VectorizerConfig::default())).unwrap();
        rewrite_matrix(&paths, |m| m.row_offsets[1] = m.columns.len() as u64 + 1000);
        assert!(matches!(load_index(&paths), Err(LoadError::ArtifactCorrupt { .. })));
    }

    #[test]
    fn column_outside_vocabulary_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_index(&paths, &Vectorizer::fit(&catalog(), VectorizerConfig::default())).unwrap();
        rewrite_matrix(&paths, |m| m.columns[0] = m.dim + 5);
        match load_index(&paths) {
            Err(LoadError::ArtifactCorrupt { reason, .. }) => assert!(reason.contains("row 0")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn edited_vocabulary_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_index(&paths, &Vectorizer::fit(&catalog(), VectorizerConfig::default())).unwrap();
        let text = std::fs::read_to_string(paths.vocabulary()).unwrap();
        std::fs::write(paths.vocabulary(), text.replace("spice", "spicy")).unwrap();
        assert!(matches!(load_index(&paths), Err(LoadError::ArtifactCorrupt { .. })));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_index(&paths, &Vectorizer::fit(&catalog(), VectorizerConfig::default())).unwrap();
        let text = std::fs::read_to_string(paths.meta()).unwrap();
        std::fs::write(paths.meta(), text.replace("\"version\": 1", "\"version\": 99")).unwrap();
        assert!(matches!(load_meta(&paths), Err(LoadError::ArtifactCorrupt { .. })));
    }
}
