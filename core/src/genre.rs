//! Genre prediction over a linear model trained elsewhere.
//!
//! The model file is JSON exported from the training pipeline:
//!
//! ```json
//! {
//!   "labels": ["fantasy", "science fiction"],
//!   "vocabulary": [{"term": "dragon", "df": 12, "idf": 2.1}],
//!   "config": {"max_features": 5000, "stop_words": "english", "smooth_idf": true, "sublinear_tf": false},
//!   "coefficients": [[1.7], [-0.4]],
//!   "intercepts": [0.1, 0.0]
//! }
//! ```
//!
//! `coefficients` holds one row per label and one column per vocabulary term.

use crate::error::LoadError;
use crate::vectorizer::{VocabEntry, Vectorizer, VectorizerConfig, Vocabulary};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictionError {
    #[error("text is empty")]
    EmptyInput,
    #[error("model produced a non-finite score for {0:?}")]
    NonFinite(String),
}

pub trait GenreClassifier: Send + Sync {
    fn predict(&self, text: &str) -> Result<String, PredictionError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelFile {
    pub labels: Vec<String>,
    pub vocabulary: Vec<VocabEntry>,
    #[serde(default)]
    pub config: VectorizerConfig,
    pub coefficients: Vec<Vec<f32>>,
    pub intercepts: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct LinearGenreModel {
    labels: Vec<String>,
    vectorizer: Vectorizer,
    coefficients: Vec<Vec<f32>>,
    intercepts: Vec<f32>,
}

impl LinearGenreModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoadError::ArtifactMissing(path.to_path_buf()),
            _ => LoadError::io(path, e),
        })?;
        let file: ModelFile = serde_json::from_reader(BufReader::new(f))
            .map_err(|source| LoadError::Json { path: path.to_path_buf(), source })?;
        let model = Self::from_file(file).map_err(|reason| LoadError::corrupt(path, reason))?;
        tracing::info!(path = %path.display(), labels = model.labels.len(), vocab_size = model.vectorizer.dim(), "genre model loaded");
        Ok(model)
    }

    pub fn from_file(file: ModelFile) -> Result<Self, String> {
        if file.labels.is_empty() {
            return Err("model has no labels".into());
        }
        if file.coefficients.len() != file.labels.len() || file.intercepts.len() != file.labels.len() {
            return Err(format!(
                "{} labels but {} coefficient rows and {} intercepts",
                file.labels.len(),
                file.coefficients.len(),
                file.intercepts.len()
            ));
        }
        let dim = file.vocabulary.len();
        if let Some((i, row)) = file.coefficients.iter().enumerate().find(|(_, r)| r.len() != dim) {
            return Err(format!("coefficient row {i} has {} columns, vocabulary has {dim}", row.len()));
        }
        let vocabulary = Vocabulary::from_entries(file.vocabulary).map_err(|t| format!("term {t:?} appears twice"))?;
        Ok(Self {
            labels: file.labels,
            vectorizer: Vectorizer::new(file.config, vocabulary),
            coefficients: file.coefficients,
            intercepts: file.intercepts,
        })
    }

    pub fn labels(&self) -> &[String] { &self.labels }
}

impl GenreClassifier for LinearGenreModel {
    /// Arg-max of `intercept + coef · x`; equal scores go to the earlier label.
    fn predict(&self, text: &str) -> Result<String, PredictionError> {
        if text.trim().is_empty() {
            return Err(PredictionError::EmptyInput);
        }
        let x = self.vectorizer.transform(text);
        let mut best: Option<(usize, f32)> = None;
        for (i, (row, b)) in self.coefficients.iter().zip(&self.intercepts).enumerate() {
            let score = b + x.entries().iter().map(|&(c, w)| row[c as usize] * w).sum::<f32>();
            if !score.is_finite() {
                return Err(PredictionError::NonFinite(self.labels[i].clone()));
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        // labels is non-empty, checked at construction
        Ok(best.map(|(i, _)| self.labels[i].clone()).unwrap_or_default())
    }
}
