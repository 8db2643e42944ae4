//! Linear text classifier over TF-IDF features.
//!
//! The model file is a JSON artifact holding three pieces that are trained
//! elsewhere: a vectorizer (`vocabulary` and `idf`), a linear classifier
//! (`coef` rows and `intercept`, one per class) and a label encoder
//! (`classes`, in the same order as the `coef` rows).

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use serde::Deserialize;

use crate::{
    classifier::{ClassifierError, PriorityClassifier},
    models::priority::Priority,
};

const BUNDLED_MODEL: &str = include_str!("../../assets/priority_model.json");

#[derive(Debug, Deserialize)]
struct ModelArtifact {
    vectorizer: VectorizerArtifact,
    classifier: ClassifierArtifact,
    label_encoder: LabelEncoderArtifact,
}

#[derive(Debug, Deserialize)]
struct VectorizerArtifact {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ClassifierArtifact {
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct LabelEncoderArtifact {
    classes: Vec<String>,
}

#[derive(Debug)]
pub struct LinearModel {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
    labels: Vec<Priority>,
}

impl LinearModel {
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let content = fs::read_to_string(path).map_err(|e| ClassifierError::LoadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let model = Self::from_json(&content)?;
        log::debug!(
            "Loaded model from {} ({} terms, {} classes)",
            path.display(),
            model.vocabulary.len(),
            model.labels.len()
        );
        Ok(model)
    }

    /// Sample model shipped inside the binary
    pub fn bundled() -> Result<Self, ClassifierError> {
        Self::from_json(BUNDLED_MODEL)
    }

    /// Like [`LinearModel::load`], but a missing file falls back to the bundled model
    pub fn load_or_bundled(path: &Path) -> Result<Self, ClassifierError> {
        match Self::load(path) {
            Err(ClassifierError::LoadFailed { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                log::warn!(
                    "No priority model at {}, using the bundled sample model",
                    path.display()
                );
                Self::bundled()
            }
            result => result,
        }
    }

    pub fn from_json(content: &str) -> Result<Self, ClassifierError> {
        let artifact: ModelArtifact = serde_json::from_str(content)
            .map_err(|e| ClassifierError::ParseFailed { source: e })?;
        Self::from_artifact(artifact)
    }

    fn from_artifact(artifact: ModelArtifact) -> Result<Self, ClassifierError> {
        let ModelArtifact {
            vectorizer,
            classifier,
            label_encoder,
        } = artifact;
        let features = vectorizer.idf.len();

        if let Some((term, index)) = vectorizer
            .vocabulary
            .iter()
            .find(|(_, index)| **index >= features)
        {
            return Err(ClassifierError::InvalidModel(format!(
                "term '{}' maps to column {} but there are only {} idf weights",
                term, index, features
            )));
        }

        let classes = label_encoder.classes.len();
        if classes == 0 {
            return Err(ClassifierError::InvalidModel(
                "label encoder has no classes".to_string(),
            ));
        }
        if classifier.coef.len() != classes || classifier.intercept.len() != classes {
            return Err(ClassifierError::InvalidModel(format!(
                "{} classes but {} coefficient rows and {} intercepts",
                classes,
                classifier.coef.len(),
                classifier.intercept.len()
            )));
        }
        if let Some(row) = classifier.coef.iter().find(|row| row.len() != features) {
            return Err(ClassifierError::InvalidModel(format!(
                "coefficient row has {} columns, expected {}",
                row.len(),
                features
            )));
        }

        let labels = label_encoder
            .classes
            .iter()
            .map(|class| {
                class
                    .parse::<Priority>()
                    .map_err(|_| ClassifierError::UnknownLabel(class.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            vocabulary: vectorizer.vocabulary,
            idf: vectorizer.idf,
            coef: classifier.coef,
            intercept: classifier.intercept,
            labels,
        })
    }

    /// Sparse, L2-normalised TF-IDF vector. Unknown terms are dropped.
    fn vectorize(&self, text: &str) -> BTreeMap<usize, f64> {
        let mut features: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokenize(text) {
            if let Some(&column) = self.vocabulary.get(&token) {
                *features.entry(column).or_insert(0.0) += 1.0;
            }
        }

        for (column, value) in features.iter_mut() {
            *value *= self.idf[*column];
        }

        let norm = features.values().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in features.values_mut() {
                *value /= norm;
            }
        }
        features
    }

    fn scores(&self, features: &BTreeMap<usize, f64>) -> Vec<f64> {
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, intercept)| {
                intercept
                    + features
                        .iter()
                        .map(|(column, value)| row[*column] * value)
                        .sum::<f64>()
            })
            .collect()
    }
}

/// Lowercased alphanumeric runs of at least two characters
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_lowercase)
}

impl PriorityClassifier for LinearModel {
    fn classify(&self, text: &str) -> Result<Priority, ClassifierError> {
        if text.trim().is_empty() {
            return Err(ClassifierError::EmptyInput);
        }

        let scores = self.scores(&self.vectorize(text));

        // first class wins ties
        let mut best = 0;
        for (index, score) in scores.iter().enumerate() {
            if *score > scores[best] {
                best = index;
            }
        }

        let label = self.labels[best];
        log::debug!("Scores {:?} -> {}", scores, label);
        Ok(label)
    }
}
