use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::cluster_definer::CalibrationTable;
use crate::error::{BgcError, Result};
use crate::feature_matrix::{Vocabulary, VocabularyFile};
use crate::region_predictor::{RegionPredictor, ScorerWeights};
use crate::type_classifier::SignatureTable;

pub const VOCABULARY_FILE: &str = "vocabulary.json";
pub const WEIGHTS_FILE: &str = "weights.json";
pub const CALIBRATION_FILE: &str = "calibration.json";
pub const SIGNATURES_FILE: &str = "signatures.json";

/// Read-only trained assets shared by every contig of a run.
#[derive(Debug, Clone)]
pub struct ModelAssets {
    pub vocabulary: Vocabulary,
    pub predictor: RegionPredictor,
    pub calibration: CalibrationTable,
    pub signatures: SignatureTable,
}

impl ModelAssets {
    /// Check the assets against each other. Any incompatibility is a
    /// configuration error.
    pub fn new(
        vocabulary: Vocabulary,
        weights: &ScorerWeights,
        calibration: CalibrationTable,
        signatures: SignatureTable,
    ) -> Result<ModelAssets> {
        let predictor = RegionPredictor::new(weights, &vocabulary)?;
        calibration.validate()?;
        signatures.validate()?;
        Ok(ModelAssets {
            vocabulary,
            predictor,
            calibration,
            signatures,
        })
    }

    pub fn load<P: AsRef<Path>>(model_dir: P) -> Result<ModelAssets> {
        let dir = model_dir.as_ref();
        info!("Loading model assets from {} ..", dir.display());
        if !dir.is_dir() {
            return Err(BgcError::configuration(format!(
                "Model directory {} does not exist",
                dir.display()
            )));
        }
        let vocabulary =
            Vocabulary::from_file(read_asset::<VocabularyFile>(dir, VOCABULARY_FILE)?)?;
        let weights: ScorerWeights = read_asset(dir, WEIGHTS_FILE)?;
        let calibration: CalibrationTable = read_asset(dir, CALIBRATION_FILE)?;
        let signatures: SignatureTable = read_asset(dir, SIGNATURES_FILE)?;

        let assets = ModelAssets::new(vocabulary, &weights, calibration, signatures)?;
        info!(
            "Loaded vocabulary {} with {} domains and {} class signatures (table {})",
            assets.vocabulary.version(),
            assets.vocabulary.num_domains(),
            assets.signatures.classes.len(),
            assets.signatures.version
        );
        Ok(assets)
    }
}

fn read_asset<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let path = dir.join(name);
    if !path.is_file() {
        return Err(BgcError::configuration(format!(
            "Missing model asset {}",
            path.display()
        )));
    }
    debug!("Reading model asset {}", path.display());
    serde_json::from_reader(BufReader::new(File::open(&path)?)).map_err(|e| {
        BgcError::configuration(format!(
            "Failed to parse model asset {}: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_load_test_model() {
        init();
        let assets = ModelAssets::load("tests/data/model").unwrap();
        assert_eq!("test-1", assets.vocabulary.version());
        assert_eq!(4, assets.vocabulary.num_domains());
        assert_eq!(Some(0.99), assets.calibration.refine_threshold);
    }

    #[test]
    fn test_missing_asset() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        match ModelAssets::load(td.path()) {
            Err(BgcError::Configuration(message)) => assert!(message.contains(VOCABULARY_FILE)),
            other => panic!("Unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_incompatible_weights() {
        init();
        let td = tempfile::TempDir::new().unwrap();
        for name in &[VOCABULARY_FILE, CALIBRATION_FILE, SIGNATURES_FILE] {
            std::fs::copy(Path::new("tests/data/model").join(name), td.path().join(name)).unwrap();
        }
        std::fs::write(
            td.path().join(WEIGHTS_FILE),
            r#"{"vocabulary_version": "other", "bias": 0.0, "domain_weights": {}}"#,
        )
        .unwrap();
        assert!(matches!(
            ModelAssets::load(td.path()),
            Err(BgcError::Configuration(_))
        ));
    }
}
