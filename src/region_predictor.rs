use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{BgcError, Result};
use crate::feature_matrix::{FeatureMatrix, Vocabulary};

/// Trained scorer weights as shipped alongside a vocabulary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScorerWeights {
    pub vocabulary_version: String,
    pub bias: f64,
    /// One weight per vocabulary accession.
    pub domain_weights: BTreeMap<String, f64>,
    /// Taps over neighbouring genes, centred on the scored gene. Must have odd
    /// length; empty means the gene is scored on its own.
    #[serde(default)]
    pub context: Vec<f64>,
}

/// Per-gene cluster membership scorer bound to one vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionPredictor {
    bias: f64,
    /// (column, weight) in lexicographic accession order.
    column_weights: Vec<(usize, f64)>,
    context: Vec<f64>,
    num_columns: usize,
}

impl RegionPredictor {
    pub fn new(weights: &ScorerWeights, vocabulary: &Vocabulary) -> Result<RegionPredictor> {
        if weights.vocabulary_version != vocabulary.version() {
            return Err(BgcError::configuration(format!(
                "Scorer weights were trained against vocabulary {} but vocabulary {} was supplied",
                weights.vocabulary_version,
                vocabulary.version()
            )));
        }
        if !weights.bias.is_finite() {
            return Err(BgcError::configuration("Scorer bias is not finite"));
        }

        let mut column_weights = Vec::with_capacity(weights.domain_weights.len());
        for (accession, weight) in &weights.domain_weights {
            let column = vocabulary.index_of(accession).ok_or_else(|| {
                BgcError::configuration(format!(
                    "Scorer weight given for {} which is not in vocabulary {}",
                    accession,
                    vocabulary.version()
                ))
            })?;
            if !weight.is_finite() {
                return Err(BgcError::configuration(format!(
                    "Scorer weight for {} is not finite",
                    accession
                )));
            }
            column_weights.push((column, *weight));
        }
        if let Some(missing) = vocabulary
            .domains()
            .iter()
            .find(|d| !weights.domain_weights.contains_key(*d))
        {
            return Err(BgcError::configuration(format!(
                "No scorer weight given for vocabulary domain {}",
                missing
            )));
        }

        let context = if weights.context.is_empty() {
            vec![1.0]
        } else {
            weights.context.clone()
        };
        if context.len() % 2 == 0 || context.iter().any(|c| !c.is_finite()) {
            return Err(BgcError::configuration(format!(
                "Scorer context must be an odd number of finite values, found {:?}",
                weights.context
            )));
        }

        Ok(RegionPredictor {
            bias: weights.bias,
            column_weights,
            context,
            num_columns: vocabulary.num_domains(),
        })
    }

    /// Probability of cluster membership for each gene, in gene order. The
    /// matrix must have been built against this predictor's vocabulary.
    pub fn predict(&self, matrix: &FeatureMatrix) -> Vec<f64> {
        debug_assert_eq!(self.num_columns, matrix.num_columns());
        let num_genes = matrix.num_genes();
        if num_genes == 0 {
            return vec![];
        }

        let emissions: Vec<f64> = (0..num_genes)
            .map(|g| {
                self.column_weights
                    .iter()
                    .fold(0.0, |acc, (column, weight)| {
                        acc + weight * matrix.get(g, *column)
                    })
            })
            .collect();

        let radius = (self.context.len() / 2) as isize;
        (0..num_genes as isize)
            .map(|g| {
                let mut logit = self.bias;
                for (k, tap) in self.context.iter().enumerate() {
                    let neighbour = g + k as isize - radius;
                    if neighbour >= 0 && neighbour < num_genes as isize {
                        logit += tap * emissions[neighbour as usize];
                    }
                }
                logistic(logit)
            })
            .collect()
    }
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation_ingestor::AnnotationSchema;
    use crate::feature_matrix::build;
    use crate::genes::{Contig, DomainHit, Gene, Strand};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn weights(context: Vec<f64>) -> ScorerWeights {
        let mut domain_weights = BTreeMap::new();
        domain_weights.insert("PF00109".to_string(), 0.37);
        domain_weights.insert("PF00550".to_string(), -0.11);
        domain_weights.insert("NRPS_C".to_string(), 0.093);
        ScorerWeights {
            vocabulary_version: "v1".to_string(),
            bias: -2.5,
            domain_weights,
            context,
        }
    }

    fn vocabulary(domains: &[&str]) -> Vocabulary {
        Vocabulary::new("v1", domains.iter().map(|d| d.to_string()).collect()).unwrap()
    }

    fn contig() -> Contig {
        let hits: Vec<Vec<(&str, f64)>> = vec![
            vec![("PF00109", 13.1), ("NRPS_C", 40.7)],
            vec![],
            vec![("PF00550", 3.3), ("PF00109", 0.9), ("NRPS_C", 7.77)],
            vec![("OTHER", 100.0)],
        ];
        Contig {
            id: "c".to_string(),
            genes: hits
                .into_iter()
                .enumerate()
                .map(|(i, hits)| Gene {
                    id: format!("c_{}", i + 1),
                    contig_id: "c".to_string(),
                    order_index: i,
                    coordinates: None,
                    strand: Strand::Forward,
                    hits: hits
                        .into_iter()
                        .map(|(accession, score)| DomainHit {
                            protein_id: format!("c_{}", i + 1),
                            accession: accession.to_string(),
                            schema: AnnotationSchema::DomainLibrary,
                            score,
                            coordinates: None,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_probabilities_in_range_and_aligned() {
        init();
        let v = vocabulary(&["PF00109", "PF00550", "NRPS_C"]);
        let predictor = RegionPredictor::new(&weights(vec![0.25, 1.0, 0.25]), &v).unwrap();
        let probabilities = predictor.predict(&build(&contig(), &v));
        assert_eq!(4, probabilities.len());
        assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
        // Gene 1 has no hits of its own but sits next to two annotated genes
        assert!(probabilities[1] > logistic(-2.5));
        // Gene 3 only has a domain outside the vocabulary
        assert!(probabilities[3] < probabilities[2]);
    }

    #[test]
    fn test_predict_is_deterministic() {
        init();
        let v = vocabulary(&["PF00109", "PF00550", "NRPS_C"]);
        let predictor = RegionPredictor::new(&weights(vec![0.5, 1.0, 0.5]), &v).unwrap();
        let matrix = build(&contig(), &v);
        let first = predictor.predict(&matrix);
        for _ in 0..5 {
            assert_eq!(first, predictor.predict(&matrix));
        }
    }

    #[test]
    fn test_vocabulary_order_does_not_matter() {
        init();
        let w = weights(vec![0.3, 1.0, 0.3]);
        let v1 = vocabulary(&["PF00109", "PF00550", "NRPS_C"]);
        let v2 = vocabulary(&["NRPS_C", "PF00109", "PF00550"]);
        let p1 = RegionPredictor::new(&w, &v1)
            .unwrap()
            .predict(&build(&contig(), &v1));
        let p2 = RegionPredictor::new(&w, &v2)
            .unwrap()
            .predict(&build(&contig(), &v2));
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_empty_and_single_gene_contigs() {
        init();
        let v = vocabulary(&["PF00109", "PF00550", "NRPS_C"]);
        let predictor = RegionPredictor::new(&weights(vec![]), &v).unwrap();
        let empty = Contig {
            id: "e".to_string(),
            genes: vec![],
        };
        assert_eq!(Vec::<f64>::new(), predictor.predict(&build(&empty, &v)));

        let mut single = contig();
        single.genes.truncate(1);
        let p = predictor.predict(&build(&single, &v));
        assert_eq!(1, p.len());
        // Accession order: NRPS_C, PF00109, PF00550
        assert_eq!(logistic(-2.5 + (0.093 * 40.7 + 0.37 * 13.1)), p[0]);
    }

    #[test]
    fn test_incompatible_weights_rejected() {
        init();
        let v = vocabulary(&["PF00109", "PF00550", "NRPS_C"]);
        let mut w = weights(vec![]);
        w.vocabulary_version = "v2".to_string();
        assert!(RegionPredictor::new(&w, &v).is_err());

        let mut w = weights(vec![]);
        w.domain_weights.remove("PF00550");
        assert!(RegionPredictor::new(&w, &v).is_err());

        let w = weights(vec![1.0, 1.0]);
        assert!(RegionPredictor::new(&w, &v).is_err());

        let w = weights(vec![]);
        assert!(RegionPredictor::new(&w, &vocabulary(&["PF00109", "NRPS_C"])).is_err());
    }
}
