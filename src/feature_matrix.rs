use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{BgcError, Result};
use crate::genes::Contig;

/// The fixed, versioned set of domain accessions a scorer was trained on.
/// Columns are keyed by accession name; position only matters within one
/// vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    version: String,
    domains: Vec<String>,
    index: HashMap<String, usize>,
}

#[derive(Debug, Deserialize)]
pub struct VocabularyFile {
    pub version: String,
    pub domains: Vec<String>,
}

impl Vocabulary {
    pub fn new(version: &str, domains: Vec<String>) -> Result<Vocabulary> {
        if domains.is_empty() {
            return Err(BgcError::configuration(format!(
                "Vocabulary {} contains no domains",
                version
            )));
        }
        let mut index = HashMap::with_capacity(domains.len());
        for (i, domain) in domains.iter().enumerate() {
            if domain.trim().is_empty() {
                return Err(BgcError::configuration(format!(
                    "Vocabulary {} contains an empty domain accession",
                    version
                )));
            }
            if index.insert(domain.clone(), i).is_some() {
                return Err(BgcError::configuration(format!(
                    "Domain {} is listed more than once in vocabulary {}",
                    domain, version
                )));
            }
        }
        Ok(Vocabulary {
            version: version.to_string(),
            domains,
            index,
        })
    }

    pub fn from_file(file: VocabularyFile) -> Result<Vocabulary> {
        Vocabulary::new(&file.version, file.domains)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn num_domains(&self) -> usize {
        self.domains.len()
    }

    pub fn index_of(&self, accession: &str) -> Option<usize> {
        self.index.get(accession).copied()
    }
}

/// Genes × vocabulary matrix, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    num_genes: usize,
    num_columns: usize,
    cells: Vec<f64>,
}

impl FeatureMatrix {
    pub fn num_genes(&self) -> usize {
        self.num_genes
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// The feature vector of one gene.
    pub fn row(&self, gene_index: usize) -> &[f64] {
        let start = gene_index * self.num_columns;
        &self.cells[start..start + self.num_columns]
    }

    pub fn get(&self, gene_index: usize, column: usize) -> f64 {
        self.row(gene_index)[column]
    }
}

/// Build the feature matrix of a contig. Each cell holds the best score of the
/// gene's hits on that domain, or 0 when the gene has none. Hits on domains
/// outside the vocabulary are ignored here.
pub fn build(contig: &Contig, vocabulary: &Vocabulary) -> FeatureMatrix {
    let num_columns = vocabulary.num_domains();
    let mut best: Vec<Option<f64>> = vec![None; contig.genes.len() * num_columns];
    let mut ignored = 0usize;

    for (gene_index, gene) in contig.genes.iter().enumerate() {
        for hit in &gene.hits {
            match vocabulary.index_of(&hit.accession) {
                Some(column) => {
                    let cell = &mut best[gene_index * num_columns + column];
                    *cell = Some(match *cell {
                        Some(current) if current >= hit.score => current,
                        _ => hit.score,
                    });
                }
                None => ignored += 1,
            }
        }
    }
    debug!(
        "Built {}x{} feature matrix for {} ({} hits outside the vocabulary)",
        contig.genes.len(),
        num_columns,
        contig.id,
        ignored
    );

    FeatureMatrix {
        num_genes: contig.genes.len(),
        num_columns,
        cells: best.into_iter().map(|c| c.unwrap_or(0.0)).collect(),
    }
}
