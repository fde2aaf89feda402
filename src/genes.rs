use crate::annotation_ingestor::AnnotationSchema;

/// Inclusive 1-based span on a protein or contig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Coordinates {
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
    Unknown,
}

impl Strand {
    pub fn parse(token: &str) -> Strand {
        match token.trim() {
            "+" | "1" => Strand::Forward,
            "-" | "-1" => Strand::Reverse,
            _ => Strand::Unknown,
        }
    }
}

/// A match between a protein region and a domain profile.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainHit {
    pub protein_id: String,
    pub accession: String,
    pub schema: AnnotationSchema,
    pub score: f64,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gene {
    pub id: String,
    pub contig_id: String,
    pub order_index: usize,
    pub coordinates: Option<Coordinates>,
    pub strand: Strand,
    pub hits: Vec<DomainHit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contig {
    pub id: String,
    pub genes: Vec<Gene>,
}

impl Contig {
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }
}

/// A gene paired with its predicted cluster-membership probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredGene<'a> {
    pub gene: &'a Gene,
    pub probability: f64,
}

/// Pair up genes with the probability vector predicted for their contig.
pub fn score_genes<'a>(contig: &'a Contig, probabilities: &[f64]) -> Vec<ScoredGene<'a>> {
    contig
        .genes
        .iter()
        .zip(probabilities.iter())
        .map(|(gene, probability)| ScoredGene {
            gene,
            probability: *probability,
        })
        .collect()
}
