use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::cluster_definer::Cluster;
use crate::error::{BgcError, Result};
use crate::genes::Contig;

pub const UNCLASSIFIED: &str = "unclassified";

/// Domain content that defines one biosynthetic class.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClassSignature {
    pub label: String,
    #[serde(default)]
    pub all_of: Vec<String>,
    #[serde(default)]
    pub any_of: Vec<String>,
    #[serde(default)]
    pub none_of: Vec<String>,
    /// Minimum number of member genes carrying each accession.
    #[serde(default)]
    pub min_counts: BTreeMap<String, usize>,
}

impl ClassSignature {
    pub fn matches(&self, counts: &BTreeMap<&str, usize>) -> bool {
        let present = |accession: &String| counts.contains_key(accession.as_str());
        self.all_of.iter().all(present)
            && (self.any_of.is_empty() || self.any_of.iter().any(present))
            && !self.none_of.iter().any(present)
            && self.min_counts.iter().all(|(accession, min)| {
                counts.get(accession.as_str()).copied().unwrap_or(0) >= *min
            })
    }

    /// Absence and zero counts hold for any cluster, so a class needs at
    /// least one domain that must be present.
    fn has_required_domain(&self) -> bool {
        !self.all_of.is_empty()
            || !self.any_of.is_empty()
            || self.min_counts.values().any(|min| *min > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignatureTable {
    pub version: String,
    pub classes: Vec<ClassSignature>,
}

impl SignatureTable {
    pub fn validate(&self) -> Result<()> {
        for class in &self.classes {
            if class.label.trim().is_empty() || class.label == UNCLASSIFIED {
                return Err(BgcError::configuration(format!(
                    "Invalid class label '{}' in signature table {}",
                    class.label, self.version
                )));
            }
            if !class.has_required_domain() {
                return Err(BgcError::configuration(format!(
                    "Class {} in signature table {} requires no domain to be present",
                    class.label, self.version
                )));
            }
        }
        Ok(())
    }
}

/// Number of member genes carrying each domain accession, vocabulary or not.
pub fn domain_counts<'a>(cluster: &Cluster, contig: &'a Contig) -> BTreeMap<&'a str, usize> {
    let mut counts = BTreeMap::new();
    for gene in &contig.genes[cluster.start..=cluster.end] {
        let accessions: BTreeSet<&str> = gene.hits.iter().map(|h| h.accession.as_str()).collect();
        for accession in accessions {
            *counts.entry(accession).or_insert(0) += 1;
        }
    }
    counts
}

/// All class labels whose signature the cluster satisfies, or just
/// "unclassified" when none do.
pub fn classify(cluster: &Cluster, contig: &Contig, table: &SignatureTable) -> BTreeSet<String> {
    let counts = domain_counts(cluster, contig);
    let mut labels: BTreeSet<String> = table
        .classes
        .iter()
        .filter(|class| class.matches(&counts))
        .map(|class| class.label.clone())
        .collect();
    if labels.is_empty() {
        labels.insert(UNCLASSIFIED.to_string());
    }
    trace!(
        "Cluster {}:{}-{} of {} genes with domains {:?} classified as {:?}",
        cluster.contig_id,
        cluster.start,
        cluster.end,
        cluster.len(),
        counts,
        labels
    );
    labels
}

/// Attach type labels to every cluster of a contig. One cluster out for each
/// cluster in.
pub fn classify_clusters(
    clusters: Vec<Cluster>,
    contig: &Contig,
    table: &SignatureTable,
) -> Vec<Cluster> {
    clusters
        .into_iter()
        .map(|mut cluster| {
            cluster.labels = classify(&cluster, contig, table);
            cluster
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation_ingestor::AnnotationSchema;
    use crate::genes::{DomainHit, Gene, Strand};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn contig(domains: &[&[&str]]) -> Contig {
        Contig {
            id: "c".to_string(),
            genes: domains
                .iter()
                .enumerate()
                .map(|(i, accessions)| Gene {
                    id: format!("c_{}", i + 1),
                    contig_id: "c".to_string(),
                    order_index: i,
                    coordinates: None,
                    strand: Strand::Forward,
                    hits: accessions
                        .iter()
                        .map(|a| DomainHit {
                            protein_id: format!("c_{}", i + 1),
                            accession: a.to_string(),
                            schema: AnnotationSchema::BroadScan,
                            score: 1.0,
                            coordinates: None,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    fn cluster(start: usize, end: usize) -> Cluster {
        Cluster {
            contig_id: "c".to_string(),
            start,
            end,
            gene_ids: vec![],
            score: 0.9,
            labels: BTreeSet::new(),
            refined: None,
        }
    }

    fn signature(label: &str) -> ClassSignature {
        ClassSignature {
            label: label.to_string(),
            all_of: vec![],
            any_of: vec![],
            none_of: vec![],
            min_counts: BTreeMap::new(),
        }
    }

    fn table() -> SignatureTable {
        let mut t1pks = signature("T1PKS");
        t1pks.all_of = vec!["PKS_KS".to_string(), "PKS_AT".to_string()];
        let mut nrps = signature("NRPS");
        nrps.any_of = vec!["Condensation".to_string(), "Cglyc".to_string()];
        nrps.min_counts.insert("AMP-binding".to_string(), 2);
        let mut terpene = signature("terpene");
        terpene.all_of = vec!["Terpene_synth".to_string()];
        terpene.none_of = vec!["PKS_KS".to_string()];
        SignatureTable {
            version: "test".to_string(),
            classes: vec![t1pks, nrps, terpene],
        }
    }

    #[test]
    fn test_multiple_labels() {
        init();
        let c = contig(&[
            &["PKS_KS", "PKS_AT"],
            &["AMP-binding", "Condensation"],
            &["AMP-binding"],
            &["Terpene_synth"],
        ]);
        let labels = classify(&cluster(0, 3), &c, &table());
        assert_eq!(
            vec!["NRPS", "T1PKS"],
            labels.iter().map(|l| l.as_str()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_multiplicity_counts_genes() {
        init();
        // One gene with two AMP-binding hits does not satisfy a count of 2
        let c = contig(&[&["AMP-binding", "AMP-binding", "Condensation"]]);
        assert!(classify(&cluster(0, 0), &c, &table()).contains(UNCLASSIFIED));
    }

    #[test]
    fn test_absence_condition() {
        init();
        let c = contig(&[&["Terpene_synth"], &["PKS_KS"]]);
        assert!(classify(&cluster(0, 0), &c, &table()).contains("terpene"));
        assert!(!classify(&cluster(0, 1), &c, &table()).contains("terpene"));
    }

    #[test]
    fn test_every_cluster_kept() {
        init();
        let c = contig(&[&[], &["PKS_KS", "PKS_AT"], &[], &["Unknown"]]);
        let classified = classify_clusters(
            vec![cluster(0, 0), cluster(1, 1), cluster(3, 3)],
            &c,
            &table(),
        );
        assert_eq!(3, classified.len());
        assert!(classified[0].labels.contains(UNCLASSIFIED));
        assert!(classified[1].labels.contains("T1PKS"));
        assert_eq!(1, classified[2].labels.len());
    }

    #[test]
    fn test_validation() {
        init();
        assert!(table().validate().is_ok());
        let mut bad = table();
        bad.classes.push(signature("empty"));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_class_must_require_a_domain() {
        init();
        let mut absence_only = signature("no_pks");
        absence_only.none_of = vec!["PKS_KS".to_string()];
        let mut zero_count = signature("zero");
        zero_count.min_counts.insert("AMP-binding".to_string(), 0);
        for class in vec![absence_only, zero_count] {
            // Either would label a cluster without any hits
            assert!(class.matches(&BTreeMap::new()));
            let mut bad = table();
            bad.classes.push(class);
            assert!(matches!(bad.validate(), Err(BgcError::Configuration(_))));
        }

        let mut counted = signature("counted");
        counted.min_counts.insert("AMP-binding".to_string(), 1);
        let mut good = table();
        good.classes.push(counted);
        assert!(good.validate().is_ok());
    }
}
