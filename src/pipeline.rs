use rayon::prelude::*;

use crate::annotation_ingestor::{self, ANNOTATION_KINDS};
use crate::artifact::obtain_artifact;
use crate::cluster_definer::{self, Cluster, ClusterPolicy};
use crate::error::{BgcError, Result};
use crate::feature_matrix;
use crate::gene_order::{self, GENE_ORDER_KINDS};
use crate::genes::{score_genes, Contig};
use crate::model_assets::ModelAssets;
use crate::type_classifier;
use crate::ArtifactProducer;

/// Everything a run needs besides its inputs. Passed explicitly to each stage.
pub struct RunContext<'a> {
    pub assets: &'a ModelAssets,
    pub policy: ClusterPolicy,
    pub threads: usize,
}

impl<'a> RunContext<'a> {
    pub fn new(
        assets: &'a ModelAssets,
        score: Option<f64>,
        greediness: Option<u8>,
        refined: bool,
        threads: usize,
    ) -> Result<RunContext<'a>> {
        if threads == 0 {
            return Err(BgcError::configuration("At least one thread is required"));
        }
        let policy = ClusterPolicy::resolve(score, greediness, &assets.calibration, refined)?;
        info!(
            "Defining clusters with threshold {} and gap tolerance {}",
            policy.threshold, policy.gap_tolerance
        );
        Ok(RunContext {
            assets,
            policy,
            threads,
        })
    }
}

pub struct RunInputs {
    pub gene_order: Box<dyn ArtifactProducer>,
    pub annotations: Vec<Box<dyn ArtifactProducer>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub clusters: Vec<Cluster>,
    pub num_contigs: usize,
    pub num_genes: usize,
    pub num_hits: usize,
    pub mismatched_hits: usize,
    pub empty_contigs: Vec<String>,
}

/// Ingest, resolve gene order and detect clusters across all contigs.
pub fn run(ctx: &RunContext, inputs: &RunInputs) -> Result<RunSummary> {
    let order_artifact = obtain_artifact(inputs.gene_order.as_ref(), &GENE_ORDER_KINDS)?;
    let annotation_artifacts = inputs
        .annotations
        .iter()
        .map(|producer| obtain_artifact(producer.as_ref(), &ANNOTATION_KINDS))
        .collect::<Result<Vec<_>>>()?;

    let mut hits = vec![];
    for artifact in &annotation_artifacts {
        hits.extend(annotation_ingestor::parse(artifact)?);
    }
    let num_hits = hits.len();

    let contigs = gene_order::resolve(&order_artifact)?;
    let (contigs, mismatched_hits) = gene_order::attach_hits(contigs, hits);

    let clusters = detect_clusters(ctx, &contigs)?;
    Ok(RunSummary {
        clusters,
        num_contigs: contigs.len(),
        num_genes: contigs.iter().map(|c| c.len()).sum(),
        num_hits,
        mismatched_hits,
        empty_contigs: contigs
            .iter()
            .filter(|c| c.is_empty())
            .map(|c| c.id.clone())
            .collect(),
    })
}

/// Run the per-contig stages in parallel. Clusters come back in contig order.
pub fn detect_clusters(ctx: &RunContext, contigs: &[Contig]) -> Result<Vec<Cluster>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(ctx.threads)
        .build()
        .map_err(|e| BgcError::configuration(format!("Failed to start worker pool: {}", e)))?;

    info!(
        "Detecting clusters on {} contigs with {} threads ..",
        contigs.len(),
        ctx.threads
    );
    let per_contig: Vec<Vec<Cluster>> = pool.install(|| {
        contigs
            .par_iter()
            .map(|contig| process_contig(ctx, contig))
            .collect()
    });
    let clusters: Vec<Cluster> = per_contig.into_iter().flatten().collect();
    info!("Found {} clusters", clusters.len());
    Ok(clusters)
}

/// matrix -> probabilities -> clusters -> labels for one contig.
pub fn process_contig(ctx: &RunContext, contig: &Contig) -> Vec<Cluster> {
    if contig.is_empty() {
        warn!("Contig {} has no genes, no clusters will be reported", contig.id);
        return vec![];
    }
    let matrix = feature_matrix::build(contig, &ctx.assets.vocabulary);
    let probabilities = ctx.assets.predictor.predict(&matrix);
    let clusters = cluster_definer::define_clusters(contig, &probabilities, &ctx.policy);
    for scored in score_genes(contig, &probabilities) {
        trace!(
            "{} gene {} probability {} clustered {}",
            contig.id,
            scored.gene.id,
            scored.probability,
            clusters
                .iter()
                .any(|c| c.contains(scored.gene.order_index))
        );
    }
    type_classifier::classify_clusters(clusters, contig, &ctx.assets.signatures)
}
