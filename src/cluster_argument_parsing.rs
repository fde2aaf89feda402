use std::fs::File;
use std::io::BufWriter;

use clap::*;

use crate::annotation_ingestor::AnnotationSchema;
use crate::artifact::{Artifact, ArtifactKind, PrecomputedArtifact};
use crate::cluster_report::write_cluster_report;
use crate::error::{BgcError, Result};
use crate::model_assets::ModelAssets;
use crate::pipeline::{run, RunContext, RunInputs};
use crate::ArtifactProducer;

fn precomputed(path: &str, kind: ArtifactKind) -> Box<dyn ArtifactProducer> {
    Box::new(PrecomputedArtifact {
        artifact: Artifact::new(path, kind),
    })
}

fn generate_run_inputs(m: &ArgMatches) -> Result<RunInputs> {
    let gene_order_sources = [
        ("proteins", ArtifactKind::ProteinSequences),
        ("features", ArtifactKind::FeatureList),
        ("genbank", ArtifactKind::GenBank),
    ];
    let given: Vec<(&String, ArtifactKind)> = gene_order_sources
        .iter()
        .filter_map(|(arg, kind)| m.get_one::<String>(arg).map(|path| (path, *kind)))
        .collect();
    let gene_order = match given.as_slice() {
        [(path, kind)] => precomputed(path, *kind),
        _ => {
            return Err(BgcError::configuration(
                "Exactly one of --proteins, --features or --genbank must be given",
            ))
        }
    };

    let mut annotations = vec![];
    if let Some(ip_file) = m.get_one::<String>("ip-file") {
        annotations.push(precomputed(
            ip_file,
            ArtifactKind::Annotation(AnnotationSchema::BroadScan),
        ));
    }
    if let Some(hmm_file) = m.get_one::<String>("hmm-file") {
        annotations.push(precomputed(
            hmm_file,
            ArtifactKind::Annotation(AnnotationSchema::DomainLibrary),
        ));
    }
    Ok(RunInputs {
        gene_order,
        annotations,
    })
}

pub fn run_detect_subcommand(matches: &ArgMatches) -> Result<()> {
    let m = matches
        .subcommand_matches("detect")
        .ok_or_else(|| BgcError::configuration("detect subcommand not given"))?;

    let model_dir = m
        .get_one::<String>("model-dir")
        .ok_or_else(|| BgcError::configuration("--model-dir is required"))?;
    let assets = ModelAssets::load(model_dir)?;

    let score = m.get_one::<f64>("score").copied();
    let greediness = m.get_one::<u8>("greed").copied();
    let ctx = RunContext::new(
        &assets,
        score,
        greediness,
        m.get_flag("refined"),
        *m.get_one::<usize>("threads").unwrap_or(&1),
    )?;

    let inputs = generate_run_inputs(m)?;
    let summary = run(&ctx, &inputs)?;
    info!(
        "Processed {} genes on {} contigs with {} domain hits ({} hits did not match a gene)",
        summary.num_genes, summary.num_contigs, summary.num_hits, summary.mismatched_hits
    );
    if !summary.empty_contigs.is_empty() {
        warn!(
            "{} contigs had no genes: {:?}",
            summary.empty_contigs.len(),
            summary.empty_contigs
        );
    }

    match m.get_one::<String>("output") {
        Some(path) => {
            info!("Writing cluster report to {} ..", path);
            write_cluster_report(&summary.clusters, BufWriter::new(File::create(path)?))?
        }
        None => write_cluster_report(&summary.clusters, std::io::stdout().lock())?,
    }
    info!("Finished, reporting {} clusters", summary.clusters.len());
    Ok(())
}

pub fn add_detect_subcommand(app: Command) -> Command {
    let detect_subcommand = bird_tool_utils::clap_utils::add_clap_verbosity_flags(
        Command::new("detect")
            .about("Detect biosynthetic gene clusters from protein domain annotations")
            .arg(
                Arg::new("proteins")
                    .long("proteins")
                    .help("Predicted protein FASTA, headers '<contig>_<n>', in gene order"),
            )
            .arg(
                Arg::new("features")
                    .long("features")
                    .help("GFF3 with CDS features carrying protein_id, locus_tag or ID"),
            )
            .arg(
                Arg::new("genbank")
                    .long("genbank")
                    .help("GenBank file; CDS features with a translation are the genes"),
            )
            .group(
                ArgGroup::new("gene-order")
                    .args(["proteins", "features", "genbank"])
                    .required(true),
            )
            .arg(
                Arg::new("ip-file")
                    .long("ip-file")
                    .help("Domain scan table in InterProScan TSV format"),
            )
            .arg(
                Arg::new("hmm-file")
                    .long("hmm-file")
                    .help("Per-domain hit table (hmmscan --domtblout) of the curated library"),
            )
            .group(
                ArgGroup::new("annotations")
                    .args(["ip-file", "hmm-file"])
                    .multiple(true)
                    .required(true),
            )
            .arg(
                Arg::new("model-dir")
                    .long("model-dir")
                    .required(true)
                    .help("Directory holding the model and calibration JSON assets"),
            )
            .arg(
                Arg::new("greed")
                    .long("greed")
                    .value_parser(value_parser!(u8))
                    .default_value(crate::DEFAULT_GREEDINESS)
                    .help("Level of greediness: 0 (strict), 1 (balanced) or 2 (permissive)"),
            )
            .arg(
                Arg::new("score")
                    .long("score")
                    .value_parser(value_parser!(f64))
                    .help("Explicit probability threshold. Overrides --greed"),
            )
            .arg(
                Arg::new("refined")
                    .long("refined")
                    .action(ArgAction::SetTrue)
                    .help("Also report high probability sub-boundaries of each cluster"),
            )
            .arg(
                Arg::new("output")
                    .long("output")
                    .help("Output cluster table [default: stdout]"),
            )
            .arg(
                Arg::new("threads")
                    .short('t')
                    .long("threads")
                    .value_parser(value_parser!(usize))
                    .default_value(crate::DEFAULT_THREADS)
                    .help("Number of contigs to process in parallel"),
            ),
    );

    app.subcommand(detect_subcommand)
}
