pub mod annotation_ingestor;
pub mod artifact;
pub mod cluster_argument_parsing;
pub mod cluster_definer;
pub mod cluster_report;
pub mod error;
pub mod feature_matrix;
pub mod gene_order;
pub mod genes;
pub mod model_assets;
pub mod pipeline;
pub mod region_predictor;
pub mod type_classifier;

#[macro_use]
extern crate log;
extern crate clap;
extern crate rayon;

use crate::artifact::Artifact;
use crate::error::Result;

/// An upstream collaborator (gene caller, domain scanner, ...) that hands
/// over a described file rather than an assumed path.
pub trait ArtifactProducer {
    fn produce(&self) -> Result<Artifact>;

    fn method_name(&self) -> &str;
}

pub const DEFAULT_GREEDINESS: &str = "1";
pub const DEFAULT_THREADS: &str = "1";

pub const AUTHOR: &str = "bgcscan developers";
