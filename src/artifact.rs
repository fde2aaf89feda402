use std::path::{Path, PathBuf};

use crate::annotation_ingestor::AnnotationSchema;
use crate::error::{BgcError, Result};
use crate::ArtifactProducer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Annotation(AnnotationSchema),
    /// Predicted-protein FASTA, gene order given by emission order.
    ProteinSequences,
    /// GFF3 feature list with CDS coordinates.
    FeatureList,
    /// GenBank records with translated CDS features.
    GenBank,
}

impl ArtifactKind {
    pub fn supported_schema_versions(&self) -> &'static [&'static str] {
        match self {
            ArtifactKind::Annotation(AnnotationSchema::BroadScan) => &["5"],
            ArtifactKind::Annotation(AnnotationSchema::DomainLibrary) => &["3"],
            ArtifactKind::ProteinSequences | ArtifactKind::FeatureList | ArtifactKind::GenBank => {
                &["1"]
            }
        }
    }

    pub fn default_schema_version(&self) -> &'static str {
        self.supported_schema_versions()[0]
    }
}

/// A file handed over by an upstream producer, described by what it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub schema_version: String,
}

impl Artifact {
    pub fn new<P: AsRef<Path>>(path: P, kind: ArtifactKind) -> Artifact {
        Artifact {
            path: path.as_ref().to_path_buf(),
            kind,
            schema_version: kind.default_schema_version().to_string(),
        }
    }

    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

/// An artifact the user already produced, e.g. a pre-computed scan table.
pub struct PrecomputedArtifact {
    pub artifact: Artifact,
}

impl ArtifactProducer for PrecomputedArtifact {
    fn produce(&self) -> Result<Artifact> {
        Ok(self.artifact.clone())
    }

    fn method_name(&self) -> &str {
        "precomputed"
    }
}

/// Check an artifact is one of the kinds a reader accepts, in a schema
/// version it supports, before anything is parsed.
pub fn validate_artifact(artifact: &Artifact, accepted: &[ArtifactKind]) -> Result<()> {
    if !accepted.contains(&artifact.kind) {
        return Err(BgcError::configuration(format!(
            "{} is a {:?} artifact, expected one of {:?}",
            artifact.display_path(),
            artifact.kind,
            accepted
        )));
    }
    if !artifact
        .kind
        .supported_schema_versions()
        .contains(&artifact.schema_version.as_str())
    {
        return Err(BgcError::configuration(format!(
            "Unsupported schema version '{}' for {} (supported: {:?})",
            artifact.schema_version,
            artifact.display_path(),
            artifact.kind.supported_schema_versions()
        )));
    }
    if !artifact.path.is_file() {
        return Err(BgcError::configuration(format!(
            "Input file {} does not exist",
            artifact.display_path()
        )));
    }
    debug!(
        "Validated {:?} artifact {} (schema version {})",
        artifact.kind,
        artifact.display_path(),
        artifact.schema_version
    );
    Ok(())
}

/// Ask a producer for its artifact and validate it at the boundary.
pub fn obtain_artifact<P: ArtifactProducer + ?Sized>(
    producer: &P,
    accepted: &[ArtifactKind],
) -> Result<Artifact> {
    let artifact = producer.produce()?;
    debug!(
        "Obtained {} from {} producer",
        artifact.display_path(),
        producer.method_name()
    );
    validate_artifact(&artifact, accepted)?;
    Ok(artifact)
}
