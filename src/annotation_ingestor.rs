use std::fs::File;
use std::io::{BufRead, BufReader, Read};

use crate::artifact::{validate_artifact, Artifact, ArtifactKind};
use crate::error::{BgcError, Result};
use crate::genes::{Coordinates, DomainHit};

/// Highest score an E-value can be normalised to.
pub const MAX_EVALUE_SCORE: f64 = 300.0;
/// Score given to hits whose scan reports no E-value at all.
pub const PRESENCE_SCORE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnnotationSchema {
    /// Tab separated multi-analysis domain scan table (InterProScan TSV).
    BroadScan,
    /// Per-domain hit table from a curated HMM library (hmmscan --domtblout).
    DomainLibrary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreKind {
    /// Lower is better. Normalised to -log10(evalue).
    EValue,
    BitScore,
}

/// Where each normalised field lives in a row of a given schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnMapping {
    pub id_field: usize,
    pub domain_field: usize,
    pub score_field: usize,
    pub coordinate_fields: Option<(usize, usize)>,
    pub min_columns: usize,
    pub max_columns: Option<usize>,
    pub score_kind: ScoreKind,
}

impl AnnotationSchema {
    pub fn column_mapping(&self) -> ColumnMapping {
        match self {
            AnnotationSchema::BroadScan => ColumnMapping {
                id_field: 0,
                domain_field: 4,
                score_field: 8,
                coordinate_fields: Some((6, 7)),
                min_columns: 11,
                max_columns: Some(15),
                score_kind: ScoreKind::EValue,
            },
            AnnotationSchema::DomainLibrary => ColumnMapping {
                id_field: 3,
                domain_field: 0,
                score_field: 13,
                coordinate_fields: Some((17, 18)),
                // The trailing description may contain spaces, so no maximum
                min_columns: 22,
                max_columns: None,
                score_kind: ScoreKind::BitScore,
            },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AnnotationSchema::BroadScan => "broad domain scan",
            AnnotationSchema::DomainLibrary => "curated domain library",
        }
    }
}

/// Artifact kinds `parse` reads.
pub const ANNOTATION_KINDS: [ArtifactKind; 2] = [
    ArtifactKind::Annotation(AnnotationSchema::BroadScan),
    ArtifactKind::Annotation(AnnotationSchema::DomainLibrary),
];

/// Parse a domain-hit table described by an annotation artifact.
pub fn parse(artifact: &Artifact) -> Result<Vec<DomainHit>> {
    validate_artifact(artifact, &ANNOTATION_KINDS)?;
    let schema = match artifact.kind {
        ArtifactKind::Annotation(schema) => schema,
        other => {
            return Err(BgcError::configuration(format!(
                "{} is a {:?} artifact, not an annotation table",
                artifact.display_path(),
                other
            )))
        }
    };
    info!(
        "Reading {} annotations from {} ..",
        schema.name(),
        artifact.display_path()
    );
    let file = File::open(&artifact.path)?;
    parse_reader(file, schema, &artifact.display_path())
}

pub fn parse_reader<R: Read>(
    reader: R,
    schema: AnnotationSchema,
    label: &str,
) -> Result<Vec<DomainHit>> {
    let rows = match schema {
        AnnotationSchema::BroadScan => tab_separated_rows(reader),
        AnnotationSchema::DomainLibrary => whitespace_separated_rows(reader)?,
    };
    collect_hits(rows, schema, label)
}

type Row = (usize, std::result::Result<Vec<String>, String>);

fn tab_separated_rows<R: Read>(reader: R) -> Vec<Row> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    rdr.records()
        .enumerate()
        .map(|(i, record_res)| match record_res {
            Ok(record) => {
                let line = record
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(i + 1);
                (line, Ok(record.iter().map(|f| f.to_string()).collect()))
            }
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(i + 1);
                (line, Err(e.to_string()))
            }
        })
        .collect()
}

fn whitespace_separated_rows<R: Read>(reader: R) -> Result<Vec<Row>> {
    let mut rows = vec![];
    for (i, line_res) in BufReader::new(reader).lines().enumerate() {
        let line = line_res?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        rows.push((
            i + 1,
            Ok(trimmed.split_whitespace().map(|f| f.to_string()).collect()),
        ));
    }
    Ok(rows)
}

fn collect_hits(rows: Vec<Row>, schema: AnnotationSchema, label: &str) -> Result<Vec<DomainHit>> {
    let mapping = schema.column_mapping();
    let mut hits = vec![];
    let mut skipped = 0usize;
    let num_rows = rows.len();

    for (line, fields_res) in rows {
        let parsed = fields_res.and_then(|fields| row_to_hit(&fields, &mapping, schema));
        match parsed {
            Ok(hit) => {
                trace!("Read hit {:?}", hit);
                hits.push(hit)
            }
            Err(message) => {
                let e = BgcError::Parse {
                    path: label.to_string(),
                    line,
                    message,
                };
                warn!("Skipping row: {}", e);
                skipped += 1;
            }
        }
    }

    if num_rows == 0 {
        warn!("No domain hits found in {}", label);
    } else if hits.is_empty() {
        return Err(BgcError::NoValidRows {
            path: label.to_string(),
            skipped,
        });
    }
    info!(
        "Read {} domain hits from {} ({} malformed rows skipped)",
        hits.len(),
        label,
        skipped
    );
    Ok(hits)
}

fn row_to_hit(
    fields: &[String],
    mapping: &ColumnMapping,
    schema: AnnotationSchema,
) -> std::result::Result<DomainHit, String> {
    if fields.len() < mapping.min_columns
        || mapping.max_columns.map_or(false, |max| fields.len() > max)
    {
        return Err(format!(
            "found {} columns, expected {}{}",
            fields.len(),
            mapping.min_columns,
            match mapping.max_columns {
                Some(max) => format!("-{}", max),
                None => " or more".to_string(),
            }
        ));
    }

    let protein_id = fields[mapping.id_field].trim();
    let accession = fields[mapping.domain_field].trim();
    if protein_id.is_empty() || accession.is_empty() {
        return Err("empty protein id or domain accession".to_string());
    }

    let score = normalise_score(&fields[mapping.score_field], mapping.score_kind)?;

    let coordinates = match mapping.coordinate_fields {
        Some((start_field, end_field)) => {
            let start = parse_position(&fields[start_field])?;
            let end = parse_position(&fields[end_field])?;
            if start > end {
                return Err(format!("domain start {} is after end {}", start, end));
            }
            Some(Coordinates { start, end })
        }
        None => None,
    };

    Ok(DomainHit {
        protein_id: protein_id.to_string(),
        accession: accession.to_string(),
        schema,
        score,
        coordinates,
    })
}

fn parse_position(field: &str) -> std::result::Result<u64, String> {
    field
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("failed to parse coordinate '{}'", field))
}

pub fn normalise_score(field: &str, kind: ScoreKind) -> std::result::Result<f64, String> {
    let field = field.trim();
    match kind {
        ScoreKind::EValue => {
            if field == "-" {
                return Ok(PRESENCE_SCORE);
            }
            let evalue: f64 = field
                .parse()
                .map_err(|_| format!("failed to parse E-value '{}'", field))?;
            if !evalue.is_finite() || evalue < 0.0 {
                return Err(format!("invalid E-value '{}'", field));
            }
            if evalue == 0.0 {
                Ok(MAX_EVALUE_SCORE)
            } else {
                Ok((-evalue.log10()).max(0.0).min(MAX_EVALUE_SCORE))
            }
        }
        ScoreKind::BitScore => {
            let score: f64 = field
                .parse()
                .map_err(|_| format!("failed to parse score '{}'", field))?;
            if !score.is_finite() {
                return Err(format!("non-finite score '{}'", field));
            }
            Ok(score)
        }
    }
}
