use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

use needletail::FastxReader;

use crate::artifact::{validate_artifact, Artifact, ArtifactKind};
use crate::error::{BgcError, Result};
use crate::genes::{Contig, Coordinates, DomainHit, Gene, Strand};

/// One gene as read from an order source, before contigs are assembled.
#[derive(Debug, Clone, PartialEq)]
struct GeneRecord {
    id: String,
    contig_id: String,
    coordinates: Option<Coordinates>,
    strand: Strand,
}

/// Artifact kinds `resolve` reads.
pub const GENE_ORDER_KINDS: [ArtifactKind; 3] = [
    ArtifactKind::ProteinSequences,
    ArtifactKind::FeatureList,
    ArtifactKind::GenBank,
];

/// Establish the ordered genes of each contig from a protein FASTA, a GFF3
/// feature list or GenBank records.
pub fn resolve(artifact: &Artifact) -> Result<Vec<Contig>> {
    validate_artifact(artifact, &GENE_ORDER_KINDS)?;
    let label = artifact.display_path();
    match artifact.kind {
        ArtifactKind::ProteinSequences => {
            info!("Resolving gene order from protein sequences in {} ..", label);
            if std::fs::metadata(&artifact.path)?.len() == 0 {
                warn!("Protein sequence file {} is empty", label);
                return Ok(vec![]);
            }
            resolve_protein_reader(File::open(&artifact.path)?, &label)
        }
        ArtifactKind::FeatureList => {
            info!("Resolving gene order from feature list {} ..", label);
            resolve_feature_list(File::open(&artifact.path)?, &label)
        }
        ArtifactKind::GenBank => {
            info!("Resolving gene order from GenBank records in {} ..", label);
            resolve_genbank(BufReader::new(File::open(&artifact.path)?), &label)
        }
        ArtifactKind::Annotation(_) => Err(BgcError::configuration(format!(
            "{} is an annotation table, not a gene order source",
            label
        ))),
    }
}

/// Read gene order from protein FASTA content, e.g. gene caller output.
pub fn resolve_protein_reader<R: Read + Send + 'static>(
    reader: R,
    label: &str,
) -> Result<Vec<Contig>> {
    let fastx = needletail::parse_fastx_reader(reader).map_err(|e| BgcError::Sequence {
        path: label.to_string(),
        message: e.to_string(),
    })?;
    Ok(assemble_contigs(read_protein_headers(fastx, label)?, false))
}

fn read_protein_headers(
    mut reader: Box<dyn FastxReader>,
    label: &str,
) -> Result<Vec<GeneRecord>> {
    let mut records = vec![];
    while let Some(record_res) = reader.next() {
        let record = record_res.map_err(|e| BgcError::Sequence {
            path: label.to_string(),
            message: e.to_string(),
        })?;
        let header = String::from_utf8_lossy(record.id()).to_string();
        match parse_protein_header(&header) {
            Some(gene) => records.push(gene),
            None => warn!("Skipping protein with empty header in {}", label),
        }
    }
    debug!("Read {} protein headers from {}", records.len(), label);
    Ok(records)
}

/// Parse a FASTA header, taking coordinates from the gene caller layout
/// `id # start # end # strand # attributes` when present.
fn parse_protein_header(header: &str) -> Option<GeneRecord> {
    let parts: Vec<&str> = header.split(" # ").collect();
    let id = parts[0].split_whitespace().next()?.to_string();

    let (coordinates, strand) = if parts.len() >= 4 {
        match (
            parts[1].trim().parse::<u64>(),
            parts[2].trim().parse::<u64>(),
        ) {
            (Ok(start), Ok(end)) if start <= end => {
                (Some(Coordinates { start, end }), Strand::parse(parts[3]))
            }
            _ => (None, Strand::Unknown),
        }
    } else {
        (None, Strand::Unknown)
    };

    let contig_id = match contig_from_protein_id(&id) {
        Some(contig) => contig.to_string(),
        None => {
            debug!(
                "Protein id {} has no numeric gene suffix, treating it as its own contig",
                id
            );
            id.clone()
        }
    };

    Some(GeneRecord {
        id,
        contig_id,
        coordinates,
        strand,
    })
}

/// Gene callers name proteins `<contig>_<n>`.
pub fn contig_from_protein_id(protein_id: &str) -> Option<&str> {
    let (contig, suffix) = protein_id.rsplit_once('_')?;
    if contig.is_empty() || suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(contig)
}

/// Read CDS features from GFF3 content.
pub fn resolve_feature_list<R: Read>(reader: R, label: &str) -> Result<Vec<Contig>> {
    let mut records = vec![];
    let mut num_rows = 0usize;
    let mut skipped = 0usize;

    for (i, line_res) in BufReader::new(reader).lines().enumerate() {
        let line = line_res?;
        if line.starts_with("##FASTA") {
            break;
        }
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        num_rows += 1;
        match parse_feature_row(&line) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(message) => {
                let e = BgcError::Parse {
                    path: label.to_string(),
                    line: i + 1,
                    message,
                };
                warn!("Skipping feature: {}", e);
                skipped += 1;
            }
        }
    }

    if num_rows > 0 && records.is_empty() && skipped > 0 {
        return Err(BgcError::NoValidRows {
            path: label.to_string(),
            skipped,
        });
    }
    debug!(
        "Read {} CDS features from {} ({} skipped)",
        records.len(),
        label,
        skipped
    );
    Ok(assemble_contigs(records, true))
}

fn parse_feature_row(line: &str) -> std::result::Result<Option<GeneRecord>, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 9 {
        return Err(format!("found {} columns, expected 9", fields.len()));
    }
    if fields[2] != "CDS" {
        return Ok(None);
    }
    let start: u64 = fields[3]
        .parse()
        .map_err(|_| format!("failed to parse start '{}'", fields[3]))?;
    let end: u64 = fields[4]
        .parse()
        .map_err(|_| format!("failed to parse end '{}'", fields[4]))?;
    if start > end {
        return Err(format!("feature start {} is after end {}", start, end));
    }

    let attributes: HashMap<&str, &str> = fields[8]
        .split(';')
        .filter_map(|kv| kv.trim().split_once('='))
        .collect();
    let id = ["protein_id", "locus_tag", "ID"]
        .iter()
        .find_map(|key| attributes.get(key))
        .map(|id| id.replace(' ', ""))
        .ok_or_else(|| "CDS has no protein_id, locus_tag or ID attribute".to_string())?;

    Ok(Some(GeneRecord {
        id,
        contig_id: fields[0].to_string(),
        coordinates: Some(Coordinates { start, end }),
        strand: Strand::parse(fields[6]),
    }))
}

/// Read translated CDS features from GenBank records. Each record is a contig
/// and its genes are ordered by location start.
pub fn resolve_genbank<R: Read>(reader: R, label: &str) -> Result<Vec<Contig>> {
    let mut records = vec![];
    for (i, seq_res) in gb_io::reader::SeqReader::new(reader).enumerate() {
        let seq = seq_res.map_err(|e| BgcError::Sequence {
            path: label.to_string(),
            message: e.to_string(),
        })?;
        let contig_id = seq
            .name
            .clone()
            .unwrap_or_else(|| format!("record_{}", i + 1));
        let before = records.len();
        records.extend(
            seq.features
                .iter()
                .filter_map(|feature| genbank_cds(feature, &contig_id)),
        );
        if records.len() == before {
            info!("No CDS with a translation found in {} of {}", contig_id, label);
        }
    }
    debug!("Read {} translated CDS features from {}", records.len(), label);
    Ok(assemble_contigs(records, true))
}

fn genbank_cds(feature: &gb_io::seq::Feature, contig_id: &str) -> Option<GeneRecord> {
    if !feature.kind.to_string().eq_ignore_ascii_case("CDS") {
        return None;
    }
    if feature.qualifier_values("translation".into()).next().is_none() {
        trace!("Skipping CDS without a translation on {}", contig_id);
        return None;
    }
    let id = match feature
        .qualifier_values("protein_id".into())
        .next()
        .map(|id| id.replace(' ', ""))
        .or_else(|| {
            feature
                .qualifier_values("locus_tag".into())
                .next()
                .map(|tag| tag.to_string())
        }) {
        Some(id) => id,
        None => {
            warn!(
                "Skipping translated CDS on {} with neither protein_id nor locus_tag",
                contig_id
            );
            return None;
        }
    };

    // gb-io locations are 0-based and end-exclusive
    let coordinates = match feature.location.find_bounds() {
        Ok((from, to)) if from >= 0 && from < to => Some(Coordinates {
            start: from as u64 + 1,
            end: to as u64,
        }),
        _ => None,
    };
    Some(GeneRecord {
        id,
        contig_id: contig_id.to_string(),
        coordinates,
        strand: genbank_strand(&feature.location),
    })
}

fn genbank_strand(location: &gb_io::seq::Location) -> Strand {
    use gb_io::seq::Location;
    match location {
        Location::Complement(_) => Strand::Reverse,
        Location::Join(parts) if parts.iter().all(|p| matches!(p, Location::Complement(_))) => {
            Strand::Reverse
        }
        _ => Strand::Forward,
    }
}

/// Group records into contigs in first-seen order and assign order indices.
fn assemble_contigs(records: Vec<GeneRecord>, sort_by_coordinates: bool) -> Vec<Contig> {
    let mut contig_index: HashMap<String, usize> = HashMap::new();
    let mut grouped: Vec<(String, Vec<GeneRecord>)> = vec![];
    let mut seen_ids: HashSet<String> = HashSet::new();

    for record in records {
        if !seen_ids.insert(record.id.clone()) {
            warn!(
                "Protein id {} found multiple times, keeping the first occurrence",
                record.id
            );
            continue;
        }
        let index = *contig_index
            .entry(record.contig_id.clone())
            .or_insert_with(|| {
                grouped.push((record.contig_id.clone(), vec![]));
                grouped.len() - 1
            });
        grouped[index].1.push(record);
    }

    grouped
        .into_iter()
        .map(|(contig_id, mut genes)| {
            if sort_by_coordinates {
                if genes.iter().all(|g| g.coordinates.is_some()) {
                    genes.sort_by_key(|g| g.coordinates);
                } else {
                    debug!(
                        "Not all genes on {} have coordinates, keeping input order",
                        contig_id
                    );
                }
            }
            Contig {
                genes: genes
                    .into_iter()
                    .enumerate()
                    .map(|(order_index, record)| Gene {
                        id: record.id,
                        contig_id: record.contig_id,
                        order_index,
                        coordinates: record.coordinates,
                        strand: record.strand,
                        hits: vec![],
                    })
                    .collect(),
                id: contig_id,
            }
        })
        .collect()
}

/// Attach each hit to the gene it names. Hits naming no resolved gene are
/// dropped; the number dropped is returned alongside the new contigs.
pub fn attach_hits(mut contigs: Vec<Contig>, hits: Vec<DomainHit>) -> (Vec<Contig>, usize) {
    let mut locations: HashMap<String, (usize, usize)> = HashMap::new();
    for (ci, contig) in contigs.iter().enumerate() {
        for (gi, gene) in contig.genes.iter().enumerate() {
            locations.insert(gene.id.clone(), (ci, gi));
        }
    }

    let mut mismatched = 0usize;
    for hit in hits {
        match locations.get(&hit.protein_id) {
            Some((ci, gi)) => contigs[*ci].genes[*gi].hits.push(hit),
            None => {
                let e = BgcError::ReferenceMismatch {
                    protein_id: hit.protein_id.clone(),
                    accession: hit.accession.clone(),
                };
                debug!("Dropping hit: {}", e);
                if mismatched == 0 {
                    warn!("{}", e);
                }
                mismatched += 1;
            }
        }
    }
    if mismatched > 0 {
        warn!(
            "Dropped {} domain hits whose protein ids were not found in the gene order",
            mismatched
        );
    }
    (contigs, mismatched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation_ingestor::AnnotationSchema;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn hit(protein_id: &str, accession: &str) -> DomainHit {
        DomainHit {
            protein_id: protein_id.to_string(),
            accession: accession.to_string(),
            schema: AnnotationSchema::DomainLibrary,
            score: 10.0,
            coordinates: None,
        }
    }

    fn assert_order_invariant(contigs: &[Contig]) {
        for contig in contigs {
            for (i, gene) in contig.genes.iter().enumerate() {
                assert_eq!(i, gene.order_index);
                assert_eq!(contig.id, gene.contig_id);
            }
        }
    }

    #[test]
    fn test_protein_emission_order() {
        init();
        let faa = ">contigA_1 # 3 # 300 # 1 # ID=1_1\nMKL\n\
                   >contigA_2 # 400 # 900 # -1 # ID=1_2\nMAA\n\
                   >contigB_1 # 1 # 90 # 1 # ID=2_1\nMTT\n\
                   >contigA_3 # 1000 # 1500 # 1 # ID=1_3\nMGG\n";
        let contigs = resolve_protein_reader(std::io::Cursor::new(faa.as_bytes().to_vec()), "faa")
            .unwrap();
        assert_eq!(2, contigs.len());
        assert_eq!("contigA", contigs[0].id);
        assert_eq!(
            vec!["contigA_1", "contigA_2", "contigA_3"],
            contigs[0].genes.iter().map(|g| g.id.as_str()).collect::<Vec<_>>()
        );
        assert_eq!(Strand::Reverse, contigs[0].genes[1].strand);
        assert_eq!(
            Some(Coordinates { start: 400, end: 900 }),
            contigs[0].genes[1].coordinates
        );
        assert_eq!("contigB", contigs[1].id);
        assert_order_invariant(&contigs);
    }

    #[test]
    fn test_plain_headers() {
        init();
        let faa = ">WP_000001.1 some protein\nMKL\n>k141_7_12\nMAA\n";
        let contigs = resolve_protein_reader(std::io::Cursor::new(faa.as_bytes().to_vec()), "faa")
            .unwrap();
        assert_eq!(2, contigs.len());
        assert_eq!("WP_000001.1", contigs[0].id);
        assert_eq!(None, contigs[0].genes[0].coordinates);
        assert_eq!("k141_7", contigs[1].id);
    }

    #[test]
    fn test_contig_from_protein_id() {
        init();
        assert_eq!(Some("NODE_1_length_500"), contig_from_protein_id("NODE_1_length_500_3"));
        assert_eq!(None, contig_from_protein_id("protein"));
        assert_eq!(None, contig_from_protein_id("_3"));
        assert_eq!(None, contig_from_protein_id("abc_x1"));
    }

    #[test]
    fn test_feature_list_sorted_by_start() {
        init();
        let gff = "##gff-version 3\n\
                   c1\tsrc\tCDS\t500\t900\t.\t-\t0\tID=cds2;protein_id=P2\n\
                   c1\tsrc\tgene\t1\t400\t.\t+\t.\tID=gene1\n\
                   c1\tsrc\tCDS\t1\t400\t.\t+\t0\tID=cds1;locus_tag=L1\n\
                   c2\tsrc\tCDS\t5\t50\t.\t+\t0\tID=cds3\n\
                   ##FASTA\n>c1\nACGT\n";
        let contigs = resolve_feature_list(gff.as_bytes(), "gff").unwrap();
        assert_eq!(2, contigs.len());
        assert_eq!(
            vec!["L1", "P2"],
            contigs[0].genes.iter().map(|g| g.id.as_str()).collect::<Vec<_>>()
        );
        assert_eq!("cds3", contigs[1].genes[0].id);
        assert_order_invariant(&contigs);
    }

    #[test]
    fn test_feature_list_all_malformed() {
        init();
        let gff = "c1\tsrc\tCDS\tx\t900\t.\t-\t0\tID=cds2\n";
        assert!(matches!(
            resolve_feature_list(gff.as_bytes(), "gff"),
            Err(BgcError::NoValidRows { .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        init();
        let faa = ">c_1\nMK\n>c_2\nMK\n>c_1\nMK\n";
        let contigs = resolve_protein_reader(std::io::Cursor::new(faa.as_bytes().to_vec()), "faa")
            .unwrap();
        assert_eq!(2, contigs[0].genes.len());
        assert_order_invariant(&contigs);
    }

    #[test]
    fn test_attach_hits_drops_mismatches() {
        init();
        let faa = ">c_1\nMK\n>c_2\nMK\n>c_3\nMK\n";
        let contigs = resolve_protein_reader(std::io::Cursor::new(faa.as_bytes().to_vec()), "faa")
            .unwrap();
        let (contigs, mismatched) = attach_hits(
            contigs,
            vec![hit("c_1", "A"), hit("c_1", "A"), hit("c_3", "B"), hit("x_9", "C")],
        );
        assert_eq!(1, mismatched);
        assert_eq!(2, contigs[0].genes[0].hits.len());
        assert!(contigs[0].genes[1].hits.is_empty());
        assert_eq!("B", contigs[0].genes[2].hits[0].accession);
    }

    #[test]
    fn test_genbank_sorted_by_start() {
        init();
        let contigs = resolve(&Artifact::new(
            "tests/data/features.gbk",
            ArtifactKind::GenBank,
        ))
        .unwrap();
        assert_eq!(
            vec!["ctgA", "ctgB"],
            contigs.iter().map(|c| c.id.as_str()).collect::<Vec<_>>()
        );
        // The untranslated pseudogene is not a gene
        assert_eq!(
            vec!["ctgA_1", "ctgA_2", "ctgA_3", "ctgA_4", "ctgA_5", "ctgA_6"],
            contigs[0].genes.iter().map(|g| g.id.as_str()).collect::<Vec<_>>()
        );
        assert_eq!(
            Some(Coordinates { start: 6300, end: 6900 }),
            contigs[0].genes[3].coordinates
        );
        assert_eq!(Strand::Reverse, contigs[0].genes[3].strand);
        assert_eq!(Strand::Forward, contigs[0].genes[4].strand);
        // locus_tag stands in for a missing protein_id
        assert_eq!(
            vec!["ctgB_1", "ctgB_2"],
            contigs[1].genes.iter().map(|g| g.id.as_str()).collect::<Vec<_>>()
        );
        assert_order_invariant(&contigs);
    }

    #[test]
    fn test_genbank_matches_feature_list() {
        init();
        let from_genbank = resolve(&Artifact::new(
            "tests/data/features.gbk",
            ArtifactKind::GenBank,
        ))
        .unwrap();
        let from_gff = resolve(&Artifact::new(
            "tests/data/features.gff",
            ArtifactKind::FeatureList,
        ))
        .unwrap();
        assert_eq!(from_gff, from_genbank);
    }

    #[test]
    fn test_resolve_rejects_annotation_artifact() {
        init();
        let artifact = Artifact::new(
            "tests/data/proteins.faa.domtbl",
            ArtifactKind::Annotation(AnnotationSchema::DomainLibrary),
        );
        assert!(matches!(resolve(&artifact), Err(BgcError::Configuration(_))));
    }
}
