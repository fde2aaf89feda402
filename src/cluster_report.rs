use std::io::Write;

use crate::cluster_definer::Cluster;
use crate::error::Result;

pub const REPORT_HEADER: [&str; 8] = [
    "contig",
    "start",
    "end",
    "genes",
    "score",
    "types",
    "refined_start",
    "refined_end",
];

/// Write clusters as a tab separated table, one row per cluster. Gene indices
/// are 0-based positions in the contig's gene order.
pub fn write_cluster_report<W: Write>(clusters: &[Cluster], writer: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    wtr.write_record(&REPORT_HEADER)?;

    for cluster in clusters {
        let (refined_start, refined_end) = match cluster.refined {
            Some((s, e)) => (s.to_string(), e.to_string()),
            None => (String::new(), String::new()),
        };
        wtr.write_record(&[
            cluster.contig_id.clone(),
            cluster.start.to_string(),
            cluster.end.to_string(),
            cluster.gene_ids.join(","),
            format!("{:.4}", cluster.score),
            cluster
                .labels
                .iter()
                .map(|l| l.as_str())
                .collect::<Vec<_>>()
                .join(";"),
            refined_start,
            refined_end,
        ])?;
    }
    wtr.flush()?;
    debug!("Wrote {} clusters", clusters.len());
    Ok(())
}
