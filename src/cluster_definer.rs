use std::collections::BTreeSet;

use serde::Deserialize;

use crate::error::{BgcError, Result};
use crate::genes::Contig;

pub const GREEDINESS_LEVELS: [u8; 3] = [0, 1, 2];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalibrationLevel {
    pub level: u8,
    pub threshold: f64,
    /// Most consecutive sub-threshold genes allowed inside one cluster.
    pub gap_tolerance: usize,
}

/// Greediness calibration shipped with the trained model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalibrationTable {
    pub levels: Vec<CalibrationLevel>,
    #[serde(default)]
    pub refine_threshold: Option<f64>,
}

impl CalibrationTable {
    /// Levels must be exactly 0, 1 and 2, and each level must be at least as
    /// permissive as the one before it.
    pub fn validate(&self) -> Result<()> {
        let levels: Vec<u8> = self.levels.iter().map(|l| l.level).collect();
        if levels != GREEDINESS_LEVELS {
            return Err(BgcError::configuration(format!(
                "Calibration table must list greediness levels {:?} in order, found {:?}",
                GREEDINESS_LEVELS, levels
            )));
        }
        for level in &self.levels {
            check_probability(level.threshold, "calibration threshold")?;
        }
        for pair in self.levels.windows(2) {
            if pair[1].threshold > pair[0].threshold
                || pair[1].gap_tolerance < pair[0].gap_tolerance
            {
                return Err(BgcError::configuration(format!(
                    "Greediness level {} is stricter than level {}",
                    pair[1].level, pair[0].level
                )));
            }
        }
        if let Some(refine) = self.refine_threshold {
            check_probability(refine, "refinement threshold")?;
        }
        Ok(())
    }

    pub fn level(&self, greediness: u8) -> Result<&CalibrationLevel> {
        self.levels
            .iter()
            .find(|l| l.level == greediness)
            .ok_or_else(|| {
                BgcError::configuration(format!(
                    "Unknown greediness level {}, expected one of {:?}",
                    greediness, GREEDINESS_LEVELS
                ))
            })
    }
}

fn check_probability(value: f64, what: &str) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(BgcError::configuration(format!(
            "Invalid {} {}, must be between 0 and 1",
            what, value
        )));
    }
    Ok(())
}

/// The merging rule applied to every contig of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterPolicy {
    pub threshold: f64,
    pub gap_tolerance: usize,
    pub refine_threshold: Option<f64>,
}

impl ClusterPolicy {
    /// An explicit score takes precedence over greediness and allows no gaps.
    pub fn resolve(
        score: Option<f64>,
        greediness: Option<u8>,
        calibration: &CalibrationTable,
        refined: bool,
    ) -> Result<ClusterPolicy> {
        let refine_threshold = match (refined, calibration.refine_threshold) {
            (false, _) => None,
            (true, Some(t)) => Some(t),
            (true, None) => {
                return Err(BgcError::configuration(
                    "Refined boundaries requested but the calibration table has no \
                     refinement threshold",
                ))
            }
        };

        match (score, greediness) {
            (Some(threshold), _) => {
                check_probability(threshold, "score threshold")?;
                if let Some(level) = greediness {
                    calibration.level(level)?;
                    debug!(
                        "Explicit score {} overrides greediness level {}",
                        threshold, level
                    );
                }
                Ok(ClusterPolicy {
                    threshold,
                    gap_tolerance: 0,
                    refine_threshold,
                })
            }
            (None, Some(level)) => {
                let calibrated = calibration.level(level)?;
                Ok(ClusterPolicy {
                    threshold: calibrated.threshold,
                    gap_tolerance: calibrated.gap_tolerance,
                    refine_threshold,
                })
            }
            (None, None) => Err(BgcError::configuration(
                "Neither a score threshold nor a greediness level was given",
            )),
        }
    }
}

/// A candidate cluster region on one contig. Gene indices are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub contig_id: String,
    pub start: usize,
    pub end: usize,
    pub gene_ids: Vec<String>,
    /// Highest member probability.
    pub score: f64,
    pub labels: BTreeSet<String>,
    /// Narrower high-confidence span inside the cluster, if requested.
    pub refined: Option<(usize, usize)>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, gene_index: usize) -> bool {
        self.start <= gene_index && gene_index <= self.end
    }
}

/// Maximal runs of genes at or above the threshold, bridging at most
/// `gap_tolerance` consecutive sub-threshold genes. Runs start and end on
/// qualifying genes.
pub fn find_runs(
    probabilities: &[f64],
    threshold: f64,
    gap_tolerance: usize,
) -> Vec<(usize, usize)> {
    let mut runs = vec![];
    let mut current: Option<(usize, usize)> = None;

    for (i, p) in probabilities.iter().enumerate() {
        if *p < threshold {
            continue;
        }
        current = match current {
            Some((start, last)) if i - last - 1 <= gap_tolerance => Some((start, i)),
            Some(run) => {
                runs.push(run);
                Some((i, i))
            }
            None => Some((i, i)),
        };
    }
    if let Some(run) = current {
        runs.push(run);
    }
    runs
}

/// Merge the gene probabilities of a contig into clusters.
pub fn define_clusters(
    contig: &Contig,
    probabilities: &[f64],
    policy: &ClusterPolicy,
) -> Vec<Cluster> {
    debug_assert_eq!(contig.genes.len(), probabilities.len());
    if probabilities.is_empty() {
        return vec![];
    }

    let clusters: Vec<Cluster> = find_runs(probabilities, policy.threshold, policy.gap_tolerance)
        .into_iter()
        .map(|(start, end)| {
            let members = &probabilities[start..=end];
            let score = members.iter().cloned().fold(0.0, f64::max);
            let refined = policy
                .refine_threshold
                .and_then(|t| refine(members, t))
                .map(|(s, e)| (start + s, start + e));
            Cluster {
                contig_id: contig.id.clone(),
                start,
                end,
                gene_ids: contig.genes[start..=end]
                    .iter()
                    .map(|g| g.id.clone())
                    .collect(),
                score,
                labels: BTreeSet::new(),
                refined,
            }
        })
        .collect();
    debug!(
        "Found {} clusters on {} at threshold {} with gap tolerance {}",
        clusters.len(),
        contig.id,
        policy.threshold,
        policy.gap_tolerance
    );
    clusters
}

/// First and last positions at or above the refinement threshold.
fn refine(members: &[f64], threshold: f64) -> Option<(usize, usize)> {
    let first = members.iter().position(|p| *p >= threshold)?;
    let last = members.iter().rposition(|p| *p >= threshold)?;
    Some((first, last))
}
