use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ahash::AHashSet;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::info;

use crate::error::RewriteError;

/// How the share of candidates to reassign is drawn. Both policies yield
/// exactly `floor(n * pct / 100)` elements; a percentage above 100 clamps
/// to the full candidate list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionPolicy {
    /// First `floor(n * pct / 100)` candidates in the order given by the
    /// caller, e.g. persons ranked by ascending income.
    Prefix { pct: u32 },
    /// Uniform random sample of the same size. The seed is explicit so runs
    /// are reproducible.
    Sample { pct: u32, seed: u64 },
}

pub fn select_candidates(candidates: &[String], policy: &SelectionPolicy) -> AHashSet<String> {
    let selected: AHashSet<String> = match policy {
        SelectionPolicy::Prefix { pct } => {
            let count = sample_count(candidates.len(), *pct);
            candidates.iter().take(count).cloned().collect()
        }
        SelectionPolicy::Sample { pct, seed } => {
            let count = sample_count(candidates.len(), *pct);
            let mut rng = SmallRng::seed_from_u64(*seed);
            rand::seq::index::sample(&mut rng, candidates.len(), count)
                .iter()
                .map(|i| candidates[i].clone())
                .collect()
        }
    };
    info!(
        "Selected {} of {} candidates with policy {:?}",
        selected.len(),
        candidates.len(),
        policy
    );
    selected
}

fn sample_count(n: usize, pct: u32) -> usize {
    n * pct.min(100) as usize / 100
}

/// Reads an ordered person id list, one id per line. Blank lines are
/// skipped. Ids unknown to the population are simply never matched.
pub fn read_person_list(path: &Path) -> Result<Vec<String>, RewriteError> {
    let file = File::open(path).map_err(|source| RewriteError::OpenFile {
        path: path.to_path_buf(),
        source,
    })?;

    let mut persons = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            persons.push(trimmed.to_string());
        }
    }
    Ok(persons)
}
