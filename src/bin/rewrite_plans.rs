use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use plan_rewriter::error::RewriteError;
use plan_rewriter::io::vehicles::IOVehicleDefinitions;
use plan_rewriter::pipeline;
use plan_rewriter::rewriter::{ExclusionFilter, PlanRewriter};
use plan_rewriter::selection::{self, SelectionPolicy};
use plan_rewriter::logging;

fn main() -> Result<(), RewriteError> {
    let args = InputArgs::parse();

    let _guards = match args.log_dir.as_ref() {
        Some(dir) => {
            let (default_guard, worker_guard) = logging::init_file_logging(dir)?;
            (default_guard, Some(worker_guard))
        }
        None => (logging::init_std_out_logging(), None),
    };

    let (candidates, policy) = load_candidates(&args)?;
    let selected = selection::select_candidates(&candidates, &policy);

    let exclusion = ExclusionFilter::new(args.exclude_type.clone(), args.fallback_mode.clone());
    let rewriter = PlanRewriter::new(
        args.from_mode.clone(),
        args.to_mode.clone(),
        selected,
        exclusion,
    );

    let summary = pipeline::rewrite_population(&args.input, &args.output, &rewriter)?;
    info!(
        "Modifications applied. Check the output file: {:?} ({} of {} persons reassigned to '{}')",
        args.output, summary.reassigned, summary.persons, args.to_mode
    );
    Ok(())
}

/// Builds the candidate vehicle list and the matching policy. An ordered
/// person list selects deterministically by prefix, a vehicle registry
/// samples at random with the given seed.
fn load_candidates(args: &InputArgs) -> Result<(Vec<String>, SelectionPolicy), RewriteError> {
    match (args.persons.as_ref(), args.vehicles.as_ref()) {
        (Some(_), Some(_)) => Err(RewriteError::InvalidInput(String::from(
            "pass either --persons or --vehicles, not both",
        ))),
        (Some(persons_path), None) => {
            let persons = selection::read_person_list(persons_path)?;
            let candidates = persons
                .iter()
                .map(|p| format!("{p}_{}", args.from_mode))
                .collect();
            Ok((candidates, SelectionPolicy::Prefix { pct: args.pct }))
        }
        (None, Some(vehicles_path)) => {
            let registry = IOVehicleDefinitions::from_file(vehicles_path)?;
            let candidates = registry.instances_of(&args.from_mode);
            Ok((
                candidates,
                SelectionPolicy::Sample {
                    pct: args.pct,
                    seed: args.seed,
                },
            ))
        }
        (None, None) => Err(RewriteError::InvalidInput(String::from(
            "either --persons (ordered id list) or --vehicles (registry xml) is required",
        ))),
    }
}

#[derive(Parser, Debug)]
struct InputArgs {
    /// Population file to rewrite (.xml or .xml.gz)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Where to write the rewritten population (.xml or .xml.gz)
    #[arg(short, long)]
    pub output: PathBuf,
    /// Vehicle definitions file; candidates are drawn from its registry
    #[arg(short, long)]
    pub vehicles: Option<PathBuf>,
    /// Ordered person id list, one id per line
    #[arg(short, long)]
    pub persons: Option<PathBuf>,
    /// Share of candidates to reassign, in percent
    #[arg(long, default_value_t = 100)]
    pub pct: u32,
    /// Seed for random sampling with --vehicles
    #[arg(long, default_value_t = 4711)]
    pub seed: u64,
    /// Source mode category
    #[arg(long, default_value = "car")]
    pub from_mode: String,
    /// Target mode category
    #[arg(long, default_value = "microcar")]
    pub to_mode: String,
    /// Vehicle type names blocked from reassignment, e.g. mercedes313
    #[arg(long)]
    pub exclude_type: Vec<String>,
    /// Category excluded persons are moved to instead, e.g. freight
    #[arg(long)]
    pub fallback_mode: Option<String>,
    /// Write a json log file into this directory in addition to stdout
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}
