//! Implementation of the `ingest` subcommand.
//!
//! One input file is one patient batch: the file is read into normalized
//! rows, compared against the patient's stored variant set (identical
//! uploads are skipped entirely), enriched via the annotation services,
//! and committed in a single transaction.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context;

use crate::annos::{clinvar, variant_validator, AnnotateClinvar, ResolveHgvs};
use crate::common;
use crate::model::VariantRecord;
use crate::store::Store;

pub mod enrich;
pub mod input;

use enrich::Throttle;

/// Command line arguments for `ingest` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "ingest a patient variant file", long_about = None)]
pub struct Args {
    /// Path to the input variant file (`.csv` or `.vcf`).
    #[clap(long)]
    pub path_in: String,
    /// Path to the SQLite database.
    #[clap(long)]
    pub path_db: String,
    /// Patient name; defaults to the input file stem.
    #[clap(long)]
    pub patient: Option<String>,
    /// Delay between successive outbound annotation calls, in milliseconds.
    #[clap(long, default_value_t = 300)]
    pub throttle_ms: u64,
    /// Timeout ceiling per external call, in seconds.
    #[clap(long, default_value_t = 30)]
    pub timeout_secs: u64,
    /// Base URL of the VariantValidator REST API.
    #[clap(long, default_value = variant_validator::DEFAULT_BASE_URL)]
    pub variantvalidator_url: String,
    /// Base URL of the NCBI Entrez e-utils.
    #[clap(long, default_value = clinvar::DEFAULT_BASE_URL)]
    pub eutils_url: String,
    /// Email forwarded to NCBI on e-utils requests.
    #[clap(long)]
    pub entrez_email: Option<String>,
}

/// Outcome of processing one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The stored variant set for the patient is identical; nothing done.
    SkippedIdentical,
    /// The batch was enriched and committed with this many rows.
    Written(usize),
}

/// Process one input file as one patient batch.
pub fn process_file<R, C, P>(
    store: &mut Store,
    resolver: &mut R,
    annotator: &mut C,
    throttle: &mut Throttle,
    path_in: P,
    patient: &str,
) -> Result<Outcome, anyhow::Error>
where
    R: ResolveHgvs,
    C: AnnotateClinvar,
    P: AsRef<Path>,
{
    let records = input::read_records(&path_in)
        .with_context(|| format!("reading {:?}", path_in.as_ref()))?;
    let mut rows = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            record
                .into_variant_record()
                .with_context(|| format!("normalizing row {} of {:?}", i + 1, path_in.as_ref()))
        })
        .collect::<Result<Vec<VariantRecord>, _>>()?;

    // Re-uploads with an unchanged variant set must not cost remote calls
    // or writes.
    let uploaded = rows
        .iter()
        .map(|row| row.vcf_form.clone())
        .collect::<BTreeSet<_>>();
    let stored = store
        .variant_keys_for_patient(patient)
        .context("loading stored variant keys")?;
    if !stored.is_empty() && stored == uploaded {
        tracing::info!(
            "skipping ingest for patient {:?}: stored variant set is identical",
            patient
        );
        return Ok(Outcome::SkippedIdentical);
    }

    enrich::enrich_batch(store, resolver, annotator, throttle, &mut rows)?;

    let written = store
        .write_batch(patient, &rows)
        .with_context(|| format!("committing batch for patient {:?}", patient))?;

    Ok(Outcome::Written(written))
}

/// Main entry point for `ingest` sub command.
pub fn run(args_common: &common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", args_common);
    tracing::info!("args = {:?}", args);

    let path_in = Path::new(&args.path_in);
    let patient = match &args.patient {
        Some(patient) => patient.clone(),
        None => path_in
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("cannot derive patient name from {:?}", path_in))?,
    };

    let timeout = Duration::from_secs(args.timeout_secs);
    let mut store = Store::open(&args.path_db)
        .with_context(|| format!("opening database {:?}", &args.path_db))?;
    let mut resolver = variant_validator::Client::new(&args.variantvalidator_url, timeout)?;
    let mut annotator =
        clinvar::Client::new(&args.eutils_url, timeout, args.entrez_email.clone())?;
    let mut throttle = Throttle::new(Duration::from_millis(args.throttle_ms));

    let before = Instant::now();
    match process_file(
        &mut store,
        &mut resolver,
        &mut annotator,
        &mut throttle,
        path_in,
        &patient,
    )? {
        Outcome::SkippedIdentical => {
            tracing::info!("nothing to do for patient {:?}", &patient);
        }
        Outcome::Written(count) => {
            tracing::info!(
                "ingested {} variants for patient {:?} in {:?}",
                count,
                &patient,
                before.elapsed()
            );
        }
    }

    Ok(())
}
