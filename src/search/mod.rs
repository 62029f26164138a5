//! Implementation of the `search` subcommand.
//!
//! Read-only queries against the variant database: look up the carriers
//! of a variant (by HGVS notation or genomic notation), a patient's
//! variants, or all variants of a gene or classification.

use itertools::Itertools;

use crate::common;
use crate::model::{VariantKey, VariantRecord};
use crate::store::{CarrierRow, Store};

/// What the search value identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
pub enum SearchKind {
    /// A variant, given as HGVS notation or genomic notation.
    #[strum(serialize = "variant")]
    Variant,
    /// A patient name.
    #[strum(serialize = "patient")]
    Patient,
    /// A gene symbol.
    #[strum(serialize = "gene")]
    Gene,
    /// A classification.
    #[strum(serialize = "classification")]
    Classification,
}

/// Command line arguments for `search` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "search the variant database", long_about = None)]
pub struct Args {
    /// Path to the SQLite database.
    #[clap(long)]
    pub path_db: String,
    /// What the search value identifies.
    #[clap(long, value_enum)]
    pub kind: SearchKind,
    /// The value to search for.
    #[clap(long)]
    pub value: String,
}

/// Whether a variant search value is transcript notation rather than
/// genomic notation.
fn looks_like_hgvs(value: &str) -> bool {
    let lower = value.to_lowercase();
    lower.starts_with("nm") || lower.starts_with("nc")
}

/// Print one variant with all of its annotation fields.
fn print_variant(variant: &VariantRecord) {
    let opt = |field: &Option<String>| field.clone().unwrap_or_else(|| "-".to_string());
    println!("Genomic notation:  {}", variant.vcf_form);
    println!("HGVS notation:     {}", opt(&variant.hgvs));
    println!("Gene symbol:       {}", opt(&variant.gene_symbol));
    println!("cDNA change:       {}", opt(&variant.cdna_change));
    println!("ClinVar id:        {}", opt(&variant.clinvar_id));
    println!("ClinVar accession: {}", opt(&variant.clinvar_accession));
    println!("Classification:    {}", opt(&variant.classification));
    println!(
        "Submissions:       {}",
        variant
            .num_records
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("Review status:     {}", opt(&variant.review_status));
    println!("Condition:         {}", opt(&variant.associated_condition));
    println!("Record URL:        {}", opt(&variant.clinvar_url));
}

/// Print carrier rows as a simple table.
fn print_carriers(rows: &[CarrierRow]) {
    for row in rows {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            row.vcf_form,
            row.hgvs.as_deref().unwrap_or("-"),
            row.gene_symbol,
            row.classification.as_deref().unwrap_or("-"),
            row.patient_name,
        );
    }
}

/// Run the variant search branch: resolve the value to a stored variant,
/// then list its carriers.
fn search_variant(store: &Store, value: &str) -> Result<bool, anyhow::Error> {
    let variant = if looks_like_hgvs(value) {
        store.find_variant_by_hgvs(value)?
    } else {
        // Validate the genomic notation before hitting the store.
        let key: VariantKey = value.parse()?;
        store.find_variant(&key.to_string())?
    };

    let Some(variant) = variant else {
        return Ok(false);
    };

    print_variant(&variant);
    let patients = store.patients_for_variant(&variant.vcf_form)?;
    println!("Patients:          {}", patients.iter().join(", "));

    Ok(true)
}

/// Main entry point for `search` sub command.
pub fn run(args_common: &common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", args_common);
    tracing::info!("args = {:?}", args);

    let store = Store::open(&args.path_db)?;
    let value = args.value.trim();

    let found = match args.kind {
        SearchKind::Variant => search_variant(&store, value)?,
        SearchKind::Patient => {
            let variants = store.variants_for_patient(value)?;
            for variant in &variants {
                println!(
                    "{}\t{}\t{}\t{}",
                    variant.vcf_form,
                    variant.hgvs.as_deref().unwrap_or("-"),
                    variant.gene_symbol.as_deref().unwrap_or("-"),
                    variant.classification.as_deref().unwrap_or("-"),
                );
            }
            !variants.is_empty()
        }
        SearchKind::Gene => {
            let rows = store.carriers_for_gene(value)?;
            print_carriers(&rows);
            !rows.is_empty()
        }
        SearchKind::Classification => {
            let rows = store.carriers_for_classification(value)?;
            print_carriers(&rows);
            !rows.is_empty()
        }
    };

    if !found {
        tracing::warn!("no matching records for {} {:?}", args.kind, value);
        println!("No matching records found.");
    }

    Ok(())
}
