//! Clients for the two external annotation services.
//!
//! Both clients validate their input *before* issuing any network call so
//! that a malformed key never spends a rate-limited request, and both
//! distinguish connectivity failures from "service reached, no record"
//! outcomes.  Field extraction from the response documents is best-effort
//! per field.

use crate::model::{ClinvarAnnotation, HgvsResolution};

pub mod clinvar;
pub mod variant_validator;

/// Resolve a canonical genomic key to transcript-level HGVS nomenclature.
///
/// Seam between the enrichment orchestrator and the VariantValidator
/// client; test code substitutes stubs.
pub trait ResolveHgvs {
    fn resolve(&mut self, vcf_form: &str) -> Result<HgvsResolution, variant_validator::Error>;
}

/// Resolve an HGVS transcript string to a clinical annotation bundle.
pub trait AnnotateClinvar {
    fn annotate(&mut self, hgvs: &str) -> Result<ClinvarAnnotation, clinvar::Error>;
}
