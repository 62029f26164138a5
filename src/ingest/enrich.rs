//! Enrichment orchestration for one patient batch.
//!
//! Each row has two annotation classes (HGVS nomenclature; clinical
//! annotation) which are independently `Satisfied` on the row, known to
//! the store, or fetched from the corresponding service.  Outbound calls
//! honor a configurable throttle; a row whose enrichment fails degrades
//! to NULL fields and never aborts the remaining rows.

use std::time::{Duration, Instant};

use crate::annos::{clinvar, variant_validator, AnnotateClinvar, ResolveHgvs};
use crate::model::{ClinvarAnnotation, VariantRecord};
use crate::store::Store;

/// Explicit delay between successive outbound calls, respecting the
/// rate limits of the annotation services.
#[derive(Debug)]
pub struct Throttle {
    /// Minimum delay between calls.
    delay: Duration,
    /// Time of the previous call, if any was made yet.
    last_call: Option<Instant>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_call: None,
        }
    }

    /// Block until the delay since the previous call has passed, then
    /// record that a call is being made now.  Not invoked on cache hits,
    /// so batches served from the store proceed without pauses.
    fn tick(&mut self) {
        if let Some(last_call) = self.last_call {
            let elapsed = last_call.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
        self.last_call = Some(Instant::now());
    }
}

/// How one annotation class on one row will be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    /// Already non-empty on the row.
    Satisfied,
    /// The store has it; copy without a remote call.
    KnownToStore,
    /// Must be fetched from the external service.
    MustFetch,
}

/// Fill `dst` from `src` when `dst` is still empty.
fn fill_missing<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if dst.is_none() {
        *dst = src.clone();
    }
}

/// Copy the clinical annotation bundle into the row's empty fields.
fn fill_clinvar(row: &mut VariantRecord, annotation: &ClinvarAnnotation) {
    fill_missing(&mut row.clinvar_id, &Some(annotation.clinvar_id.clone()));
    fill_missing(&mut row.gene_symbol, &annotation.gene_symbol);
    fill_missing(&mut row.cdna_change, &annotation.cdna_change);
    fill_missing(&mut row.clinvar_accession, &annotation.accession);
    fill_missing(&mut row.classification, &annotation.classification);
    fill_missing(&mut row.num_records, &annotation.num_records);
    fill_missing(&mut row.review_status, &annotation.review_status);
    fill_missing(
        &mut row.associated_condition,
        &annotation.associated_condition,
    );
    fill_missing(&mut row.clinvar_url, &Some(annotation.clinvar_url.clone()));
}

/// Copy all stored annotation fields into the row's empty fields.
fn fill_from_store(row: &mut VariantRecord, stored: &VariantRecord) {
    fill_missing(&mut row.hgvs, &stored.hgvs);
    fill_missing(&mut row.clinvar_id, &stored.clinvar_id);
    fill_missing(&mut row.gene_symbol, &stored.gene_symbol);
    fill_missing(&mut row.cdna_change, &stored.cdna_change);
    fill_missing(&mut row.clinvar_accession, &stored.clinvar_accession);
    fill_missing(&mut row.classification, &stored.classification);
    fill_missing(&mut row.num_records, &stored.num_records);
    fill_missing(&mut row.review_status, &stored.review_status);
    fill_missing(&mut row.associated_condition, &stored.associated_condition);
    fill_missing(&mut row.clinvar_url, &stored.clinvar_url);
}

/// Enrich all rows of one patient batch in place.
///
/// Storage errors are fatal to the batch; per-row enrichment failures
/// only degrade that row's fields to `None`.
pub fn enrich_batch<R, C>(
    store: &Store,
    resolver: &mut R,
    annotator: &mut C,
    throttle: &mut Throttle,
    rows: &mut [VariantRecord],
) -> Result<(), anyhow::Error>
where
    R: ResolveHgvs,
    C: AnnotateClinvar,
{
    for row in rows.iter_mut() {
        let existing = store.find_variant(&row.vcf_form)?;

        // HGVS nomenclature class.
        let state = if row.hgvs.is_some() {
            FieldState::Satisfied
        } else if existing.as_ref().is_some_and(|e| e.hgvs.is_some()) {
            FieldState::KnownToStore
        } else {
            FieldState::MustFetch
        };
        match state {
            FieldState::Satisfied => (),
            FieldState::KnownToStore => {
                row.hgvs = existing.as_ref().and_then(|e| e.hgvs.clone());
            }
            FieldState::MustFetch => {
                // A key that fails validation makes no call and thus pays
                // no throttle delay.
                if let Err(e) = variant_validator::validate_key(&row.vcf_form) {
                    tracing::warn!("HGVS resolution failed for {}: {}", &row.vcf_form, e);
                } else {
                    throttle.tick();
                    match resolver.resolve(&row.vcf_form) {
                        Ok(resolution) => {
                            tracing::debug!(
                                "resolved {} to {} (hgnc: {:?}, omim: {:?})",
                                &row.vcf_form,
                                &resolution.hgvs,
                                &resolution.hgnc_id,
                                &resolution.omim_id
                            );
                            row.hgvs = Some(resolution.hgvs);
                        }
                        Err(e) => {
                            tracing::warn!(
                                "HGVS resolution failed for {}: {}",
                                &row.vcf_form,
                                e
                            );
                        }
                    }
                }
            }
        }

        // Clinical annotation class, keyed on the ClinVar id.
        let state = if row.clinvar_id.is_some() {
            FieldState::Satisfied
        } else if existing.as_ref().is_some_and(|e| e.clinvar_id.is_some()) {
            FieldState::KnownToStore
        } else {
            FieldState::MustFetch
        };
        match state {
            FieldState::Satisfied => (),
            FieldState::KnownToStore => {
                if let Some(existing) = existing.as_ref() {
                    fill_from_store(row, existing);
                }
            }
            FieldState::MustFetch => {
                // Fetching requires a resolved HGVS value; if resolution
                // failed upstream the clinical step is skipped for the row.
                let Some(hgvs) = row.hgvs.clone() else {
                    tracing::debug!(
                        "skipping clinical annotation for {}: no HGVS value",
                        &row.vcf_form
                    );
                    continue;
                };
                if let Err(e) = clinvar::validate_hgvs(&hgvs) {
                    tracing::warn!("clinical annotation failed for {}: {}", &hgvs, e);
                    continue;
                }
                throttle.tick();
                match annotator.annotate(&hgvs) {
                    Ok(annotation) => fill_clinvar(row, &annotation),
                    Err(e) => {
                        tracing::warn!("clinical annotation failed for {}: {}", &hgvs, e);
                    }
                }
            }
        }
    }

    Ok(())
}
