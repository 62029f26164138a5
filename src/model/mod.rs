//! Data model shared between ingestion, enrichment, and the store.

use serde::{Deserialize, Serialize};

/// Placeholder gene symbol used when enrichment yields none, so every
/// variant row keeps a valid gene reference.
pub const UNKNOWN_GENE: &str = "UNKNOWN";

/// Canonical genomic identity of a variant.
///
/// Rendered and stored as `"{chromosome}:{position}:{ref}:{alt}"` (the
/// "vcf_form").  Construction from raw row fields performs no validation
/// beyond presence; the annotation clients validate field contents before
/// any network call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    /// Chromosome name, e.g. `"17"` or `"X"`.
    pub chromosome: String,
    /// 1-based position on the chromosome.
    pub position: String,
    /// Reference base.
    pub reference: String,
    /// Alternative base.
    pub alternative: String,
}

impl std::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.chromosome, self.position, self.reference, self.alternative
        )
    }
}

impl std::str::FromStr for VariantKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = s.split(':').collect::<Vec<_>>();
        if fields.len() != 4 || fields.iter().any(|f| f.is_empty()) {
            anyhow::bail!(
                "invalid genomic notation {:?}; expected 4 colon-separated fields \
                such as \"17:45983420:G:T\"",
                s
            );
        }
        Ok(Self {
            chromosome: fields[0].to_string(),
            position: fields[1].to_string(),
            reference: fields[2].to_string(),
            alternative: fields[3].to_string(),
        })
    }
}

/// One variant row as stored in the `variants` table.
///
/// All annotation fields are optional; enrichment and the writer only ever
/// fill fields that are `None`, never replace populated ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRecord {
    /// Canonical genomic key (`chromosome:position:ref:alt`), primary key.
    pub vcf_form: String,
    /// Transcript-level HGVS notation, e.g. `"NM_001377265.1:c.841G>T"`.
    pub hgvs: Option<String>,
    /// ClinVar variation id.
    pub clinvar_id: Option<String>,
    /// Gene symbol; written as `UNKNOWN` when unresolved.
    pub gene_symbol: Option<String>,
    /// ClinVar consensus classification.
    pub classification: Option<String>,
    /// cDNA change, e.g. `"c.841G>T"`.
    pub cdna_change: Option<String>,
    /// ClinVar accession, e.g. `"VCV000578075"`.
    pub clinvar_accession: Option<String>,
    /// Number of submitted ClinVar records.
    pub num_records: Option<i64>,
    /// ClinVar review status.
    pub review_status: Option<String>,
    /// Condition associated with the consensus classification.
    pub associated_condition: Option<String>,
    /// Browsable ClinVar record URL.
    pub clinvar_url: Option<String>,
}

/// Result of resolving a canonical genomic key to transcript nomenclature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HgvsResolution {
    /// Transcript-level HGVS nomenclature (MANE Select).
    pub hgvs: String,
    /// HGNC gene id, if present in the response.
    pub hgnc_id: Option<String>,
    /// First OMIM id, if present in the response.
    pub omim_id: Option<String>,
}

/// Clinical annotation bundle assembled from a ClinVar record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinvarAnnotation {
    /// ClinVar variation id the bundle was fetched for.
    pub clinvar_id: String,
    /// Gene symbol.
    pub gene_symbol: Option<String>,
    /// cDNA change.
    pub cdna_change: Option<String>,
    /// ClinVar accession.
    pub accession: Option<String>,
    /// Consensus (germline) classification.
    pub classification: Option<String>,
    /// Number of submitted records.
    pub num_records: Option<i64>,
    /// Review status of the consensus classification.
    pub review_status: Option<String>,
    /// First associated condition.
    pub associated_condition: Option<String>,
    /// Browsable record URL derived from the variation id.
    pub clinvar_url: String,
}
