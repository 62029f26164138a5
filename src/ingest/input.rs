//! Reading of patient variant files into rows with a fixed column set.
//!
//! Two tabular layouts are supported, both mapped onto the same columns:
//! comma-separated with one header line (`.csv`) and tab-separated with
//! `#`-prefixed comment lines (`.vcf`).  Every expected column missing
//! from the source is filled with `None` so downstream code never has to
//! branch on column presence.

use std::path::Path;

use crate::model::{VariantKey, VariantRecord};

/// Kind of an input variant file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum FileKind {
    /// Comma-separated with one header line.
    Csv,
    /// Tab-separated with `#`-prefixed comment lines.
    Vcf,
}

impl FileKind {
    /// Derive the file kind from the path's extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_lowercase();
        ext.parse().map_err(|_| {
            anyhow::anyhow!(
                "unsupported input file kind for {:?} (expected .csv or .vcf)",
                path.as_ref()
            )
        })
    }
}

/// One raw input row; every column is optional at this stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputRecord {
    /// Chromosome name.
    pub chromosome: Option<String>,
    /// 1-based position.
    pub position: Option<String>,
    /// Variant id column of the source file; ignored in favor of the
    /// derived canonical key.
    pub id: Option<String>,
    /// Reference base.
    pub reference: Option<String>,
    /// Alternative base.
    pub alternative: Option<String>,
    /// HGVS notation, when the source already carries it.
    pub hgvs: Option<String>,
    /// Gene symbol.
    pub gene_symbol: Option<String>,
    /// cDNA change.
    pub cdna_change: Option<String>,
    /// ClinVar variation id.
    pub clinvar_id: Option<String>,
    /// ClinVar accession.
    pub clinvar_accession: Option<String>,
    /// Classification.
    pub classification: Option<String>,
    /// Number of submitted records.
    pub num_submissions: Option<String>,
    /// Review status.
    pub review_status: Option<String>,
    /// Associated condition.
    pub condition: Option<String>,
    /// ClinVar record URL.
    pub clinvar_url: Option<String>,
}

impl InputRecord {
    /// Derive the canonical variant key from the four genomic columns.
    ///
    /// A missing required column is an error; the source's own `id`
    /// column is never trusted for identity.
    pub fn variant_key(&self) -> Result<VariantKey, anyhow::Error> {
        let required = |field: &Option<String>, name: &str| {
            field
                .clone()
                .ok_or_else(|| anyhow::anyhow!("missing required column {:?}", name))
        };
        Ok(VariantKey {
            chromosome: required(&self.chromosome, "chromosome")?,
            position: required(&self.position, "position")?,
            reference: required(&self.reference, "ref")?,
            alternative: required(&self.alternative, "alt")?,
        })
    }

    /// Normalize into a [`VariantRecord`] keyed by the canonical form.
    pub fn into_variant_record(self) -> Result<VariantRecord, anyhow::Error> {
        let key = self.variant_key()?;
        Ok(VariantRecord {
            vcf_form: key.to_string(),
            hgvs: self.hgvs,
            clinvar_id: self.clinvar_id,
            gene_symbol: self.gene_symbol,
            classification: self.classification,
            cdna_change: self.cdna_change,
            clinvar_accession: self.clinvar_accession,
            // Submission counts that do not parse degrade to NULL.
            num_records: self.num_submissions.as_deref().and_then(|n| n.parse().ok()),
            review_status: self.review_status,
            associated_condition: self.condition,
            clinvar_url: self.clinvar_url,
        })
    }
}

/// Non-empty, trimmed field at `idx` of a CSV record.
fn field(record: &csv::StringRecord, idx: usize) -> Option<String> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
}

/// Read all rows of the file at `path` according to its kind.
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<InputRecord>, anyhow::Error> {
    let kind = FileKind::from_path(&path)?;
    // Column order is positional and fixed for both kinds; the CSV header
    // line only gets skipped, never interpreted.
    let mut reader = match kind {
        FileKind::Csv => csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(b',')
            .flexible(true)
            .from_path(path.as_ref())?,
        FileKind::Vcf => csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .flexible(true)
            .from_path(path.as_ref())?,
    };

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(InputRecord {
            chromosome: field(&record, 0),
            position: field(&record, 1),
            id: field(&record, 2),
            reference: field(&record, 3),
            alternative: field(&record, 4),
            hgvs: field(&record, 5),
            gene_symbol: field(&record, 6),
            cdna_change: field(&record, 7),
            clinvar_id: field(&record, 8),
            clinvar_accession: field(&record, 9),
            classification: field(&record, 10),
            num_submissions: field(&record, 11),
            review_status: field(&record, 12),
            condition: field(&record, 13),
            clinvar_url: field(&record, 14),
        });
    }
    tracing::debug!(
        "read {} rows from {:?} ({} layout)",
        records.len(),
        path.as_ref(),
        kind
    );

    Ok(records)
}
