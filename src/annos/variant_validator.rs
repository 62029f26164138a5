//! Client for the VariantValidator REST API (coordinate → transcript).
//!
//! For a variant in VCF-style genomic notation (e.g. `17:45983420:G:T`)
//! the client returns the HGVS nomenclature of the MANE Select transcript
//! (e.g. `NM_001377265.1:c.841G>T`) together with HGNC and OMIM gene ids
//! where available.

use std::time::Duration;

use crate::annos::ResolveHgvs;
use crate::common::CHROMS;
use crate::model::HgvsResolution;

/// Default base URL of the VariantValidator REST API.
pub const DEFAULT_BASE_URL: &str = "https://rest.variantvalidator.org";

/// Genome build requested from the service.
const GENOME_BUILD: &str = "GRCh38";
/// Transcript selection requested from the service.
const SELECT_TRANSCRIPTS: &str = "mane_select";
/// Marker distinguishing transcript-level (cDNA) entries in the response.
const CDNA_MARKER: &str = ":c.";
/// Response keys that carry metadata rather than variant entries.
const META_KEYS: &[&str] = &["flag", "metadata"];

/// Errors of the VariantValidator client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The genomic key failed validation; no request was made.
    #[error("invalid genomic key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },
    /// Connectivity failure: timeout, non-2xx status, unreadable body.
    #[error("VariantValidator request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The service answered but no transcript-level entry was present.
    #[error("no resolvable transcript for {0:?} in VariantValidator response")]
    NoTranscript(String),
}

/// Validate a canonical genomic key before spending a network call on it.
///
/// Accepts exactly four colon-separated fields with chromosome in
/// 1..22/X/Y, a non-negative integer position, and single-base A/C/G/T
/// ref and alt alleles.
pub fn validate_key(vcf_form: &str) -> Result<(), Error> {
    let invalid = |reason: String| Error::InvalidKey {
        key: vcf_form.to_string(),
        reason,
    };

    let fields = vcf_form.split(':').collect::<Vec<_>>();
    if fields.len() != 4 {
        return Err(invalid(format!(
            "expected 4 colon-separated fields, e.g. \"17:45983420:G:T\", but found {}",
            fields.len()
        )));
    }
    if !CHROMS.contains(&fields[0]) {
        return Err(invalid(format!(
            "chromosome {:?} is not one of 1..22, X, Y",
            fields[0]
        )));
    }
    if fields[1].parse::<u64>().is_err() {
        return Err(invalid(format!(
            "position {:?} is not a non-negative integer",
            fields[1]
        )));
    }
    for (name, value) in [("ref", fields[2]), ("alt", fields[3])] {
        if value.len() != 1 || !"ACGT".contains(value) {
            return Err(invalid(format!(
                "{} allele {:?} is not a single A/C/G/T base",
                name, value
            )));
        }
    }

    Ok(())
}

/// Extract the transcript resolution from a VariantValidator response body.
///
/// The first entry whose key carries the cDNA marker is the MANE Select
/// nomenclature; HGNC and OMIM ids degrade to `None` individually when
/// missing.
pub fn extract_resolution(
    vcf_form: &str,
    response: &serde_json::Value,
) -> Result<HgvsResolution, Error> {
    let entries = response
        .as_object()
        .ok_or_else(|| Error::NoTranscript(vcf_form.to_string()))?;

    let (hgvs, entry) = entries
        .iter()
        .filter(|(key, _)| !META_KEYS.contains(&key.as_str()))
        .find(|(key, _)| key.contains(CDNA_MARKER))
        .ok_or_else(|| Error::NoTranscript(vcf_form.to_string()))?;

    let hgnc_id = entry
        .pointer("/gene_ids/hgnc_id")
        .and_then(value_to_string);
    // OMIM ids come as a list; only the first is of interest.
    let omim_id = entry
        .pointer("/gene_ids/omim_id")
        .and_then(|ids| ids.as_array())
        .and_then(|ids| ids.first())
        .and_then(value_to_string);

    Ok(HgvsResolution {
        hgvs: hgvs.clone(),
        hgnc_id,
        omim_id,
    })
}

/// Render a scalar JSON value as a string, if it is one.
fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Blocking VariantValidator client with a fixed per-call timeout.
#[derive(Debug)]
pub struct Client {
    /// The HTTP client, configured with the call timeout.
    http: reqwest::blocking::Client,
    /// Base URL of the service.
    base_url: String,
}

impl Client {
    /// Construct a new client against `base_url` with the given timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve `vcf_form` to transcript-level nomenclature.
    ///
    /// Fails fast with [`Error::InvalidKey`] before any network I/O when
    /// the key is malformed.
    pub fn fetch(&self, vcf_form: &str) -> Result<HgvsResolution, Error> {
        validate_key(vcf_form)?;

        let url = format!(
            "{}/VariantValidator/variantvalidator/{}/{}/{}",
            self.base_url, GENOME_BUILD, vcf_form, SELECT_TRANSCRIPTS
        );
        tracing::debug!("GET {}", &url);
        let response: serde_json::Value = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()?
            .error_for_status()?
            .json()?;

        extract_resolution(vcf_form, &response)
    }
}

impl ResolveHgvs for Client {
    fn resolve(&mut self, vcf_form: &str) -> Result<HgvsResolution, Error> {
        self.fetch(vcf_form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[rstest::rstest]
    #[case::snv("17:45983420:G:T")]
    #[case::chrom_1("1:100:A:C")]
    #[case::chrom_22("22:0:T:G")]
    #[case::chrom_x("X:155239:C:A")]
    #[case::chrom_y("Y:2781479:G:A")]
    fn validate_key_accepts(#[case] key: &str) -> Result<(), Error> {
        validate_key(key)
    }

    #[rstest::rstest]
    #[case::three_fields("17:45983420:G")]
    #[case::five_fields("17:45983420:G:T:x")]
    #[case::chrom_23("23:100:A:C")]
    #[case::chrom_m("M:100:A:C")]
    #[case::chrom_prefixed("chr17:100:A:C")]
    #[case::negative_position("17:-1:A:C")]
    #[case::non_numeric_position("17:abc:A:C")]
    #[case::multi_base_ref("17:100:AT:C")]
    #[case::invalid_base("17:100:A:U")]
    #[case::empty_alt("17:100:A:")]
    fn validate_key_rejects(#[case] key: &str) {
        let res = validate_key(key);
        assert!(matches!(res, Err(Error::InvalidKey { .. })), "{:?}", res);
    }

    #[test]
    fn extract_resolution_full_entry() -> Result<(), Error> {
        let response = json!({
            "flag": "gene_variant",
            "NM_001377265.1:c.841G>T": {
                "gene_ids": {
                    "hgnc_id": "HGNC:6893",
                    "omim_id": ["157140"],
                },
                "gene_symbol": "MAPT",
            },
            "metadata": {"variantvalidator_version": "2.2.0"},
        });

        let resolution = extract_resolution("17:45983420:G:T", &response)?;
        assert_eq!(
            HgvsResolution {
                hgvs: "NM_001377265.1:c.841G>T".to_string(),
                hgnc_id: Some("HGNC:6893".to_string()),
                omim_id: Some("157140".to_string()),
            },
            resolution
        );

        Ok(())
    }

    #[test]
    fn extract_resolution_degrades_gene_ids() -> Result<(), Error> {
        let response = json!({
            "NM_000277.3:c.1222C>T": {
                "gene_ids": {},
            },
        });

        let resolution = extract_resolution("12:102852850:G:A", &response)?;
        assert_eq!("NM_000277.3:c.1222C>T", resolution.hgvs);
        assert_eq!(None, resolution.hgnc_id);
        assert_eq!(None, resolution.omim_id);

        Ok(())
    }

    #[test]
    fn extract_resolution_no_transcript_entry() {
        let response = json!({
            "flag": "warning",
            "validation_warning_1": {"gene_ids": {}},
            "metadata": {},
        });

        let res = extract_resolution("17:45983420:G:T", &response);
        assert!(matches!(res, Err(Error::NoTranscript(_))), "{:?}", res);
    }

    #[test]
    fn extract_resolution_prefers_cdna_entry() -> Result<(), Error> {
        // A genomic-level entry before the cDNA entry must not win.
        let response = json!({
            "flag": "gene_variant",
            "NC_000023.11:g.154031326G>A": {"gene_ids": {}},
            "NM_004992.4:c.916C>T": {
                "gene_ids": {"hgnc_id": "HGNC:6990", "omim_id": ["300005"]},
            },
        });

        let resolution = extract_resolution("X:154031326:G:A", &response)?;
        assert_eq!("NM_004992.4:c.916C>T", resolution.hgvs);

        Ok(())
    }
}
