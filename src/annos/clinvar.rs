//! Client for ClinVar via the NCBI Entrez e-utils (transcript → clinical).
//!
//! Two independently composable steps: an `esearch` call resolving an HGVS
//! transcript string to a ClinVar variation id, and an `esummary` call
//! fetching the annotation document for such an id.  The combined
//! [`Client::annotate`] runs both and assembles a
//! [`ClinvarAnnotation`] bundle including the browsable record URL.

use std::time::Duration;

use crate::annos::AnnotateClinvar;
use crate::model::ClinvarAnnotation;

/// Default base URL of the NCBI Entrez e-utils.
pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Base URL for browsable ClinVar variation records.
const RECORD_URL_BASE: &str = "https://www.ncbi.nlm.nih.gov/clinvar/variation";

/// Expected transcript-reference prefix of HGVS input.
const TRANSCRIPT_PREFIX: &str = "NM_";
/// Coding-change marker expected in HGVS input.
const CODING_MARKER: &str = "c.";

/// Errors of the ClinVar client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The HGVS string failed validation; no request was made.
    #[error("invalid HGVS format {hgvs:?}: expected transcript HGVS such as \"NM_001377265.1:c.841G>T\"")]
    InvalidHgvs { hgvs: String },
    /// Connectivity failure: timeout, non-2xx status, unreadable body.
    #[error("ClinVar request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The search succeeded but returned zero candidate ids.
    #[error("variant {0:?} not found in ClinVar")]
    NotFound(String),
    /// The summary response lacked the expected document entry.
    #[error("ClinVar summary response missing document for id {0:?}")]
    MissingSummary(String),
}

/// Validate the HGVS transcript format before spending a network call.
pub fn validate_hgvs(hgvs: &str) -> Result<(), Error> {
    if hgvs.starts_with(TRANSCRIPT_PREFIX) && hgvs.contains(':') && hgvs.contains(CODING_MARKER) {
        Ok(())
    } else {
        Err(Error::InvalidHgvs {
            hgvs: hgvs.to_string(),
        })
    }
}

/// Derive the browsable record URL for a ClinVar variation id.
pub fn record_url(clinvar_id: &str) -> String {
    format!("{}/{}", RECORD_URL_BASE, clinvar_id)
}

/// Extract the candidate id list from an `esearch` response body.
pub fn extract_id(hgvs: &str, response: &serde_json::Value) -> Result<String, Error> {
    response
        .pointer("/esearchresult/idlist")
        .and_then(|ids| ids.as_array())
        .and_then(|ids| ids.first())
        .and_then(|id| id.as_str())
        .map(String::from)
        .ok_or_else(|| Error::NotFound(hgvs.to_string()))
}

/// Extract the document for `clinvar_id` from an `esummary` response body.
pub fn extract_document(
    clinvar_id: &str,
    response: &serde_json::Value,
) -> Result<serde_json::Value, Error> {
    response
        .pointer(&format!("/result/{}", clinvar_id))
        .filter(|doc| doc.is_object())
        .cloned()
        .ok_or_else(|| Error::MissingSummary(clinvar_id.to_string()))
}

/// Assemble the annotation bundle from a ClinVar summary document.
///
/// Every sub-field is extracted best-effort: a missing or malformed
/// sub-field yields `None` for that field only.
pub fn extract_annotation(clinvar_id: &str, doc: &serde_json::Value) -> ClinvarAnnotation {
    let str_at = |pointer: &str| {
        doc.pointer(pointer)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    // Submission count is the length of the supporting SCV list.
    let num_records = doc
        .pointer("/supporting_submissions/scv")
        .and_then(|scvs| scvs.as_array())
        .map(|scvs| scvs.len() as i64);

    ClinvarAnnotation {
        clinvar_id: clinvar_id.to_string(),
        gene_symbol: str_at("/genes/0/symbol"),
        cdna_change: str_at("/variation_set/0/cdna_change"),
        accession: str_at("/accession"),
        classification: str_at("/germline_classification/description"),
        num_records,
        review_status: str_at("/germline_classification/review_status"),
        associated_condition: str_at("/germline_classification/trait_set/0/trait_name"),
        clinvar_url: record_url(clinvar_id),
    }
}

/// Blocking ClinVar e-utils client with a fixed per-call timeout.
#[derive(Debug)]
pub struct Client {
    /// The HTTP client, configured with the call timeout.
    http: reqwest::blocking::Client,
    /// Base URL of the e-utils endpoints.
    base_url: String,
    /// Email forwarded to NCBI on each request, as the e-utils ask for.
    email: Option<String>,
}

impl Client {
    /// Construct a new client against `base_url` with the given timeout.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        email: Option<String>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            email,
        })
    }

    /// Issue one e-utils GET request and decode the JSON body.
    fn get_json(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, Error> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self.http.get(&url).query(query).query(&[("retmode", "json")]);
        if let Some(email) = &self.email {
            request = request.query(&[("email", email.as_str())]);
        }
        tracing::debug!("GET {} {:?}", &url, query);
        Ok(request.send()?.error_for_status()?.json()?)
    }

    /// Step (a): resolve an HGVS transcript string to a ClinVar variation id.
    ///
    /// Fails fast with [`Error::InvalidHgvs`] before any network I/O when
    /// the HGVS string is malformed.
    pub fn search_id(&self, hgvs: &str) -> Result<String, Error> {
        validate_hgvs(hgvs)?;
        let response = self.get_json("esearch.fcgi", &[("db", "clinvar"), ("term", hgvs)])?;
        extract_id(hgvs, &response)
    }

    /// Step (b): fetch the summary document for a ClinVar variation id.
    pub fn fetch_summary(&self, clinvar_id: &str) -> Result<serde_json::Value, Error> {
        let response =
            self.get_json("esummary.fcgi", &[("db", "clinvar"), ("id", clinvar_id)])?;
        extract_document(clinvar_id, &response)
    }

    /// Combined convenience operation: both steps plus bundle assembly.
    pub fn fetch_annotation(&self, hgvs: &str) -> Result<ClinvarAnnotation, Error> {
        let clinvar_id = self.search_id(hgvs)?;
        let doc = self.fetch_summary(&clinvar_id)?;
        Ok(extract_annotation(&clinvar_id, &doc))
    }
}

impl AnnotateClinvar for Client {
    fn annotate(&mut self, hgvs: &str) -> Result<ClinvarAnnotation, Error> {
        self.fetch_annotation(hgvs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[rstest::rstest]
    #[case::snv("NM_001377265.1:c.841G>T")]
    #[case::unversioned("NM_000277:c.1222C>T")]
    fn validate_hgvs_accepts(#[case] hgvs: &str) -> Result<(), Error> {
        validate_hgvs(hgvs)
    }

    #[rstest::rstest]
    #[case::genomic("NC_000017.11:g.45983420G>T")]
    #[case::no_separator("NM_001377265.1c.841G>T")]
    #[case::no_coding_change("NM_001377265.1:g.841G>T")]
    #[case::vcf_style("17:45983420:G:T")]
    #[case::empty("")]
    fn validate_hgvs_rejects(#[case] hgvs: &str) {
        let res = validate_hgvs(hgvs);
        assert!(matches!(res, Err(Error::InvalidHgvs { .. })), "{:?}", res);
    }

    #[test]
    fn extract_id_first_of_list() -> Result<(), Error> {
        let response = json!({
            "esearchresult": {"count": "2", "idlist": ["578075", "12345"]},
        });
        assert_eq!("578075", extract_id("NM_001377265.1:c.841G>T", &response)?);

        Ok(())
    }

    #[test]
    fn extract_id_empty_list_is_not_found() {
        let response = json!({"esearchresult": {"count": "0", "idlist": []}});
        let res = extract_id("NM_001377265.1:c.841G>T", &response);
        assert!(matches!(res, Err(Error::NotFound(_))), "{:?}", res);
    }

    #[test]
    fn extract_annotation_full_document() {
        let doc = json!({
            "accession": "VCV000578075",
            "genes": [{"symbol": "MAPT", "geneid": "4137"}],
            "variation_set": [{"cdna_change": "c.841G>T"}],
            "germline_classification": {
                "description": "Pathogenic",
                "review_status": "criteria provided, single submitter",
                "trait_set": [{"trait_name": "Frontotemporal dementia"}],
            },
            "supporting_submissions": {"scv": ["SCV000692920", "SCV001251029"]},
        });

        let annotation = extract_annotation("578075", &doc);
        assert_eq!(
            ClinvarAnnotation {
                clinvar_id: "578075".to_string(),
                gene_symbol: Some("MAPT".to_string()),
                cdna_change: Some("c.841G>T".to_string()),
                accession: Some("VCV000578075".to_string()),
                classification: Some("Pathogenic".to_string()),
                num_records: Some(2),
                review_status: Some("criteria provided, single submitter".to_string()),
                associated_condition: Some("Frontotemporal dementia".to_string()),
                clinvar_url: "https://www.ncbi.nlm.nih.gov/clinvar/variation/578075".to_string(),
            },
            annotation
        );
    }

    #[test]
    fn extract_annotation_degrades_per_field() {
        // Sparse document: only the accession is present; everything else
        // must degrade to `None` without failing the extraction.
        let doc = json!({
            "accession": "VCV000578075",
            "genes": [],
            "germline_classification": {"description": ""},
        });

        let annotation = extract_annotation("578075", &doc);
        assert_eq!(Some("VCV000578075".to_string()), annotation.accession);
        assert_eq!(None, annotation.gene_symbol);
        assert_eq!(None, annotation.cdna_change);
        assert_eq!(None, annotation.classification);
        assert_eq!(None, annotation.num_records);
        assert_eq!(None, annotation.review_status);
        assert_eq!(None, annotation.associated_condition);
        assert!(annotation.clinvar_url.ends_with("/578075"));
    }

    #[test]
    fn extract_document_missing_entry() {
        let response = json!({"result": {"uids": []}});
        let res = extract_document("578075", &response);
        assert!(matches!(res, Err(Error::MissingSummary(_))), "{:?}", res);
    }
}
