//! SQLite-backed relational store for patients, genes, variants, and
//! their many-to-many linkage.
//!
//! The store is append-only from the pipeline's perspective: creation is
//! conditional on absence, mutation is limited to filling NULL annotation
//! columns, and deletion is out of scope.  One `Store` value is scoped to
//! one patient batch; the writer commits the whole batch in a single
//! transaction or rolls it back on any error.

use std::collections::BTreeSet;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::common;
use crate::model::{VariantRecord, UNKNOWN_GENE};

/// DDL for the four tables, idempotent.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS patients (
    name TEXT PRIMARY KEY
);
CREATE TABLE IF NOT EXISTS genes (
    gene_symbol TEXT PRIMARY KEY,
    gene_url TEXT
);
CREATE TABLE IF NOT EXISTS variants (
    vcf_form TEXT PRIMARY KEY,
    hgvs TEXT,
    clinvar_id TEXT,
    gene_symbol TEXT NOT NULL REFERENCES genes (gene_symbol),
    classification TEXT,
    cdna_change TEXT,
    clinvar_accession TEXT,
    num_records INTEGER,
    review_status TEXT,
    associated_condition TEXT,
    clinvar_url TEXT
);
CREATE TABLE IF NOT EXISTS patient_variant (
    patient_name TEXT NOT NULL REFERENCES patients (name),
    variant_vcf_form TEXT NOT NULL REFERENCES variants (vcf_form),
    PRIMARY KEY (patient_name, variant_vcf_form)
);
";

/// Derive the browsable gene report URL for a symbol.
///
/// The `UNKNOWN` placeholder has no report page and gets NULL.
pub fn gene_url(symbol: &str) -> Option<String> {
    if symbol == UNKNOWN_GENE {
        None
    } else {
        Some(format!(
            "https://www.genenames.org/data/gene-symbol-report/#!/symbol/{}",
            symbol
        ))
    }
}

/// One row of a gene or classification search: a variant with its carrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierRow {
    /// Name of the patient carrying the variant.
    pub patient_name: String,
    /// Canonical genomic key of the variant.
    pub vcf_form: String,
    /// HGVS notation, if annotated.
    pub hgvs: Option<String>,
    /// Gene symbol (possibly the `UNKNOWN` placeholder).
    pub gene_symbol: String,
    /// Classification, if annotated.
    pub classification: Option<String>,
}

/// Connection to the variant database with foreign keys enforced.
#[derive(Debug)]
pub struct Store {
    /// The underlying SQLite connection.
    conn: Connection,
}

impl Store {
    /// Open (creating if necessary) the database at `path` and
    /// create/validate the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, rusqlite::Error> {
        // Link rows must not be able to reference nonexistent patients or
        // variants; SQLite only enforces this with the pragma active.
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // Bound waits on a locked database so a commit cannot stall a
        // batch indefinitely.
        conn.busy_timeout(std::time::Duration::from_secs(30))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Return the stored variant for `vcf_form`, or `None` when no row
    /// exists.  Used by enrichment as a cache to skip remote calls.
    pub fn find_variant(&self, vcf_form: &str) -> Result<Option<VariantRecord>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT vcf_form, hgvs, clinvar_id, gene_symbol, classification, cdna_change, \
                 clinvar_accession, num_records, review_status, associated_condition, clinvar_url \
                 FROM variants WHERE vcf_form = ?1",
                params![vcf_form],
                variant_from_row,
            )
            .optional()
    }

    /// Return the stored variant annotated with `hgvs` (case-insensitive),
    /// or `None`.
    pub fn find_variant_by_hgvs(
        &self,
        hgvs: &str,
    ) -> Result<Option<VariantRecord>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT vcf_form, hgvs, clinvar_id, gene_symbol, classification, cdna_change, \
                 clinvar_accession, num_records, review_status, associated_condition, clinvar_url \
                 FROM variants WHERE hgvs = ?1 COLLATE NOCASE",
                params![hgvs],
                variant_from_row,
            )
            .optional()
    }

    /// Return the canonical keys of all variants linked to `patient`.
    pub fn variant_keys_for_patient(
        &self,
        patient: &str,
    ) -> Result<BTreeSet<String>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT variant_vcf_form FROM patient_variant WHERE patient_name = ?1")?;
        let keys = stmt.query_map(params![patient], |row| row.get::<_, String>(0))?;
        keys.collect()
    }

    /// Return the names of all patients carrying the variant `vcf_form`.
    pub fn patients_for_variant(&self, vcf_form: &str) -> Result<Vec<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT patient_name FROM patient_variant \
             WHERE variant_vcf_form = ?1 ORDER BY patient_name",
        )?;
        let names = stmt.query_map(params![vcf_form], |row| row.get::<_, String>(0))?;
        names.collect()
    }

    /// Return all variants linked to `patient`, ordered by key.
    pub fn variants_for_patient(
        &self,
        patient: &str,
    ) -> Result<Vec<VariantRecord>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT v.vcf_form, v.hgvs, v.clinvar_id, v.gene_symbol, v.classification, \
             v.cdna_change, v.clinvar_accession, v.num_records, v.review_status, \
             v.associated_condition, v.clinvar_url \
             FROM variants v \
             JOIN patient_variant pv ON pv.variant_vcf_form = v.vcf_form \
             WHERE pv.patient_name = ?1 ORDER BY v.vcf_form",
        )?;
        let rows = stmt.query_map(params![patient], variant_from_row)?;
        rows.collect()
    }

    /// Return variants of the gene `symbol` with their carriers.
    pub fn carriers_for_gene(&self, symbol: &str) -> Result<Vec<CarrierRow>, rusqlite::Error> {
        self.carrier_query(
            "WHERE v.gene_symbol = ?1 COLLATE NOCASE",
            symbol,
        )
    }

    /// Return variants with the given classification and their carriers.
    pub fn carriers_for_classification(
        &self,
        classification: &str,
    ) -> Result<Vec<CarrierRow>, rusqlite::Error> {
        self.carrier_query(
            "WHERE v.classification = ?1 COLLATE NOCASE",
            classification,
        )
    }

    fn carrier_query(
        &self,
        where_clause: &str,
        value: &str,
    ) -> Result<Vec<CarrierRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT pv.patient_name, v.vcf_form, v.hgvs, v.gene_symbol, v.classification \
             FROM variants v \
             JOIN patient_variant pv ON pv.variant_vcf_form = v.vcf_form \
             {} ORDER BY v.vcf_form, pv.patient_name",
            where_clause
        ))?;
        let rows = stmt.query_map(params![value], |row| {
            Ok(CarrierRow {
                patient_name: row.get(0)?,
                vcf_form: row.get(1)?,
                hgvs: row.get(2)?,
                gene_symbol: row.get(3)?,
                classification: row.get(4)?,
            })
        })?;
        rows.collect()
    }

    /// Commit one patient batch: patient, genes, variants, and links, all
    /// within a single transaction.
    ///
    /// Every "exists or create" decision is read-then-conditional-insert
    /// inside the transaction; existing variants only have their NULL
    /// columns filled (`COALESCE`), populated columns are never replaced.
    /// The `UNKNOWN` gene placeholder counts as unpopulated and is
    /// upgraded once a symbol resolves.  Any error rolls the whole batch
    /// back.
    pub fn write_batch(
        &mut self,
        patient: &str,
        rows: &[VariantRecord],
    ) -> Result<usize, rusqlite::Error> {
        let tx = self.conn.transaction()?;

        if !exists(&tx, "SELECT 1 FROM patients WHERE name = ?1", patient)? {
            tx.execute("INSERT INTO patients (name) VALUES (?1)", params![patient])?;
        }

        for row in rows {
            let symbol = row.gene_symbol.as_deref().unwrap_or(UNKNOWN_GENE);
            if !exists(&tx, "SELECT 1 FROM genes WHERE gene_symbol = ?1", symbol)? {
                tx.execute(
                    "INSERT INTO genes (gene_symbol, gene_url) VALUES (?1, ?2)",
                    params![symbol, gene_url(symbol)],
                )?;
            }

            if exists(
                &tx,
                "SELECT 1 FROM variants WHERE vcf_form = ?1",
                &row.vcf_form,
            )? {
                // The placeholder gene means "unresolved" and counts as
                // empty for fill purposes; resolved symbols stay.
                tx.execute(
                    "UPDATE variants SET \
                     hgvs = COALESCE(hgvs, ?2), \
                     clinvar_id = COALESCE(clinvar_id, ?3), \
                     classification = COALESCE(classification, ?4), \
                     cdna_change = COALESCE(cdna_change, ?5), \
                     clinvar_accession = COALESCE(clinvar_accession, ?6), \
                     num_records = COALESCE(num_records, ?7), \
                     review_status = COALESCE(review_status, ?8), \
                     associated_condition = COALESCE(associated_condition, ?9), \
                     clinvar_url = COALESCE(clinvar_url, ?10), \
                     gene_symbol = CASE WHEN gene_symbol = ?11 THEN ?12 \
                                   ELSE gene_symbol END \
                     WHERE vcf_form = ?1",
                    params![
                        row.vcf_form,
                        row.hgvs,
                        row.clinvar_id,
                        row.classification,
                        row.cdna_change,
                        row.clinvar_accession,
                        row.num_records,
                        row.review_status,
                        row.associated_condition,
                        row.clinvar_url,
                        UNKNOWN_GENE,
                        symbol,
                    ],
                )?;
            } else {
                tx.execute(
                    "INSERT INTO variants (vcf_form, hgvs, clinvar_id, gene_symbol, \
                     classification, cdna_change, clinvar_accession, num_records, \
                     review_status, associated_condition, clinvar_url) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        row.vcf_form,
                        row.hgvs,
                        row.clinvar_id,
                        symbol,
                        row.classification,
                        row.cdna_change,
                        row.clinvar_accession,
                        row.num_records,
                        row.review_status,
                        row.associated_condition,
                        row.clinvar_url,
                    ],
                )?;
            }

            let link_exists = tx
                .query_row(
                    "SELECT 1 FROM patient_variant \
                     WHERE patient_name = ?1 AND variant_vcf_form = ?2",
                    params![patient, row.vcf_form],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !link_exists {
                tx.execute(
                    "INSERT INTO patient_variant (patient_name, variant_vcf_form) \
                     VALUES (?1, ?2)",
                    params![patient, row.vcf_form],
                )?;
            }
        }

        tx.commit()?;
        tracing::info!("committed {} variant rows for patient {:?}", rows.len(), patient);

        Ok(rows.len())
    }
}

/// Run a single-parameter existence query within `conn`.
fn exists(conn: &Connection, sql: &str, value: &str) -> Result<bool, rusqlite::Error> {
    Ok(conn
        .query_row(sql, params![value], |_| Ok(()))
        .optional()?
        .is_some())
}

/// Map a full `variants` row to a [`VariantRecord`].
///
/// The `UNKNOWN` placeholder is surfaced as `None` so callers treat it as
/// an unresolved symbol rather than a populated one.
fn variant_from_row(row: &rusqlite::Row<'_>) -> Result<VariantRecord, rusqlite::Error> {
    Ok(VariantRecord {
        vcf_form: row.get(0)?,
        hgvs: row.get(1)?,
        clinvar_id: row.get(2)?,
        gene_symbol: row
            .get::<_, Option<String>>(3)?
            .filter(|symbol| symbol != UNKNOWN_GENE),
        classification: row.get(4)?,
        cdna_change: row.get(5)?,
        clinvar_accession: row.get(6)?,
        num_records: row.get(7)?,
        review_status: row.get(8)?,
        associated_condition: row.get(9)?,
        clinvar_url: row.get(10)?,
    })
}

/// Command line arguments for `db init` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "initialize the variant database schema", long_about = None)]
pub struct InitArgs {
    /// Path to the SQLite database.
    #[clap(long)]
    pub path_db: String,
}

/// Main entry point for `db init` sub command.
pub fn run_init(args_common: &common::Args, args: &InitArgs) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", args_common);
    tracing::info!("args = {:?}", args);

    let _ = Store::open(&args.path_db)?;
    tracing::info!("created/validated tables in {:?}", &args.path_db);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn count(store: &Store, table: &str) -> i64 {
        store
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    fn sample_row(vcf_form: &str, gene: Option<&str>) -> VariantRecord {
        VariantRecord {
            vcf_form: vcf_form.to_string(),
            hgvs: Some("NM_001377265.1:c.841G>T".to_string()),
            clinvar_id: Some("578075".to_string()),
            gene_symbol: gene.map(String::from),
            classification: Some("Pathogenic".to_string()),
            cdna_change: Some("c.841G>T".to_string()),
            clinvar_accession: Some("VCV000578075".to_string()),
            num_records: Some(2),
            review_status: Some("criteria provided".to_string()),
            associated_condition: Some("Frontotemporal dementia".to_string()),
            clinvar_url: Some("https://www.ncbi.nlm.nih.gov/clinvar/variation/578075".to_string()),
        }
    }

    #[test]
    fn write_batch_creates_all_entities() -> Result<(), anyhow::Error> {
        let mut store = Store::open_in_memory()?;
        let rows = vec![
            sample_row("17:45983420:G:T", Some("MAPT")),
            sample_row("12:102852850:G:A", None),
        ];

        let written = store.write_batch("patient1", &rows)?;

        assert_eq!(2, written);
        assert_eq!(1, count(&store, "patients"));
        assert_eq!(2, count(&store, "genes"));
        assert_eq!(2, count(&store, "variants"));
        assert_eq!(2, count(&store, "patient_variant"));

        // The unresolved gene got the placeholder symbol without a URL.
        let url: Option<String> = store.conn.query_row(
            "SELECT gene_url FROM genes WHERE gene_symbol = 'UNKNOWN'",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(None, url);

        Ok(())
    }

    #[test]
    fn write_batch_is_idempotent() -> Result<(), anyhow::Error> {
        let mut store = Store::open_in_memory()?;
        let rows = vec![sample_row("17:45983420:G:T", Some("MAPT"))];

        store.write_batch("patient1", &rows)?;
        store.write_batch("patient1", &rows)?;

        assert_eq!(1, count(&store, "patients"));
        assert_eq!(1, count(&store, "genes"));
        assert_eq!(1, count(&store, "variants"));
        assert_eq!(1, count(&store, "patient_variant"));

        Ok(())
    }

    #[test]
    fn write_batch_shares_variants_between_patients() -> Result<(), anyhow::Error> {
        let mut store = Store::open_in_memory()?;
        let rows = vec![sample_row("17:45983420:G:T", Some("MAPT"))];

        store.write_batch("patient1", &rows)?;
        store.write_batch("patient2", &rows)?;

        assert_eq!(2, count(&store, "patients"));
        assert_eq!(1, count(&store, "variants"));
        assert_eq!(2, count(&store, "patient_variant"));
        assert_eq!(
            vec!["patient1".to_string(), "patient2".to_string()],
            store.patients_for_variant("17:45983420:G:T")?
        );

        Ok(())
    }

    #[test]
    fn write_batch_fills_but_never_overwrites() -> Result<(), anyhow::Error> {
        let mut store = Store::open_in_memory()?;

        let mut first = sample_row("17:45983420:G:T", Some("MAPT"));
        first.classification = Some("Pathogenic".to_string());
        first.review_status = None;
        store.write_batch("patient1", &[first])?;

        // A later pass with a diverging classification and a now-known
        // review status: the populated column stays, the NULL one fills.
        let mut second = sample_row("17:45983420:G:T", Some("MAPT"));
        second.classification = Some("Benign".to_string());
        second.review_status = Some("reviewed by expert panel".to_string());
        store.write_batch("patient1", &[second])?;

        let stored = store.find_variant("17:45983420:G:T")?.unwrap();
        assert_eq!(Some("Pathogenic".to_string()), stored.classification);
        assert_eq!(
            Some("reviewed by expert panel".to_string()),
            stored.review_status
        );

        Ok(())
    }

    #[test]
    fn write_batch_upgrades_placeholder_gene() -> Result<(), anyhow::Error> {
        let mut store = Store::open_in_memory()?;
        store.write_batch("patient1", &[sample_row("1:100:A:C", None)])?;

        // A later pass resolves the symbol: the placeholder is upgraded.
        store.write_batch("patient1", &[sample_row("1:100:A:C", Some("MAPT"))])?;
        let stored = store.find_variant("1:100:A:C")?.unwrap();
        assert_eq!(Some("MAPT".to_string()), stored.gene_symbol);

        // A resolved symbol is never replaced.
        store.write_batch("patient1", &[sample_row("1:100:A:C", Some("LRRK2"))])?;
        let stored = store.find_variant("1:100:A:C")?.unwrap();
        assert_eq!(Some("MAPT".to_string()), stored.gene_symbol);

        Ok(())
    }

    #[test]
    fn find_variant_not_found_is_none() -> Result<(), anyhow::Error> {
        let store = Store::open_in_memory()?;
        assert_eq!(None, store.find_variant("1:1:A:C")?);

        Ok(())
    }

    #[test]
    fn find_variant_masks_placeholder_gene() -> Result<(), anyhow::Error> {
        let mut store = Store::open_in_memory()?;
        store.write_batch("patient1", &[sample_row("1:100:A:C", None)])?;

        let stored = store.find_variant("1:100:A:C")?.unwrap();
        assert_eq!(None, stored.gene_symbol);

        Ok(())
    }

    #[test]
    fn variant_keys_for_patient_reflect_links() -> Result<(), anyhow::Error> {
        let mut store = Store::open_in_memory()?;
        store.write_batch(
            "patient1",
            &[
                sample_row("17:45983420:G:T", Some("MAPT")),
                sample_row("12:102852850:G:A", Some("PAH")),
            ],
        )?;

        let keys = store.variant_keys_for_patient("patient1")?;
        assert_eq!(
            vec!["12:102852850:G:A", "17:45983420:G:T"],
            keys.into_iter().collect::<Vec<_>>()
        );
        assert!(store.variant_keys_for_patient("nobody")?.is_empty());

        Ok(())
    }

    #[test]
    fn foreign_keys_are_enforced() -> Result<(), anyhow::Error> {
        let store = Store::open_in_memory()?;
        let res = store.conn.execute(
            "INSERT INTO patient_variant (patient_name, variant_vcf_form) \
             VALUES ('ghost', '1:1:A:C')",
            [],
        );
        assert!(res.is_err());

        Ok(())
    }

    #[test]
    fn uncommitted_transaction_leaves_no_rows() -> Result<(), anyhow::Error> {
        let mut store = Store::open_in_memory()?;
        {
            let tx = store.conn.transaction()?;
            tx.execute("INSERT INTO patients (name) VALUES ('patient1')", [])?;
            tx.execute(
                "INSERT INTO genes (gene_symbol, gene_url) VALUES ('MAPT', NULL)",
                [],
            )?;
            // Dropped without commit.
        }

        assert_eq!(0, count(&store, "patients"));
        assert_eq!(0, count(&store, "genes"));

        Ok(())
    }

    #[test]
    fn failing_write_batch_rolls_back_completely() -> Result<(), anyhow::Error> {
        let mut store = Store::open_in_memory()?;
        // Make the second row's variant insert fail mid-batch.
        store.conn.execute_batch(
            "CREATE TRIGGER reject_second BEFORE INSERT ON variants \
             WHEN NEW.vcf_form = '2:200:T:G' \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )?;

        let rows = vec![
            sample_row("1:100:A:C", Some("MAPT")),
            sample_row("2:200:T:G", Some("LRRK2")),
        ];
        let res = store.write_batch("patient1", &rows);

        // The first row had already been inserted within the transaction;
        // nothing of the batch may remain visible.
        assert!(res.is_err());
        assert_eq!(0, count(&store, "patients"));
        assert_eq!(0, count(&store, "genes"));
        assert_eq!(0, count(&store, "variants"));
        assert_eq!(0, count(&store, "patient_variant"));

        Ok(())
    }

    #[test]
    fn search_queries_by_gene_and_classification() -> Result<(), anyhow::Error> {
        let mut store = Store::open_in_memory()?;
        store.write_batch("patient1", &[sample_row("17:45983420:G:T", Some("MAPT"))])?;
        store.write_batch("patient2", &[sample_row("17:45983420:G:T", Some("MAPT"))])?;

        let by_gene = store.carriers_for_gene("mapt")?;
        assert_eq!(2, by_gene.len());
        assert_eq!("patient1", by_gene[0].patient_name);
        assert_eq!("MAPT", by_gene[0].gene_symbol);

        let by_class = store.carriers_for_classification("pathogenic")?;
        assert_eq!(2, by_class.len());
        assert_eq!("17:45983420:G:T", by_class[0].vcf_form);

        assert!(store.carriers_for_gene("LRRK2")?.is_empty());

        Ok(())
    }

    #[test]
    fn lookup_by_hgvs_is_case_insensitive() -> Result<(), anyhow::Error> {
        let mut store = Store::open_in_memory()?;
        store.write_batch("patient1", &[sample_row("17:45983420:G:T", Some("MAPT"))])?;

        let stored = store.find_variant_by_hgvs("nm_001377265.1:C.841g>t")?;
        assert_eq!(
            Some("17:45983420:G:T".to_string()),
            stored.map(|v| v.vcf_form)
        );

        Ok(())
    }
}
