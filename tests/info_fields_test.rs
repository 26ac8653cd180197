use arrow::array::{Array, BooleanArray, Float64Array, Int64Array, ListArray};
use std::sync::Arc;
use vcf_flatten::{
    FieldScope, FieldSelection, FlattenError, QueryOptions, RawRecord, SchemaOptions,
    build_schema, run_query,
};

const SAMPLE_VCF_CONTENT_WITH_INFO: &str = r#"##fileformat=VCFv4.3
##INFO=<ID=NS,Number=1,Type=Integer,Description="Number of samples with data">
##INFO=<ID=DP,Number=1,Type=Integer,Description="Combined depth across samples">
##INFO=<ID=AF,Number=A,Type=Float,Description="Allele frequency">
##INFO=<ID=DB,Number=0,Type=Flag,Description="dbSNP membership">
##INFO=<ID=SVTYPE,Number=1,Type=String,Description="Type of structural variant">
#CHROM	POS	ID	REF	ALT	QUAL	FILTER	INFO
chr1	100	rs1	A	T	60	PASS	NS=3;DP=14;AF=0.5;DB
chr1	200	rs2	G	C	80	PASS	NS=2;DP=25;AF=1.0
chr2	300	rs3	C	T,A	70	PASS	NS=4;DP=30;AF=0.33,0.33
chr2	400	.	T	G	50	PASS	NS=1;DP=40;SVTYPE=SNV
"#;

fn records(content: &str) -> Vec<RawRecord> {
    content
        .lines()
        .filter(|l| !l.starts_with('#') && !l.is_empty())
        .map(|l| RawRecord::from_line(l).unwrap())
        .collect()
}

fn info(key: &str) -> FieldSelection {
    FieldSelection::new(FieldScope::Info, key)
}

#[test]
fn scalar_integer_info_field_round_trips() {
    let schema = Arc::new(
        build_schema(
            SAMPLE_VCF_CONTENT_WITH_INFO,
            &[info("NS")],
            &SchemaOptions::default(),
        )
        .unwrap(),
    );
    let output = run_query(
        schema,
        records(SAMPLE_VCF_CONTENT_WITH_INFO),
        QueryOptions::default(),
    )
    .unwrap();

    assert_eq!(output.batch.num_rows(), 4);
    let ns = output
        .batch
        .column(7)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(ns.value(0), 3);
    assert_eq!(ns.value(3), 1);
    assert_eq!(output.stats.degraded_fields, 0);
}

#[test]
fn per_alt_allele_float_list_matches_alt_count() {
    let schema = Arc::new(
        build_schema(
            SAMPLE_VCF_CONTENT_WITH_INFO,
            &[info("AF")],
            &SchemaOptions::default(),
        )
        .unwrap(),
    );
    let output = run_query(
        schema,
        records(SAMPLE_VCF_CONTENT_WITH_INFO),
        QueryOptions::default(),
    )
    .unwrap();

    let af = output
        .batch
        .column(7)
        .as_any()
        .downcast_ref::<ListArray>()
        .unwrap();
    let first = af.value(0);
    let first = first.as_any().downcast_ref::<Float64Array>().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first.value(0), 0.5);

    // Two ALT alleles on row 2, so two AF values.
    let multi = af.value(2);
    let multi = multi.as_any().downcast_ref::<Float64Array>().unwrap();
    assert_eq!(multi.len(), 2);
    assert_eq!(multi.value(0), 0.33);
    assert_eq!(multi.value(1), 0.33);

    // AF absent on row 3.
    assert!(af.is_null(3));
}

#[test]
fn flag_fields_are_never_null() {
    let schema = Arc::new(
        build_schema(
            SAMPLE_VCF_CONTENT_WITH_INFO,
            &[info("DB")],
            &SchemaOptions::default(),
        )
        .unwrap(),
    );
    let output = run_query(
        schema,
        records(SAMPLE_VCF_CONTENT_WITH_INFO),
        QueryOptions::default(),
    )
    .unwrap();

    let db = output
        .batch
        .column(7)
        .as_any()
        .downcast_ref::<BooleanArray>()
        .unwrap();
    assert_eq!(db.null_count(), 0);
    assert!(db.value(0));
    assert!(!db.value(1));
    assert!(!db.value(2));
    assert!(!db.value(3));
}

#[test]
fn selected_key_absent_from_every_record_yields_all_missing_column() {
    // SVTYPE only appears on the last record; select it together with a key
    // that never appears in the data at all.
    let content = r#"##fileformat=VCFv4.3
##INFO=<ID=NS,Number=1,Type=Integer,Description="Number of samples with data">
##INFO=<ID=END,Number=1,Type=Integer,Description="End position">
#CHROM	POS	ID	REF	ALT	QUAL	FILTER	INFO
chr1	100	.	A	T	60	PASS	NS=3
chr1	200	.	G	C	80	PASS	NS=2
"#;
    let schema = Arc::new(build_schema(content, &[info("END")], &SchemaOptions::default()).unwrap());
    let output = run_query(schema, records(content), QueryOptions::default()).unwrap();

    let end = output
        .batch
        .column(7)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(end.len(), 2);
    assert_eq!(end.null_count(), 2);
    assert_eq!(output.stats.degraded_fields, 0);
}

#[test]
fn arity_mismatch_degrades_and_is_counted_in_stats() {
    let content = r#"##fileformat=VCFv4.3
##INFO=<ID=AF,Number=A,Type=Float,Description="Allele frequency">
#CHROM	POS	ID	REF	ALT	QUAL	FILTER	INFO
chr1	100	.	C	A,T	50	PASS	AF=0.5
chr1	200	.	C	A	50	PASS	AF=0.5
"#;
    let schema = Arc::new(build_schema(content, &[info("AF")], &SchemaOptions::default()).unwrap());
    let output = run_query(schema, records(content), QueryOptions::default()).unwrap();

    let af = output
        .batch
        .column(7)
        .as_any()
        .downcast_ref::<ListArray>()
        .unwrap();
    assert!(af.is_null(0));
    assert!(!af.is_null(1));
    assert_eq!(output.stats.degraded_fields, 1);
    assert_eq!(output.stats.degraded_by_column.get("AF"), Some(&1));
}

#[test]
fn arity_mismatch_is_fatal_under_strict_mode() {
    let content = r#"##fileformat=VCFv4.3
##INFO=<ID=AF,Number=A,Type=Float,Description="Allele frequency">
#CHROM	POS	ID	REF	ALT	QUAL	FILTER	INFO
chr1	100	.	C	A,T	50	PASS	AF=0.5
"#;
    let schema = Arc::new(build_schema(content, &[info("AF")], &SchemaOptions::default()).unwrap());
    let err = run_query(
        schema,
        records(content),
        QueryOptions { arity_strict: true },
    )
    .unwrap_err();
    assert!(matches!(err, FlattenError::ArityMismatch { .. }));
}

#[test]
fn type_mismatch_degrades_without_dropping_the_record() {
    let content = r#"##fileformat=VCFv4.3
##INFO=<ID=DP,Number=1,Type=Integer,Description="Depth">
#CHROM	POS	ID	REF	ALT	QUAL	FILTER	INFO
chr1	100	.	A	T	60	PASS	DP=high
chr1	200	.	G	C	80	PASS	DP=25
"#;
    let schema = Arc::new(build_schema(content, &[info("DP")], &SchemaOptions::default()).unwrap());
    let output = run_query(schema, records(content), QueryOptions::default()).unwrap();

    assert_eq!(output.batch.num_rows(), 2);
    let dp = output
        .batch
        .column(7)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert!(dp.is_null(0));
    assert_eq!(dp.value(1), 25);
    assert_eq!(output.stats.degraded_by_column.get("DP"), Some(&1));
}

#[test]
fn two_scans_over_the_same_input_are_identical() {
    let schema = Arc::new(
        build_schema(SAMPLE_VCF_CONTENT_WITH_INFO, &[], &SchemaOptions::default()).unwrap(),
    );
    let a = run_query(
        Arc::clone(&schema),
        records(SAMPLE_VCF_CONTENT_WITH_INFO),
        QueryOptions::default(),
    )
    .unwrap();
    let b = run_query(
        schema,
        records(SAMPLE_VCF_CONTENT_WITH_INFO),
        QueryOptions::default(),
    )
    .unwrap();
    assert_eq!(a.batch, b.batch);
    assert_eq!(a.stats, b.stats);
}
