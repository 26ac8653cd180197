use vcf_flatten::{
    FieldScope, FieldSelection, SchemaError, SchemaOptions, build_schema,
};

const SAMPLE_VCF_HEADER: &str = r#"##fileformat=VCFv4.3
##INFO=<ID=AC,Number=A,Type=Integer,Description="Allele count in genotypes">
##INFO=<ID=AF,Number=A,Type=Float,Description="Allele frequency">
##INFO=<ID=AN,Number=1,Type=Integer,Description="Total number of alleles">
##INFO=<ID=DP,Number=1,Type=Integer,Description="Combined depth across samples">
##INFO=<ID=DB,Number=0,Type=Flag,Description="dbSNP membership">
##INFO=<ID=SVTYPE,Number=1,Type=String,Description="Type of structural variant">
##FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype">
##FORMAT=<ID=DP,Number=1,Type=Integer,Description="Read depth">
##FORMAT=<ID=AD,Number=R,Type=Integer,Description="Allelic depths">
#CHROM	POS	ID	REF	ALT	QUAL	FILTER	INFO	FORMAT	NA001	NA002
"#;

fn info(key: &str) -> FieldSelection {
    FieldSelection::new(FieldScope::Info, key)
}

#[test]
fn fixed_columns_open_every_schema_in_input_order() {
    let schema = build_schema(SAMPLE_VCF_HEADER, &[info("DP")], &SchemaOptions::default()).unwrap();
    let names: Vec<&str> = schema.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["chrom", "pos", "id", "ref", "alt", "qual", "filter", "DP"]
    );
}

#[test]
fn selection_order_is_preserved_for_info_columns() {
    let schema = build_schema(
        SAMPLE_VCF_HEADER,
        &[info("SVTYPE"), info("AC"), info("AF")],
        &SchemaOptions::default(),
    )
    .unwrap();
    let selected: Vec<&str> = schema
        .columns()
        .iter()
        .skip(7)
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(selected, vec!["SVTYPE", "AC", "AF"]);
}

#[test]
fn format_columns_always_come_last() {
    let schema = build_schema(
        SAMPLE_VCF_HEADER,
        &[
            FieldSelection::new(FieldScope::Format, "GT"),
            info("DP"),
            FieldSelection::with_alias(FieldScope::Format, "DP", "sample_dp"),
        ],
        &SchemaOptions::default(),
    )
    .unwrap();
    let selected: Vec<&str> = schema
        .columns()
        .iter()
        .skip(7)
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(selected, vec!["DP", "GT", "sample_dp"]);
}

#[test]
fn selecting_an_undeclared_key_fails_before_any_record_is_read() {
    let err = build_schema(
        SAMPLE_VCF_HEADER,
        &[info("MISSING_TAG")],
        &SchemaOptions::default(),
    )
    .unwrap_err();
    match err {
        SchemaError::UnknownField { scope, key } => {
            assert_eq!(scope, FieldScope::Info);
            assert_eq!(key, "MISSING_TAG");
        }
        other => panic!("expected UnknownField, got {other:?}"),
    }
}

#[test]
fn info_and_format_keys_are_separate_namespaces() {
    // DP is declared in both scopes; selecting both without aliases collides
    // on the output name, not on the lookup.
    let err = build_schema(
        SAMPLE_VCF_HEADER,
        &[info("DP"), FieldSelection::new(FieldScope::Format, "DP")],
        &SchemaOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::DuplicateColumn { name } if name == "DP"));

    // An alias on either side resolves the collision.
    let schema = build_schema(
        SAMPLE_VCF_HEADER,
        &[
            info("DP"),
            FieldSelection::with_alias(FieldScope::Format, "DP", "sample_dp"),
        ],
        &SchemaOptions::default(),
    )
    .unwrap();
    assert_eq!(schema.columns().len(), 9);
}

#[test]
fn sample_names_are_carried_in_schema_metadata() {
    let schema = build_schema(SAMPLE_VCF_HEADER, &[], &SchemaOptions::default()).unwrap();
    assert_eq!(schema.sample_names(), &["NA001", "NA002"]);
    let arrow = schema.arrow_schema();
    assert_eq!(
        arrow.metadata().get("vcf.sample_names").map(String::as_str),
        Some("NA001,NA002")
    );
    assert_eq!(
        arrow.metadata().get("vcf.file_format").map(String::as_str),
        Some("VCFv4.3")
    );
}

#[test]
fn field_metadata_preserves_declared_number_and_type() {
    let schema = build_schema(SAMPLE_VCF_HEADER, &[info("AF")], &SchemaOptions::default()).unwrap();
    let arrow = schema.arrow_schema();
    let af = arrow.field_with_name("AF").unwrap();
    assert_eq!(af.metadata().get("vcf.field.number").map(String::as_str), Some("A"));
    assert_eq!(
        af.metadata().get("vcf.field.type").map(String::as_str),
        Some("Float")
    );
    assert_eq!(
        af.metadata().get("vcf.field.description").map(String::as_str),
        Some("Allele frequency")
    );
}

#[test]
fn schema_build_is_deterministic() {
    let a = build_schema(SAMPLE_VCF_HEADER, &[], &SchemaOptions::default()).unwrap();
    let b = build_schema(SAMPLE_VCF_HEADER, &[], &SchemaOptions::default()).unwrap();
    assert_eq!(a.arrow_schema(), b.arrow_schema());
}
