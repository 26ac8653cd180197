//! The closed vocabulary of VCF value types and arity rules, and their mapping
//! to Arrow element types.
//!
//! Everything in this module is a pure function of declared header attributes
//! plus a per-record [`AlleleContext`]; no state is carried between records.

use arrow::datatypes::DataType;
use std::fmt;

/// Declared value type of an INFO or FORMAT field (the `Type=` attribute).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Integer values, mapped to `Int64`.
    Integer,
    /// Floating-point values, mapped to `Float64`.
    Float,
    /// Free text, mapped to `Utf8`.
    String,
    /// Single characters, mapped to `Utf8`.
    Character,
    /// Presence-only flags, mapped to `Boolean`. A Flag is `true` iff the key
    /// appears in the record; absence means `false`, never missing.
    Flag,
}

impl ValueType {
    /// Parses the `Type=` attribute value of a header declaration.
    pub fn parse(s: &str) -> Option<ValueType> {
        match s {
            "Integer" => Some(ValueType::Integer),
            "Float" => Some(ValueType::Float),
            "String" => Some(ValueType::String),
            "Character" => Some(ValueType::Character),
            "Flag" => Some(ValueType::Flag),
            _ => None,
        }
    }

    /// Maps the declared type to the Arrow element type of the output column.
    pub fn element_type(&self) -> DataType {
        match self {
            ValueType::Integer => DataType::Int64,
            ValueType::Float => DataType::Float64,
            ValueType::String | ValueType::Character => DataType::Utf8,
            ValueType::Flag => DataType::Boolean,
        }
    }
}

/// Declared count rule of a field (the `Number=` attribute).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// A fixed number of values per record.
    Fixed(usize),
    /// One value per ALT allele (`Number=A`).
    PerAltAllele,
    /// One value per allele including REF (`Number=R`).
    PerAllele,
    /// One value per possible genotype (`Number=G`).
    PerGenotype,
    /// Unknown or unbounded count (`Number=.`); observed counts are accepted
    /// without validation.
    Unbounded,
}

impl Arity {
    /// Parses the `Number=` attribute value of a header declaration.
    pub fn parse(s: &str) -> Option<Arity> {
        match s {
            "A" => Some(Arity::PerAltAllele),
            "R" => Some(Arity::PerAllele),
            "G" => Some(Arity::PerGenotype),
            "." => Some(Arity::Unbounded),
            n => n.parse::<usize>().ok().map(Arity::Fixed),
        }
    }

    /// Classifies the output column shape implied by this arity.
    ///
    /// Flags and `Fixed(0)`/`Fixed(1)` fields are scalar; every other arity
    /// produces a list column, fixed-length when the count is declared.
    pub fn multiplicity(&self, value_type: ValueType) -> Multiplicity {
        if value_type == ValueType::Flag {
            return Multiplicity::Scalar;
        }
        match self {
            Arity::Fixed(0) | Arity::Fixed(1) => Multiplicity::Scalar,
            Arity::Fixed(n) => Multiplicity::FixedList(*n),
            Arity::PerAltAllele | Arity::PerAllele | Arity::PerGenotype | Arity::Unbounded => {
                Multiplicity::VarList
            }
        }
    }

    /// Resolves this arity against a record's allele context.
    ///
    /// Returns the expected value count, or `None` when no validation is
    /// possible (`Unbounded`, or `PerGenotype` with unknown ploidy).
    pub fn resolve(&self, ctx: &AlleleContext) -> Option<usize> {
        match self {
            Arity::Fixed(n) => Some(*n),
            Arity::PerAltAllele => Some(ctx.alt_count),
            Arity::PerAllele => Some(ctx.alt_count + 1),
            Arity::PerGenotype => ctx.ploidy.map(|p| genotype_count(ctx.alt_count + 1, p)),
            Arity::Unbounded => None,
        }
    }
}

/// Whether an output column holds one value, a fixed-length list, or a
/// variable-length list per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Multiplicity {
    /// Exactly one (possibly missing) value per record.
    Scalar,
    /// A list with a count known at schema-build time.
    FixedList(usize),
    /// A list whose count is resolved per record or unvalidated.
    VarList,
}

impl Multiplicity {
    /// True for both fixed- and variable-length list columns.
    pub fn is_list(&self) -> bool {
        !matches!(self, Multiplicity::Scalar)
    }
}

/// Which header section declared a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldScope {
    /// Per-record metadata (`##INFO` declarations).
    Info,
    /// Per-sample genotype fields (`##FORMAT` declarations).
    Format,
}

impl fmt::Display for FieldScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldScope::Info => write!(f, "INFO"),
            FieldScope::Format => write!(f, "FORMAT"),
        }
    }
}

/// Per-record counts needed to resolve allele-dependent arities.
///
/// Derived once per record from the ALT list and, when genotypes are present,
/// the first sample's GT value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlleleContext {
    /// Number of ALT alleles in the record.
    pub alt_count: usize,
    /// Ploidy derived from GT, if genotypes are present and parseable.
    pub ploidy: Option<usize>,
}

/// Number of unordered genotypes for `alleles` alleles at ploidy `p`:
/// the multiset coefficient C(alleles + p - 1, p).
fn genotype_count(alleles: usize, ploidy: usize) -> usize {
    if ploidy == 0 {
        return 0;
    }
    binomial(alleles + ploidy - 1, ploidy)
}

fn binomial(n: usize, k: usize) -> usize {
    let k = k.min(n - k);
    let mut acc: usize = 1;
    for i in 0..k {
        acc = acc * (n - i) / (i + 1);
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("Integer", DataType::Int64)]
    #[case("Float", DataType::Float64)]
    #[case("String", DataType::Utf8)]
    #[case("Character", DataType::Utf8)]
    #[case("Flag", DataType::Boolean)]
    fn value_type_mapping(#[case] declared: &str, #[case] expected: DataType) {
        assert_eq!(ValueType::parse(declared).unwrap().element_type(), expected);
    }

    #[rstest]
    #[case("1", Arity::Fixed(1))]
    #[case("3", Arity::Fixed(3))]
    #[case("A", Arity::PerAltAllele)]
    #[case("R", Arity::PerAllele)]
    #[case("G", Arity::PerGenotype)]
    #[case(".", Arity::Unbounded)]
    fn arity_parsing(#[case] declared: &str, #[case] expected: Arity) {
        assert_eq!(Arity::parse(declared), Some(expected));
    }

    #[test]
    fn arity_parse_rejects_garbage() {
        assert_eq!(Arity::parse("AA"), None);
        assert_eq!(Arity::parse("-1"), None);
    }

    #[test]
    fn scalar_vs_list_multiplicity() {
        assert_eq!(
            Arity::Fixed(1).multiplicity(ValueType::Integer),
            Multiplicity::Scalar
        );
        assert_eq!(
            Arity::Fixed(0).multiplicity(ValueType::Flag),
            Multiplicity::Scalar
        );
        assert_eq!(
            Arity::Fixed(2).multiplicity(ValueType::Integer),
            Multiplicity::FixedList(2)
        );
        assert_eq!(
            Arity::PerAltAllele.multiplicity(ValueType::Float),
            Multiplicity::VarList
        );
        assert_eq!(
            Arity::Unbounded.multiplicity(ValueType::String),
            Multiplicity::VarList
        );
    }

    #[rstest]
    #[case(Arity::PerAltAllele, 2, Some(2))]
    #[case(Arity::PerAllele, 2, Some(3))]
    #[case(Arity::Fixed(4), 2, Some(4))]
    #[case(Arity::Unbounded, 2, None)]
    fn arity_resolution(
        #[case] arity: Arity,
        #[case] alt_count: usize,
        #[case] expected: Option<usize>,
    ) {
        let ctx = AlleleContext {
            alt_count,
            ploidy: Some(2),
        };
        assert_eq!(arity.resolve(&ctx), expected);
    }

    #[test]
    fn genotype_arity_is_not_assumed_diploid() {
        // Diploid, biallelic: 0/0, 0/1, 1/1
        let diploid = AlleleContext {
            alt_count: 1,
            ploidy: Some(2),
        };
        assert_eq!(Arity::PerGenotype.resolve(&diploid), Some(3));

        // Triploid, biallelic: 000, 001, 011, 111
        let triploid = AlleleContext {
            alt_count: 1,
            ploidy: Some(3),
        };
        assert_eq!(Arity::PerGenotype.resolve(&triploid), Some(4));

        // Unknown ploidy: no validation possible
        let unknown = AlleleContext {
            alt_count: 1,
            ploidy: None,
        };
        assert_eq!(Arity::PerGenotype.resolve(&unknown), None);
    }
}
