//! Closed vocabularies shared by the row model and the store
//!
//! Each vocabulary parses case-sensitively from its stored spelling and
//! renders back to the same spelling, so values round-trip through the
//! database unchanged.

use serde::{Deserialize, Serialize};

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Parse the stored spelling
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Canonical database value
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            pub fn all_variants() -> &'static [$name] {
                &[$($name::$variant),+]
            }

            /// Error text listing the permitted values
            pub fn expected() -> String {
                expected_message(&[$($text),+])
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::parse(s).ok_or_else($name::expected)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// Sequencing platform recorded on a run
    SequencingMethod {
        Illumina => "illumina",
        Ont => "ont",
        Pacbio => "pacbio",
    }
}

vocabulary! {
    /// Whether the sample was cultured before extraction
    SampleCategory {
        Culture => "culture",
        Uncultured => "uncultured",
    }
}

vocabulary! {
    /// Nucleic acid extracted from a sample
    NucleicAcidType {
        Dna => "DNA",
        Rna => "RNA",
        CDna => "cDNA",
    }
}

vocabulary! {
    /// Column family a catalog attribute is stored in
    ValueType {
        Str => "str",
        Int => "int",
        Float => "float",
        Bool => "bool",
        Date => "date",
        Text => "text",
    }
}

impl ValueType {
    /// Name of the detail column holding values of this type
    pub fn column(&self) -> &'static str {
        match self {
            ValueType::Str => "value_str",
            ValueType::Int => "value_int",
            ValueType::Float => "value_float",
            ValueType::Bool => "value_bool",
            ValueType::Date => "value_date",
            ValueType::Text => "value_text",
        }
    }
}

/// "Input should be 'a', 'b' or 'c'"
fn expected_message(options: &[&str]) -> String {
    let quoted: Vec<String> = options.iter().map(|o| format!("'{}'", o)).collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => {
            format!("Input should be {} or {}", rest.join(", "), last)
        }
        Some((last, _)) => format!("Input should be {}", last),
        None => "Input should be empty".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!(NucleicAcidType::parse("cDNA"), Some(NucleicAcidType::CDna));
        assert_eq!(NucleicAcidType::parse("dna"), None);
        assert_eq!(SequencingMethod::parse("ont"), Some(SequencingMethod::Ont));
        assert_eq!(SequencingMethod::parse("ONT"), None);
    }

    #[test]
    fn test_round_trip_through_display() {
        for method in SequencingMethod::all_variants() {
            assert_eq!(SequencingMethod::parse(&method.to_string()), Some(*method));
        }
        for value_type in ValueType::all_variants() {
            assert_eq!(value_type.as_str().parse::<ValueType>(), Ok(*value_type));
        }
    }

    #[test]
    fn test_error_lists_permitted_values() {
        let err = "nanopore".parse::<SequencingMethod>().unwrap_err();
        assert_eq!(err, "Input should be 'illumina', 'ont' or 'pacbio'");
    }

    #[test]
    fn test_value_type_columns() {
        assert_eq!(ValueType::Float.column(), "value_float");
        assert_eq!(ValueType::Text.column(), "value_text");
    }

    #[test]
    fn test_serde_uses_stored_spelling() {
        let json = serde_json::to_string(&NucleicAcidType::CDna).unwrap();
        assert_eq!(json, "\"cDNA\"");
        let back: NucleicAcidType = serde_json::from_str("\"RNA\"").unwrap();
        assert_eq!(back, NucleicAcidType::Rna);
    }
}
