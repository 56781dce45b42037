//! Domain expert tallies from free-text expertise codes.
//!
//! Experts enter space-separated codes (`"gesi ict"`). Each known code counts
//! once towards its category; unknown codes are dropped. The output always
//! lists the complete taxonomy of the maturity level, in taxonomy order.

use std::collections::HashMap;

use tracing::trace;

use toolscope_shared::{CategoryTally, Maturity, RawRecord, contract};

use crate::identity::field_text;

/// Tally domain expert submissions per category.
pub fn decode(records: &[RawRecord], maturity: Maturity) -> Vec<CategoryTally> {
    let field = contract::expertise_field(maturity);
    let mut counts: HashMap<&'static str, usize> = HashMap::new();

    for record in records {
        let Some(text) = field_text(record, field) else {
            continue;
        };
        for code in text.to_lowercase().split_whitespace() {
            match contract::expertise_category(maturity, code) {
                Some(category) => *counts.entry(category).or_default() += 1,
                None => trace!(code, %maturity, "unknown expertise code"),
            }
        }
    }

    contract::expertise_categories(maturity)
        .iter()
        .map(|category| {
            let count = counts.get(category).copied().unwrap_or(0);
            CategoryTally {
                category: (*category).to_string(),
                submitted: count > 0,
                count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expert(field: &str, codes: &str) -> RawRecord {
        let mut record = RawRecord::new();
        record.insert("tool_id".into(), "T-1".into());
        record.insert(field.into(), codes.into());
        record
    }

    fn tally<'a>(tallies: &'a [CategoryTally], category: &str) -> &'a CategoryTally {
        tallies
            .iter()
            .find(|t| t.category == category)
            .unwrap_or_else(|| panic!("missing category {category}"))
    }

    #[test]
    fn codes_map_to_categories() {
        let records = vec![expert(contract::EARLY_EXPERTISE_FIELD, "gesi ict")];
        let tallies = decode(&records, Maturity::Early);

        assert_eq!(tallies.len(), contract::EARLY_CATEGORIES.len());
        let gesi = tally(&tallies, "Gender Equality and Social Inclusion");
        assert!(gesi.submitted);
        assert_eq!(gesi.count, 1);
        let ict = tally(&tallies, "ICT");
        assert!(ict.submitted);
        assert_eq!(ict.count, 1);

        for other in tallies
            .iter()
            .filter(|t| t.category != "ICT" && t.category != "Gender Equality and Social Inclusion")
        {
            assert!(!other.submitted);
            assert_eq!(other.count, 0);
        }
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        let records = vec![
            expert(contract::EARLY_EXPERTISE_FIELD, "  GESI\tIct  "),
            expert(contract::EARLY_EXPERTISE_FIELD, "ict unknown"),
        ];
        let tallies = decode(&records, Maturity::Early);
        assert_eq!(tally(&tallies, "ICT").count, 2);
        assert_eq!(tally(&tallies, "Gender Equality and Social Inclusion").count, 1);
    }

    #[test]
    fn field_and_dictionary_follow_maturity() {
        let records = vec![
            expert(contract::ADVANCED_EXPERTISE_FIELD, "econ reg"),
            expert(contract::EARLY_EXPERTISE_FIELD, "ict"),
        ];
        let tallies = decode(&records, Maturity::Advanced);

        assert_eq!(tallies.len(), contract::ADVANCED_CATEGORIES.len());
        assert_eq!(tally(&tallies, "Health Economics").count, 1);
        assert_eq!(tally(&tallies, "Regulatory Affairs").count, 1);
        assert_eq!(tally(&tallies, "ICT").count, 0);
    }

    #[test]
    fn no_records_gives_full_empty_taxonomy() {
        let tallies = decode(&[], Maturity::Early);
        let names: Vec<_> = tallies.iter().map(|t| t.category.as_str()).collect();
        assert_eq!(names, contract::EARLY_CATEGORIES);
        assert!(tallies.iter().all(|t| !t.submitted && t.count == 0));
    }
}
