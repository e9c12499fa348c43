// src/metadata/infer.rs

//! Type inference for `add_columns` when a caller supplies sample values
//! instead of an explicit type name.

use crate::metadata::model::DataType;
use crate::value::Value;

/// Infer a single column's type from a set of sampled values using the
/// hierarchy `timestamp > real > integer > text` with majority voting:
/// if any type accounts for more than half of the non-null samples, it
/// wins; otherwise the most specific type that appears at all wins. Null
/// samples (`None`) are ignored. An empty or all-null sample set defaults
/// to `text`.
pub fn infer_column_type(samples: &[Option<Value>]) -> DataType {
    const HIERARCHY: [DataType; 4] = [
        DataType::Timestamp,
        DataType::Real,
        DataType::Integer,
        DataType::Text,
    ];

    let non_null: Vec<&Value> = samples.iter().filter_map(|s| s.as_ref()).collect();
    if non_null.is_empty() {
        return DataType::Text;
    }

    let mut counts = [0usize; 4];
    for value in &non_null {
        match value.inferred_type() {
            DataType::Timestamp => counts[0] += 1,
            DataType::Real => counts[1] += 1,
            DataType::Integer => counts[2] += 1,
            DataType::Text => counts[3] += 1,
        }
    }

    let total = non_null.len();
    for (idx, data_type) in HIERARCHY.iter().enumerate() {
        if counts[idx] * 2 > total {
            return *data_type;
        }
    }
    for (idx, data_type) in HIERARCHY.iter().enumerate() {
        if counts[idx] > 0 {
            return *data_type;
        }
    }
    DataType::Text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_samples_default_to_text() {
        assert_eq!(infer_column_type(&[]), DataType::Text);
        assert_eq!(infer_column_type(&[None, None]), DataType::Text);
    }

    #[test]
    fn single_type_samples_pick_that_type() {
        let samples = vec![
            Some(Value::Integer(1)),
            Some(Value::Integer(2)),
            Some(Value::Integer(3)),
        ];
        assert_eq!(infer_column_type(&samples), DataType::Integer);
    }

    #[test]
    fn majority_vote_picks_the_more_specific_type() {
        let samples = vec![
            Some(Value::Real(1.5)),
            Some(Value::Real(2.5)),
            Some(Value::Integer(1)),
        ];
        assert_eq!(infer_column_type(&samples), DataType::Real);
    }

    #[test]
    fn no_majority_falls_back_to_most_specific_present() {
        let samples = vec![
            Some(Value::Text("a".into())),
            Some(Value::Integer(1)),
            Some(Value::Real(1.5)),
        ];
        assert_eq!(infer_column_type(&samples), DataType::Real);
    }

    #[test]
    fn null_samples_are_ignored() {
        let samples = vec![None, Some(Value::Text("x".into())), None];
        assert_eq!(infer_column_type(&samples), DataType::Text);
    }
}
