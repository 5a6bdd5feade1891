//! Numeric-only fallback encoding
//!
//! Categorical text is folded into one of [`CATEGORY_BUCKETS`] integer
//! buckets with a process-seeded hash. Buckets are stable for the lifetime
//! of the process only, and distinct categories can collide; the result is
//! an approximation of the typed input, not a faithful categorical code.

use super::{FeatureEncoder, MISSING_CATEGORY};
use crate::models::{Cell, FeatureVector, PredictionRecord};
use crate::schema::FeatureSchema;
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::sync::OnceLock;
use tract_onnx::prelude::tract_ndarray::Array2;

/// Number of integer buckets categorical text is hashed into
pub const CATEGORY_BUCKETS: u64 = 1000;

static CATEGORY_HASHER: OnceLock<RandomState> = OnceLock::new();

/// Bucket for one category; the missing sentinel maps to 0
pub fn category_bucket(category: &str) -> u64 {
    if category == MISSING_CATEGORY {
        return 0;
    }
    let hasher = CATEGORY_HASHER.get_or_init(RandomState::new);
    hasher.hash_one(category) % CATEGORY_BUCKETS
}

/// Re-encodes records into a numeric matrix
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackEncoder;

impl FallbackEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Numeric row for an already-encoded vector, same order and length
    pub fn encode_vector(&self, vector: &FeatureVector) -> Vec<f32> {
        vector
            .iter()
            .map(|cell| match cell {
                Cell::Categorical(category) => category_bucket(category) as f32,
                Cell::Numeric(v) if v.is_nan() => 0.0,
                Cell::Numeric(v) => *v as f32,
                Cell::Missing => 0.0,
            })
            .collect()
    }

    /// Numeric row for a record
    pub fn encode_record(&self, record: &PredictionRecord, schema: &FeatureSchema) -> Vec<f32> {
        let encoded = FeatureEncoder::new().encode(record, schema);
        self.encode_vector(&encoded.vector)
    }

    /// Stack encoded vectors into one `rows x width` matrix
    pub fn encode_batch(&self, vectors: &[FeatureVector], width: usize) -> Array2<f32> {
        let mut matrix = Array2::<f32>::zeros((vectors.len(), width));
        for (mut row, vector) in matrix.rows_mut().into_iter().zip(vectors) {
            for (slot, value) in row.iter_mut().zip(self.encode_vector(vector)) {
                *slot = value;
            }
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::layout_names;
    use crate::models::fixtures::sample_record;
    use crate::schema::DEFAULT_CATEGORICAL_INDICES;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(
            layout_names().into_iter().map(String::from).collect(),
            DEFAULT_CATEGORICAL_INDICES,
            vec!["not_dropout".into(), "dropout".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_bucket_deterministic_and_bounded() {
        for category in ["M", "F", "O", "1", "12.5", "hostel"] {
            let first = category_bucket(category);
            assert_eq!(first, category_bucket(category));
            assert!(first < CATEGORY_BUCKETS);
        }
    }

    #[test]
    fn test_missing_sentinel_is_zero() {
        assert_eq!(category_bucket("nan"), 0);
    }

    #[test]
    fn test_encode_vector() {
        let vector = FeatureVector::new(vec![
            Cell::Numeric(20.0),
            Cell::Categorical("M".into()),
            Cell::Categorical("nan".into()),
            Cell::Missing,
            Cell::Numeric(f64::NAN),
        ]);
        let row = FallbackEncoder::new().encode_vector(&vector);
        assert_eq!(row.len(), 5);
        assert_eq!(row[0], 20.0);
        assert_eq!(row[1], category_bucket("M") as f32);
        assert_eq!(row[2], 0.0);
        assert_eq!(row[3], 0.0);
        assert_eq!(row[4], 0.0);
    }

    #[test]
    fn test_record_row_matches_schema_length() {
        let schema = schema();
        let row = FallbackEncoder::new().encode_record(&sample_record(), &schema);
        assert_eq!(row.len(), schema.len());
        assert!(row.iter().all(|v| v.is_finite()));
        // absent department (categorical) and commute distance (categorical)
        assert_eq!(row[5], 0.0);
        assert_eq!(row[11], 0.0);
    }

    #[test]
    fn test_batch_preserves_row_order() {
        let schema = schema();
        let encoder = FeatureEncoder::new();
        let mut older = sample_record();
        older.age = 45.0;
        let vectors = vec![
            encoder.encode(&sample_record(), &schema).vector,
            encoder.encode(&older, &schema).vector,
        ];

        let matrix = FallbackEncoder::new().encode_batch(&vectors, schema.len());
        assert_eq!(matrix.dim(), (2, 20));
        assert_eq!(matrix[[0, 0]], 20.0);
        assert_eq!(matrix[[1, 0]], 45.0);
    }
}
