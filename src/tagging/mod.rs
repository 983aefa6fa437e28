pub mod engine;
pub mod names;
pub mod rules;

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum TaggingError {
    #[error("Way {way_id} has unknown value {key}={value}")]
    UnknownValue {
        way_id: i64,
        key: String,
        value: String,
    },

    #[error("No way at index {way_idx}")]
    MissingWay { way_idx: usize },
}
