// Pure primitives with no storage or transport dependencies.

pub mod inverse_relations;
pub mod value_codec;

pub use inverse_relations::{bidirectional_inverses_for, inverse_candidates_for, targets_include};
pub use value_codec::{encode_raw, FieldScalar};
