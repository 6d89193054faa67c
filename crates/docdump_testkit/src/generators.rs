//! Property-based test generators using proptest.
//!
//! Provides strategies for random collections, documents, and log
//! positions that maintain the invariants the engines rely on: distinct
//! identities within a batch and only values that compare equal to
//! themselves (no NaN doubles).

use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Document};
use docdump_core::layout::ID_FIELD;
use docdump_core::LogPosition;
use proptest::prelude::*;

/// Strategy for generating valid collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,31}").expect("Invalid regex")
}

/// Strategy for generating document field names. Never produces the
/// identity field, which batch generation assigns itself.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,11}").expect("Invalid regex")
}

/// Strategy for generating scalar values. Doubles are kept finite so
/// generated documents always compare equal to themselves.
pub fn scalar_strategy() -> impl Strategy<Value = Bson> {
    prop_oneof![
        any::<i32>().prop_map(Bson::Int32),
        any::<i64>().prop_map(Bson::Int64),
        (-1.0e12f64..1.0e12).prop_map(Bson::Double),
        any::<bool>().prop_map(Bson::Boolean),
        prop::string::string_regex("[ -~]{0,24}")
            .expect("Invalid regex")
            .prop_map(Bson::String),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(|bytes| {
            Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes,
            })
        }),
        Just(Bson::Null),
    ]
}

/// Strategy for generating values, nesting arrays and documents up to
/// three levels deep.
pub fn value_strategy() -> impl Strategy<Value = Bson> {
    scalar_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Bson::Array),
            prop::collection::btree_map(field_name_strategy(), inner, 0..4)
                .prop_map(|fields| Bson::Document(fields.into_iter().collect())),
        ]
    })
}

/// Strategy for generating a document body without an identity field.
pub fn document_strategy() -> impl Strategy<Value = Document> {
    prop::collection::btree_map(field_name_strategy(), value_strategy(), 0..5)
        .prop_map(|fields| fields.into_iter().collect())
}

/// Strategy for generating a batch of documents with distinct integer
/// identities.
pub fn document_batch_strategy(max: usize) -> impl Strategy<Value = Vec<Document>> {
    prop::collection::btree_map(any::<i64>(), document_strategy(), 0..=max).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(id, fields)| {
                let mut document = Document::new();
                document.insert(ID_FIELD, id);
                for (key, value) in fields {
                    document.insert(key, value);
                }
                document
            })
            .collect()
    })
}

/// Strategy for generating replication-log positions.
pub fn log_position_strategy() -> impl Strategy<Value = LogPosition> {
    (any::<u32>(), any::<u32>()).prop_map(|(seconds, sequence)| LogPosition::new(seconds, sequence))
}
