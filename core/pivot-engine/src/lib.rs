//! FILENAME: core/pivot-engine/src/lib.rs
//! Voucher pivot reporting subsystem.
//!
//! This crate turns voucher records plus two master-data collections into a
//! cross-tabulated `PivotResult`. It depends on `records` only for shared
//! types (Record, Dataset, date bucketing).
//!
//! Layers:
//! - `definition`: Serializable configuration (what the pivot IS)
//! - `rules` / `catalog`: Field naming knowledge and the field catalog
//! - `relationship` / `join`: Joins to master data and their lookup indexes
//! - `expand` / `accessor`: Working rows and field-path resolution
//! - `filter` / `grouping` / `aggregate` / `sort`: The pipeline stages
//! - `view`: The computed result (WHAT we display)
//! - `engine` / `session`: Recomputation and last-writer-wins publication

pub mod definition;
pub mod error;
pub mod rules;
pub mod catalog;
pub mod relationship;
pub mod join;
pub mod expand;
pub mod accessor;
pub mod filter;
pub mod grouping;
pub mod aggregate;
pub mod sort;
pub mod view;
pub mod engine;
pub mod session;

pub use definition::*;
pub use error::PivotError;
pub use rules::FieldRules;
pub use catalog::{FieldCatalog, FieldDescriptor, FieldKind};
pub use relationship::{
    default_join_precedence, involved_collections, JoinDefault, JoinTrigger, JoinType,
    Relationship, RelationshipResolver, RelationshipSet, ResolverSettings,
};
pub use join::JoinContext;
pub use expand::{expand_records, WorkingRecord};
pub use accessor::{FieldResolver, Resolution, ValueAccessor};
pub use filter::apply_filters;
pub use grouping::{decode_key, encode_key, KeyParts, TOTAL_KEY};
pub use aggregate::Accumulator;
pub use sort::{natural_cmp, settle_field_types, AxisFieldType};
pub use view::{PivotResult, ValueMap};
pub use engine::{recompute, recompute_cancellable, recompute_with_catalog, PivotCalculator};
pub use session::{PivotSession, Ticket};

pub use records::{Collection, Dataset, Granularity, Record, BLANK_LABEL};
