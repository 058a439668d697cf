//! Document descriptors
//!
//! Static description of each searchable document type: which properties map to
//! which backend fields, how they are searched, and how the document id is built.

pub mod definition;
pub mod field;
pub mod key;
pub mod primary_key;
pub mod registry;

pub use definition::{DocumentDefinition, DocumentDefinitionBuilder};
pub use field::{FieldCategory, FieldDescriptor, FieldType};
pub use key::{DocumentId, KeyValue};
pub use primary_key::{PrimaryKeyDescriptor, KEY_SEPARATOR};
pub use registry::{DescriptorRegistry, SearchDocument};
