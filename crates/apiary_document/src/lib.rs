//! Wire-level document model for Apiary.
//!
//! These types mirror the JSON:API document structure as it arrives from the
//! transport layer. They are plain data: immutable per request and free of any
//! registry knowledge.
//!
//! - [`Document`] - Top-level payload (primary data plus included resources)
//! - [`Resource`] - A single wire entity
//! - [`Relationship`] - A named link carrying linkage and/or navigation links
//! - [`ResourceIdentifier`] - A `type`/`id` pair
//! - [`Data`] - Three-state primary data / linkage (absent, null, one, many)
//!
//! # Example
//!
//! ```
//! use apiary_document::{Data, Document};
//!
//! let document: Document = serde_json::from_str(
//!     r#"{
//!         "data": {
//!             "type": "posts",
//!             "id": "1",
//!             "relationships": { "author": { "data": { "type": "users", "id": "9" } } }
//!         },
//!         "included": [{ "type": "users", "id": "9", "attributes": { "name": "Ann" } }]
//!     }"#,
//! )
//! .unwrap();
//!
//! assert!(matches!(document.data, Data::One(_)));
//! assert_eq!(document.included_resources().len(), 1);
//! ```

mod data;
mod document;
mod resource;

pub use data::Data;
pub use document::Document;
pub use resource::{Relationship, Resource, ResourceIdentifier, uid};
