//! # flowlab-datasets
//!
//! Test datasets for evaluating agent workflows.
//!
//! ## Core Concepts
//!
//! - **[`DataPoint`]**: One test case: an input plus an optional expected
//!   output and/or expected execution path
//! - **[`Dataset`]**: A named, ordered collection of data points
//! - **[`DatasetStore`]**: CRUD over datasets kept in a [`BlobStore`]
//! - **[`codec`]**: CSV and JSON import/export
//! - **[`TestCaseGenerator`]**: Synthesizes standard, edge and negative cases
//!
//! ## Example
//!
//! ```ignore
//! use flowlab_datasets::prelude::*;
//! use std::sync::Arc;
//!
//! let ids: Arc<dyn IdGenerator> = Arc::new(DefaultIdGenerator::new());
//! let store = DatasetStore::new(Arc::new(InMemoryBlobStore::new()), ids.clone(), "datasets");
//!
//! let imported = parse_csv("input,context\nhello,greeting\n", ids.as_ref());
//! let dataset = store
//!     .create("greetings", None, DatasetSource::Import)
//!     .with_data_points(imported.data_points);
//! store.save(dataset).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod dataset_store;
pub mod error;
pub mod generator;
pub mod identifier;
pub mod model;
pub mod store;

// Re-exports
pub use codec::{export_to_csv, export_to_json, parse_csv, parse_json, ImportFormat, ImportResult};
pub use dataset_store::DatasetStore;
pub use error::{DatasetError, DatasetResult};
pub use generator::{synthesize_trajectory, GeneratorOptions, TestCaseGenerator};
pub use identifier::{DefaultIdGenerator, IdGenerator, SequentialIdGenerator};
pub use model::{
    normalize_context, normalize_trajectory, DataPoint, DataPointMetadata, Dataset, DatasetSource,
    Record, ValidationReport,
};
pub use store::{read_json, write_json, BlobStore, FileBlobStore, InMemoryBlobStore, StoreKeys};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        export_to_csv, export_to_json, parse_csv, parse_json, BlobStore, DataPoint, Dataset,
        DatasetSource, DatasetStore, DefaultIdGenerator, GeneratorOptions, IdGenerator,
        ImportResult, InMemoryBlobStore, Record, TestCaseGenerator,
    };
}
