#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # Submission Transfer

 Moves form submission records between a four-table relational layout (one parent table
 plus `fields`, `actions` and `errors` child tables) and a portable CSV file, so records
 can be carried from one deployment to another.

 ## Core Concepts

- **Record:** one parent row of scalar columns plus its three child collections.
- **Encoded cell:** a child collection flattened into a single CSV cell, `base64:` followed by
  the base64 of its JSON array.
- **RecordStore:** the storage collaborator. It assembles aggregated rows for export and
  runs one transaction per imported record.
- **Step:** drives an `ItemReader` through an `ItemProcessor` into an `ItemWriter`, one item at
  a time, and reports failures by position.

 ## Features

| **Feature**   | **Description**                                               |
|---------------|---------------------------------------------------------------|
| rdbc-sqlite   | Enables `SqliteRecordStore`, a `RecordStore` over a SQLite pool |
| full          | Enables all available features                                |

 ## Getting Started

```rust
# use submission_transfer::{
#     error::TransferError,
#     item::rdbc::InMemoryRecordStore,
#     transfer::{RecordExporterBuilder, RecordImporterBuilder},
# };
fn main() -> Result<(), TransferError> {
    let csv = "\u{feff}id,form_id,user_id,from_content_id,from_content_type,status,ip_address,\
user_agent,referrer,submit_type,is_viewed,created_at,updated_at,fields,actions,errors
7,3,1,,,success,127.0.0.1,,,,0,2024-01-02 10:00:00,,\"[{\"\"field_name\"\":\"\"email\"\"}]\",,";

    let source = InMemoryRecordStore::new();
    let importer = RecordImporterBuilder::new(&source).build();

    let report = importer.import_csv(csv.as_bytes())?;
    assert!(report.is_complete_success());

    let exporter = RecordExporterBuilder::new(&source).build();
    let bytes = exporter.export_to_vec(&[3])?;

    let destination = InMemoryRecordStore::new();
    let report = RecordImporterBuilder::new(&destination)
        .build()
        .import_csv(bytes.as_slice())?;

    assert_eq!(report.record_ids, vec![1]);
    assert_eq!(destination.parents()[0].scalars, source.parents()[0].scalars);

    Ok(())
}
```

 ## License
 Licensed under either of

 -   Apache License, Version 2.0
     ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
 -   MIT license
     ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)

 at your option.
 */

/// Core module for step execution
pub mod core;

/// Error types for transfer operations
pub mod error;

#[doc(inline)]
pub use error::*;

/// Set of item readers / writers and record stores
pub mod item;

/// Records, their encoded form and the transformations between the two
pub mod record;

/// Import, export and preview
pub mod transfer;
