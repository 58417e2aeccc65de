//! # StrataDB
//!
//! A schema-typed, single-node keystore database written in Rust.
//!
//! Each table maps string keys to tuples validated against a per-table
//! schema. Queries are JSON-shaped: inserts map column names to values,
//! updates map dotted paths (with optional `*method` tokens) to values or
//! operands, and gets return presentation values. Tables can live fully in
//! memory, persist into line-addressed partition files, or keep only
//! locators resident and reread tuples on access.
//!
//! ## Quick Start
//!
//! ```
//! use serde_json::json;
//! use strata_core::keystore::Keystore;
//! use strata_core::schema::{IntWidth, ItemType, Schema, StringOpts, UintOpts};
//! use strata_core::types::KeystoreConfig;
//!
//! let schema = Schema::new([
//!     ("email", ItemType::String(StringOpts {
//!         required: true,
//!         unique: true,
//!         ..Default::default()
//!     })),
//!     ("mmr", ItemType::Uint {
//!         width: IntWidth::W16,
//!         opts: UintOpts { default: 1500, min: 1100, max: 2250, ..Default::default() },
//!     }),
//! ]).unwrap();
//!
//! let users = Keystore::create(schema, KeystoreConfig::mem_only("users")).unwrap();
//! users.insert("alice", &json!({"email": "alice@example.com", "mmr": 1674})).unwrap();
//!
//! // Arithmetic methods read the stored value and apply operands in order.
//! users.update_data("alice", &json!({"mmr.*add": [26]})).unwrap();
//!
//! let data = users.get_data("alice", Some(&json!({"mmr.*gte": [1700]}))).unwrap();
//! assert_eq!(data["mmr.*gte"], json!(true));
//! ```

pub mod encoding;
pub mod error;
pub mod keystore;
pub mod schema;
pub mod storage;
pub mod types;
