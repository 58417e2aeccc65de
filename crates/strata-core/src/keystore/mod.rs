//! Keystore tables: the CRUD coordinator.
//!
//! A [`Keystore`] owns its entry map, uniqueness index, and partition-file
//! cursor. Every write follows the same shape: run the filter engine over the
//! query, take the table locks (entries before unique, always in that
//! order), verify unique candidates, persist, then commit. Either the tuple,
//! the unique set, and the persisted line advance together or none does.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::{Map as JsonMap, Value as Json};
use tracing::info;

use crate::encoding::{decode_record, encode_record};
use crate::error::{Error, ItemError, Result, TableError, UniqueError};
use crate::schema::filter::{FilterCtx, FilterMode, UniqueBatch, filter_item};
use crate::schema::methods::parse_item_path;
use crate::schema::value::Value;
use crate::schema::{Schema, collect_unique_values};
use crate::storage::PartitionStore;
use crate::types::{
    DEFAULT_ENCRYPTION_COST, DEFAULT_PARTITION_MAX, FileIndex, KeystoreConfig, LineIndex,
};

/// A live entry: its persistence slot and (unless the table is
/// data-on-drive) its resident storage tuple.
#[derive(Debug)]
pub struct KeystoreEntry {
    persist_file: FileIndex,
    persist_line: LineIndex,
    data: Mutex<Option<Vec<Value>>>,
}

impl KeystoreEntry {
    pub fn persist_file(&self) -> FileIndex {
        self.persist_file
    }

    pub fn persist_line(&self) -> LineIndex {
        self.persist_line
    }
}

#[derive(Debug)]
struct EntryTable {
    map: HashMap<String, Arc<KeystoreEntry>>,
    /// Partition file receiving the next insert. Guarded by the entries
    /// mutex together with the map.
    file_on: FileIndex,
}

/// A schema-typed keystore table.
#[derive(Debug)]
pub struct Keystore {
    name: String,
    schema: Schema,
    mem_only: bool,
    data_on_drive: bool,
    ecost: u32,
    max_entries: AtomicU64,
    partition_max: AtomicU16,
    entries: Mutex<EntryTable>,
    unique: Mutex<HashMap<String, HashSet<Value>>>,
    store: Option<PartitionStore>,
}

impl Keystore {
    /// Create a fresh table. Fails if the data directory already holds
    /// partition files.
    pub fn create(schema: Schema, config: KeystoreConfig) -> Result<Keystore> {
        let ks = Keystore::build(schema, config, false)?;
        info!(table = %ks.name, mem_only = ks.mem_only, data_on_drive = ks.data_on_drive, "created keystore table");
        Ok(ks)
    }

    /// Open an existing table, replaying its partition files through the
    /// restore path.
    pub fn open(schema: Schema, config: KeystoreConfig) -> Result<Keystore> {
        let mut ks = Keystore::build(schema, config, true)?;
        ks.replay()?;
        Ok(ks)
    }

    fn build(schema: Schema, config: KeystoreConfig, opening: bool) -> Result<Keystore> {
        if config.name.is_empty() {
            return Err(TableError::NameRequired.into());
        }
        if config.mem_only && config.data_on_drive {
            return Err(TableError::InvalidConfig(
                "mem_only and data_on_drive are mutually exclusive".into(),
            )
            .into());
        }
        if opening && config.mem_only {
            return Err(TableError::InvalidConfig("cannot open a mem_only table".into()).into());
        }
        let ecost = if config.encryption_cost == 0 {
            DEFAULT_ENCRYPTION_COST
        } else {
            config.encryption_cost
        };
        if !(4..=31).contains(&ecost) {
            return Err(TableError::InvalidConfig("encryption cost must be in 4..=31".into()).into());
        }
        let partition_max = if config.partition_max == 0 {
            DEFAULT_PARTITION_MAX
        } else {
            config.partition_max
        };

        let store = if config.mem_only {
            None
        } else {
            let dir = config.dir.join(&config.name);
            if opening && !dir.is_dir() {
                return Err(TableError::DoesntExist(config.name).into());
            }
            let store = PartitionStore::open(dir)?;
            if !opening && !store.partition_files()?.is_empty() {
                return Err(TableError::Exists(config.name).into());
            }
            Some(store)
        };

        Ok(Keystore {
            name: config.name,
            schema,
            mem_only: config.mem_only,
            data_on_drive: config.data_on_drive,
            ecost,
            max_entries: AtomicU64::new(config.max_entries),
            partition_max: AtomicU16::new(partition_max),
            entries: Mutex::new(EntryTable {
                map: HashMap::new(),
                file_on: 0,
            }),
            unique: Mutex::new(HashMap::new()),
            store,
        })
    }

    /// Replay every persisted line into a fresh in-memory state and resume
    /// the partition cursor after the last file.
    fn replay(&mut self) -> Result<()> {
        let files = match &self.store {
            Some(store) => store.partition_files()?,
            None => return Ok(()),
        };
        let mut restored = 0usize;
        for &file in &files {
            let lines = match &self.store {
                Some(store) => store.read_lines(file)?,
                None => break,
            };
            for (i, bytes) in lines.into_iter().enumerate() {
                if bytes.is_empty() {
                    continue; // tombstone
                }
                let (key, data) = decode_record(&bytes)?;
                self.restore(&key, data, file, (i + 1) as LineIndex)?;
                restored += 1;
            }
        }
        if let Some(&last) = files.last() {
            let full = match &self.store {
                Some(store) => store.line_count(last)? >= self.partition_max.load(Ordering::Relaxed),
                None => false,
            };
            let table = self.entries.get_mut();
            table.file_on = if full { last + 1 } else { last };
        }
        info!(table = %self.name, entries = restored, "restored keystore table");
        Ok(())
    }

    /// Insert a new entry. The query object maps column names to values;
    /// missing columns take their defaults, unknown keys are ignored.
    pub fn insert(&self, key: &str, obj: &Json) -> Result<()> {
        if key.is_empty() {
            return Err(TableError::KeyRequired.into());
        }
        let Json::Object(fields) = obj else {
            return Err(ItemError::QueryInvalidFormat.into());
        };

        let mut batch = UniqueBatch::new();
        let mut tuple = vec![Value::Null; self.schema.len()];
        {
            let mut ctx = FilterCtx::new(FilterMode::Insert, self.ecost, Some(&mut batch));
            for item in self.schema.items() {
                let input = fields
                    .get(item.name())
                    .map(Value::from_json)
                    .unwrap_or(Value::Null);
                ctx.push_path(item.name());
                let res = filter_item(input, &[], item, None, &mut ctx);
                ctx.pop_path();
                tuple[item.data_index()] = res?;
            }
        }

        let bytes = if self.mem_only {
            Vec::new()
        } else {
            encode_record(key, &tuple)?
        };

        let mut table = self.entries.lock();
        if table.map.contains_key(key) {
            return Err(TableError::KeyInUse(key.to_string()).into());
        }
        let max = self.max_entries.load(Ordering::Relaxed);
        if max > 0 && table.map.len() as u64 >= max {
            return Err(TableError::Full.into());
        }

        let new_vals = collect_unique_values(&self.schema, &tuple);
        let mut file = 0;
        let mut line = 0;
        {
            let mut unique = self.unique.lock();
            check_unique(&unique, &[], &new_vals)?;
            if let Some(store) = &self.store {
                file = table.file_on;
                line = store.insert(file, &bytes)?;
            }
            // Candidates only become live once the line is written.
            apply_unique(&mut unique, &[], &new_vals);
        }

        if self.store.is_some() && line >= self.partition_max.load(Ordering::Relaxed) {
            table.file_on += 1;
        }
        let entry = KeystoreEntry {
            persist_file: file,
            persist_line: line,
            data: Mutex::new((!self.data_on_drive).then_some(tuple)),
        };
        table.map.insert(key.to_string(), Arc::new(entry));
        Ok(())
    }

    /// Resolve a key to its entry handle.
    pub fn get(&self, key: &str) -> Result<Arc<KeystoreEntry>> {
        if key.is_empty() {
            return Err(TableError::KeyRequired.into());
        }
        self.entries
            .lock()
            .map
            .get(key)
            .cloned()
            .ok_or_else(|| TableError::KeyNotFound(key.to_string()).into())
    }

    /// Read entry data in presentation form.
    ///
    /// `items` selects what to return: `None` for every column, a JSON array
    /// of column paths, or a JSON object mapping paths to method operands
    /// (e.g. `{"mmr.*gt": [1500]}`). Results are keyed by the requested path.
    pub fn get_data(&self, key: &str, items: Option<&Json>) -> Result<JsonMap<String, Json>> {
        let entry = self.get(key)?;
        let data = self.read_tuple(&entry)?;

        let mut ctx = FilterCtx::new(FilterMode::Get, self.ecost, None);
        let mut out = JsonMap::new();
        match items {
            None => {
                for item in self.schema.items() {
                    let v = filter_item(
                        Value::Null,
                        &[],
                        item,
                        Some(&data[item.data_index()]),
                        &mut ctx,
                    )?;
                    out.insert(item.name().to_string(), v.to_json());
                }
            }
            Some(Json::Array(paths)) => {
                for p in paths {
                    let Some(path) = p.as_str() else {
                        return Err(ItemError::QueryInvalidFormat.into());
                    };
                    self.get_one(&mut ctx, &data, path, Value::Null, &mut out)?;
                }
            }
            Some(Json::Object(queries)) => {
                for (path, params) in queries {
                    self.get_one(&mut ctx, &data, path, Value::from_json(params), &mut out)?;
                }
            }
            Some(_) => return Err(ItemError::QueryInvalidFormat.into()),
        }
        Ok(out)
    }

    fn get_one(
        &self,
        ctx: &mut FilterCtx,
        data: &[Value],
        path: &str,
        params: Value,
        out: &mut JsonMap<String, Json>,
    ) -> Result<()> {
        let (name, methods) = parse_item_path(path)?;
        let Some(item) = self.schema.get(&name) else {
            return Err(ItemError::InvalidItem(name).into());
        };
        let v = filter_item(params, &methods, item, Some(&data[item.data_index()]), ctx)?;
        out.insert(path.to_string(), v.to_json());
        Ok(())
    }

    /// Apply a patch of `path -> value` pairs to an entry.
    ///
    /// Paths navigate nested containers and may end in method tokens; plain
    /// paths assign the filtered value. The patch runs against a copy of the
    /// tuple, so a failure on any field leaves the entry untouched.
    pub fn update_data(&self, key: &str, updates: &Json) -> Result<()> {
        let Json::Object(fields) = updates else {
            return Err(ItemError::QueryInvalidFormat.into());
        };
        if fields.is_empty() {
            return Err(ItemError::QueryInvalidFormat.into());
        }
        let entry = self.get(key)?;

        // Data-on-drive tuples are reread before the entry lock; resident
        // tuples copy under it.
        let mut data;
        let mut guard;
        if self.data_on_drive {
            data = self.read_tuple(&entry)?;
            guard = entry.data.lock();
        } else {
            guard = entry.data.lock();
            data = resident(&guard)?;
        }
        let old = data.clone();

        let mut batch = UniqueBatch::new();
        {
            let mut ctx = FilterCtx::new(FilterMode::Update, self.ecost, Some(&mut batch));
            for (path, value) in fields {
                let (name, methods) = parse_item_path(path)?;
                let Some(item) = self.schema.get(&name) else {
                    return Err(ItemError::SchemaInvalid(format!("unknown column '{name}'")).into());
                };
                ctx.push_path(item.name());
                let res = filter_item(
                    Value::from_json(value),
                    &methods,
                    item,
                    Some(&data[item.data_index()]),
                    &mut ctx,
                );
                ctx.pop_path();
                data[item.data_index()] = res?;
            }
        }

        let bytes = if self.mem_only {
            Vec::new()
        } else {
            encode_record(key, &data)?
        };

        {
            let mut unique = self.unique.lock();
            let old_vals = collect_unique_values(&self.schema, &old);
            let new_vals = collect_unique_values(&self.schema, &data);
            check_unique(&unique, &old_vals, &new_vals)?;
            if let Some(store) = &self.store {
                store.update(entry.persist_file, entry.persist_line, &bytes)?;
            }
            // Replace the pre-image atomically under the unique lock.
            apply_unique(&mut unique, &old_vals, &new_vals);
        }

        if !self.data_on_drive {
            *guard = Some(data);
        }
        Ok(())
    }

    /// Delete an entry: drop its unique values, tombstone its line, and
    /// remove it from the map.
    pub fn delete_key(&self, key: &str) -> Result<()> {
        let entry = self.get(key)?;

        let data;
        let guard;
        if self.data_on_drive {
            data = self.read_tuple(&entry)?;
            guard = entry.data.lock();
        } else {
            guard = entry.data.lock();
            data = resident(&guard)?;
        }
        if self.schema.has_unique() {
            let mut unique = self.unique.lock();
            let old_vals = collect_unique_values(&self.schema, &data);
            apply_unique(&mut unique, &old_vals, &[]);
        }
        drop(guard);

        if let Some(store) = &self.store {
            store.update(entry.persist_file, entry.persist_line, &[])?;
        }
        self.entries.lock().map.remove(key);
        Ok(())
    }

    /// Replay one persisted entry at its original `(file, line)` slot.
    ///
    /// Not concurrency-safe: takes `&mut self` because recovery is
    /// single-threaded and bypasses the table locks.
    pub fn restore(
        &mut self,
        key: &str,
        data: Vec<Json>,
        file: FileIndex,
        line: LineIndex,
    ) -> Result<()> {
        if key.is_empty() {
            return Err(TableError::KeyRequired.into());
        }
        if data.len() < self.schema.len() {
            return Err(ItemError::RestoreItemSchema.into());
        }

        let mut batch = UniqueBatch::new();
        let mut tuple = vec![Value::Null; self.schema.len()];
        {
            let mut ctx = FilterCtx::new(FilterMode::Restore, self.ecost, Some(&mut batch));
            for item in self.schema.items() {
                ctx.push_path(item.name());
                let res = filter_item(
                    Value::from_json(&data[item.data_index()]),
                    &[],
                    item,
                    None,
                    &mut ctx,
                );
                ctx.pop_path();
                tuple[item.data_index()] = res?;
            }
        }

        let table = self.entries.get_mut();
        if table.map.contains_key(key) {
            return Err(TableError::KeyInUse(key.to_string()).into());
        }
        let unique = self.unique.get_mut();
        let new_vals = collect_unique_values(&self.schema, &tuple);
        check_unique(unique, &[], &new_vals)?;
        apply_unique(unique, &[], &new_vals);

        let entry = KeystoreEntry {
            persist_file: file,
            persist_line: line,
            data: Mutex::new((!self.data_on_drive).then_some(tuple)),
        };
        table.map.insert(key.to_string(), Arc::new(entry));
        Ok(())
    }

    /// The entry's current tuple: a resident copy, or a reread through the
    /// restore filter for data-on-drive tables.
    fn read_tuple(&self, entry: &KeystoreEntry) -> Result<Vec<Value>> {
        if self.data_on_drive
            && let Some(store) = &self.store
        {
            let bytes = store.read(entry.persist_file, entry.persist_line)?;
            let (_, data) = decode_record(&bytes)?;
            if data.len() < self.schema.len() {
                return Err(ItemError::RestoreItemSchema.into());
            }
            let mut ctx = FilterCtx::new(FilterMode::Restore, self.ecost, None);
            let mut tuple = vec![Value::Null; self.schema.len()];
            for item in self.schema.items() {
                tuple[item.data_index()] = filter_item(
                    Value::from_json(&data[item.data_index()]),
                    &[],
                    item,
                    None,
                    &mut ctx,
                )?;
            }
            return Ok(tuple);
        }
        resident(&entry.data.lock())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.lock().map.contains_key(key)
    }

    /// Adjust the entry cap without taking the entries lock. 0 = unlimited.
    pub fn set_max_entries(&self, max: u64) {
        self.max_entries.store(max, Ordering::Relaxed);
    }

    pub fn max_entries(&self) -> u64 {
        self.max_entries.load(Ordering::Relaxed)
    }

    /// Adjust the lines-per-partition cap without taking the entries lock.
    pub fn set_partition_max(&self, max: u16) {
        let max = if max == 0 { DEFAULT_PARTITION_MAX } else { max };
        self.partition_max.store(max, Ordering::Relaxed);
    }

    pub fn partition_max(&self) -> u16 {
        self.partition_max.load(Ordering::Relaxed)
    }
}

fn resident(guard: &Option<Vec<Value>>) -> Result<Vec<Value>> {
    guard
        .clone()
        .ok_or_else(|| Error::Unexpected("resident table entry has no tuple".into()))
}

/// Verify that no new unique value collides within the batch or with a live
/// value outside this entry's own pre-image.
fn check_unique(
    live: &HashMap<String, HashSet<Value>>,
    old: &[(String, Value)],
    new: &[(String, Value)],
) -> Result<()> {
    let mut batch: HashSet<(&str, &Value)> = HashSet::new();
    for (col, v) in new {
        if !batch.insert((col.as_str(), v)) {
            return Err(UniqueError::ValueDuplicate {
                column: col.clone(),
            }
            .into());
        }
    }
    let pre: HashSet<(&str, &Value)> = old.iter().map(|(c, v)| (c.as_str(), v)).collect();
    for (col, v) in new {
        if pre.contains(&(col.as_str(), v)) {
            continue;
        }
        if live.get(col).is_some_and(|set| set.contains(v)) {
            return Err(UniqueError::ValueInUse {
                column: col.clone(),
            }
            .into());
        }
    }
    Ok(())
}

/// Commit `live = live - old + new`.
fn apply_unique(
    live: &mut HashMap<String, HashSet<Value>>,
    old: &[(String, Value)],
    new: &[(String, Value)],
) {
    for (col, v) in old {
        if let Some(set) = live.get_mut(col) {
            set.remove(v);
        }
    }
    for (col, v) in new {
        live.entry(col.clone()).or_default().insert(v.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IntWidth, ItemType, StringOpts, UintOpts};
    use serde_json::json;

    fn user_schema() -> Schema {
        Schema::new([
            (
                "email",
                ItemType::String(StringOpts {
                    required: true,
                    unique: true,
                    ..Default::default()
                }),
            ),
            (
                "mmr",
                ItemType::Uint {
                    width: IntWidth::W16,
                    opts: UintOpts {
                        default: 1500,
                        min: 1100,
                        max: 2250,
                        ..Default::default()
                    },
                },
            ),
            (
                "vCode",
                ItemType::String(StringOpts {
                    required: true,
                    ..Default::default()
                }),
            ),
        ])
        .unwrap()
    }

    fn mem_table() -> Keystore {
        Keystore::create(user_schema(), KeystoreConfig::mem_only("users")).unwrap()
    }

    #[test]
    fn test_insert_get_roundtrip_with_defaults() {
        let ks = mem_table();
        ks.insert("u1", &json!({"email": "a@x", "mmr": 1674, "vCode": "06AJ3T9"}))
            .unwrap();

        let data = ks.get_data("u1", None).unwrap();
        assert_eq!(data["email"], json!("a@x"));
        assert_eq!(data["mmr"], json!(1674));
        assert_eq!(data["vCode"], json!("06AJ3T9"));

        // Second get is identical (get has no side effects).
        assert_eq!(ks.get_data("u1", None).unwrap(), data);

        // Missing mmr takes the default; out-of-range clamps.
        ks.insert("u2", &json!({"email": "b@x", "vCode": "B"})).unwrap();
        assert_eq!(ks.get_data("u2", None).unwrap()["mmr"], json!(1500));
        ks.insert("u3", &json!({"email": "c@x", "mmr": 3000, "vCode": "C"}))
            .unwrap();
        assert_eq!(ks.get_data("u3", None).unwrap()["mmr"], json!(2250));
    }

    #[test]
    fn test_key_errors() {
        let ks = mem_table();
        ks.insert("u1", &json!({"email": "a@x", "vCode": "V"})).unwrap();

        assert!(matches!(
            ks.insert("u1", &json!({"email": "z@x", "vCode": "V"}))
                .unwrap_err(),
            Error::Table(TableError::KeyInUse(_))
        ));
        assert!(matches!(
            ks.insert("", &json!({"email": "z@x", "vCode": "V"})).unwrap_err(),
            Error::Table(TableError::KeyRequired)
        ));
        assert!(matches!(
            ks.get_data("ghost", None).unwrap_err(),
            Error::Table(TableError::KeyNotFound(_))
        ));
        assert!(matches!(
            ks.insert("u2", &json!(["not", "an", "object"])).unwrap_err(),
            Error::Item(ItemError::QueryInvalidFormat)
        ));
    }

    #[test]
    fn test_table_full() {
        let ks = mem_table();
        ks.set_max_entries(1);
        ks.insert("u1", &json!({"email": "a@x", "vCode": "V"})).unwrap();
        assert!(matches!(
            ks.insert("u2", &json!({"email": "b@x", "vCode": "V"}))
                .unwrap_err(),
            Error::Table(TableError::Full)
        ));
        ks.set_max_entries(0);
        ks.insert("u2", &json!({"email": "b@x", "vCode": "V"})).unwrap();
    }

    #[test]
    fn test_unique_value_in_use_and_released_on_delete() {
        let ks = mem_table();
        ks.insert("u1", &json!({"email": "a@x", "vCode": "V"})).unwrap();

        assert!(matches!(
            ks.insert("u2", &json!({"email": "a@x", "vCode": "V"}))
                .unwrap_err(),
            Error::Unique(UniqueError::ValueInUse { .. })
        ));

        ks.delete_key("u1").unwrap();
        assert!(!ks.contains_key("u1"));
        // The value is free again.
        ks.insert("u2", &json!({"email": "a@x", "vCode": "V"})).unwrap();
    }

    #[test]
    fn test_update_replaces_unique_value_atomically() {
        let ks = mem_table();
        ks.insert("u1", &json!({"email": "a@x", "vCode": "V"})).unwrap();
        ks.insert("u2", &json!({"email": "b@x", "vCode": "V"})).unwrap();

        // u2 cannot take u1's value...
        assert!(matches!(
            ks.update_data("u2", &json!({"email": "a@x"})).unwrap_err(),
            Error::Unique(UniqueError::ValueInUse { .. })
        ));
        // ...but a no-op rewrite of its own value is fine.
        ks.update_data("u2", &json!({"email": "b@x"})).unwrap();

        // Overwriting frees the old value for someone else.
        ks.update_data("u1", &json!({"email": "new@x"})).unwrap();
        ks.insert("u3", &json!({"email": "a@x", "vCode": "V"})).unwrap();
    }

    #[test]
    fn test_update_failure_leaves_entry_untouched() {
        let ks = mem_table();
        ks.insert("u1", &json!({"email": "a@x", "mmr": 1600, "vCode": "V"}))
            .unwrap();

        // "mmr" filters first (sorted key order), then "vCode" fails; the
        // already-filtered change must not stick.
        let err = ks
            .update_data("u1", &json!({"mmr": 2000, "vCode": 42}))
            .unwrap_err();
        assert!(matches!(err, Error::Item(ItemError::InvalidItemValue)));
        assert_eq!(ks.get_data("u1", None).unwrap()["mmr"], json!(1600));

        assert!(matches!(
            ks.update_data("u1", &json!({})).unwrap_err(),
            Error::Item(ItemError::QueryInvalidFormat)
        ));
        assert!(matches!(
            ks.update_data("u1", &json!({"ghost": 1})).unwrap_err(),
            Error::Item(ItemError::SchemaInvalid(_))
        ));
    }

    #[test]
    fn test_get_selected_items_and_methods() {
        let ks = mem_table();
        ks.insert("u1", &json!({"email": "a@x", "mmr": 1674, "vCode": "V"}))
            .unwrap();

        let data = ks.get_data("u1", Some(&json!(["email", "mmr"]))).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data["email"], json!("a@x"));

        let data = ks
            .get_data("u1", Some(&json!({"mmr.*gt": [1500], "email.*len": null})))
            .unwrap();
        assert_eq!(data["mmr.*gt"], json!(true));
        assert_eq!(data["email.*len"], json!(3));

        assert!(matches!(
            ks.get_data("u1", Some(&json!(["ghost"]))).unwrap_err(),
            Error::Item(ItemError::InvalidItem(_))
        ));
    }

    #[test]
    fn test_config_rejected_at_construction() {
        let mut config = KeystoreConfig::mem_only("users");
        config.data_on_drive = true;
        assert!(matches!(
            Keystore::create(user_schema(), config).unwrap_err(),
            Error::Table(TableError::InvalidConfig(_))
        ));

        let config = KeystoreConfig::mem_only("");
        assert!(matches!(
            Keystore::create(user_schema(), config).unwrap_err(),
            Error::Table(TableError::NameRequired)
        ));

        let mut config = KeystoreConfig::mem_only("users");
        config.encryption_cost = 99;
        assert!(matches!(
            Keystore::create(user_schema(), config).unwrap_err(),
            Error::Table(TableError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_restore_rejects_short_tuple_and_reused_key() {
        let mut ks = mem_table();
        ks.restore("u1", vec![json!("a@x"), json!(1500), json!("V")], 0, 1)
            .unwrap();
        assert!(matches!(
            ks.restore("u1", vec![json!("b@x"), json!(1500), json!("V")], 0, 2)
                .unwrap_err(),
            Error::Table(TableError::KeyInUse(_))
        ));
        assert!(matches!(
            ks.restore("u2", vec![json!("b@x")], 0, 3).unwrap_err(),
            Error::Item(ItemError::RestoreItemSchema)
        ));
        assert!(matches!(
            ks.restore("u3", vec![json!("a@x"), json!(1500), json!("V")], 0, 4)
                .unwrap_err(),
            Error::Unique(UniqueError::ValueInUse { .. })
        ));
    }
}
