//! Table schemas: ordered, typed column descriptors.
//!
//! A [`Schema`] is an immutable ordered mapping of column name to
//! [`SchemaItem`]. Each item carries a stable data index into the entry's
//! storage tuple and a type descriptor from the closed [`ItemType`] set.
//! Schemas are validated once at construction and shared lock-free after.

pub mod filter;
pub mod methods;
pub mod value;

use std::collections::HashMap;

use crate::error::{ItemError, Result};
use self::value::Value;

/// Ordered column set for one table. Column order is fixed at creation;
/// every live entry's storage tuple has exactly `len()` slots.
#[derive(Debug, Clone)]
pub struct Schema {
    items: Vec<SchemaItem>,
    by_name: HashMap<String, usize>,
    has_unique: bool,
}

impl Schema {
    /// Build and validate a schema from `(name, type)` pairs. Data indices
    /// are assigned in iteration order.
    pub fn new<I, S>(columns: I) -> Result<Schema>
    where
        I: IntoIterator<Item = (S, ItemType)>,
        S: Into<String>,
    {
        let mut items = Vec::new();
        let mut by_name = HashMap::new();
        for (name, item_type) in columns {
            let name = name.into();
            validate_column_name(&name)?;
            item_type.validate(&name)?;
            if by_name.insert(name.clone(), items.len()).is_some() {
                return Err(ItemError::SchemaInvalid(format!("duplicate column '{name}'")).into());
            }
            items.push(SchemaItem {
                name,
                data_index: items.len(),
                item_type,
            });
        }
        if items.is_empty() {
            return Err(ItemError::SchemaInvalid("schema has no columns".into()).into());
        }
        let has_unique = items.iter().any(|i| i.item_type.has_unique());
        Ok(Schema {
            items,
            by_name,
            has_unique,
        })
    }

    /// Number of columns (= storage tuple length).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a column by name.
    pub fn get(&self, name: &str) -> Option<&SchemaItem> {
        self.by_name.get(name).map(|&i| &self.items[i])
    }

    /// Columns in data-index order.
    pub fn items(&self) -> &[SchemaItem] {
        &self.items
    }

    /// Whether any column (at any nesting depth) is marked unique.
    pub fn has_unique(&self) -> bool {
        self.has_unique
    }
}

/// A named, typed slot in a table's storage tuple.
#[derive(Debug, Clone)]
pub struct SchemaItem {
    name: String,
    data_index: usize,
    item_type: ItemType,
}

impl SchemaItem {
    /// An anonymous item wrapping a container's element type.
    pub fn element(item_type: ItemType) -> SchemaItem {
        SchemaItem {
            name: String::new(),
            data_index: 0,
            item_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn item_type(&self) -> &ItemType {
        &self.item_type
    }
}

/// Storage width of an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    fn bounds_i64(self) -> (i64, i64) {
        match self {
            IntWidth::W8 => (i8::MIN as i64, i8::MAX as i64),
            IntWidth::W16 => (i16::MIN as i64, i16::MAX as i64),
            IntWidth::W32 => (i32::MIN as i64, i32::MAX as i64),
            IntWidth::W64 => (i64::MIN, i64::MAX),
        }
    }

    fn bounds_u64(self) -> (u64, u64) {
        match self {
            IntWidth::W8 => (0, u8::MAX as u64),
            IntWidth::W16 => (0, u16::MAX as u64),
            IntWidth::W32 => (0, u32::MAX as u64),
            IntWidth::W64 => (0, u64::MAX),
        }
    }
}

/// Constraints for signed integer columns. When `min < max`, stored values
/// are clamped into `[min, max]`; when `min == max` no clamp applies.
#[derive(Debug, Clone, Default)]
pub struct IntOpts {
    pub default: i64,
    pub min: i64,
    pub max: i64,
    pub required: bool,
    pub unique: bool,
    pub abs: bool,
}

/// Constraints for unsigned integer columns.
#[derive(Debug, Clone, Default)]
pub struct UintOpts {
    pub default: u64,
    pub min: u64,
    pub max: u64,
    pub required: bool,
    pub unique: bool,
}

/// Constraints for float columns.
#[derive(Debug, Clone, Default)]
pub struct FloatOpts {
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub required: bool,
    pub unique: bool,
    pub abs: bool,
}

/// Constraints for string columns. `max_chars > 0` rejects longer strings
/// (byte length); `required` rejects empty strings; `encrypted` stores a
/// one-way hash and cannot be combined with `unique`.
#[derive(Debug, Clone, Default)]
pub struct StringOpts {
    pub default: String,
    pub max_chars: u32,
    pub required: bool,
    pub unique: bool,
    pub encrypted: bool,
}

/// Constraints for array columns.
#[derive(Debug, Clone)]
pub struct ArrayOpts {
    pub element: Box<SchemaItem>,
    pub max_length: u32,
    pub required: bool,
}

impl ArrayOpts {
    pub fn new(element: ItemType) -> ArrayOpts {
        ArrayOpts {
            element: Box::new(SchemaItem::element(element)),
            max_length: 0,
            required: false,
        }
    }
}

/// Constraints for map columns (string keys).
#[derive(Debug, Clone)]
pub struct MapOpts {
    pub element: Box<SchemaItem>,
    pub max_entries: u32,
    pub required: bool,
}

impl MapOpts {
    pub fn new(element: ItemType) -> MapOpts {
        MapOpts {
            element: Box::new(SchemaItem::element(element)),
            max_entries: 0,
            required: false,
        }
    }
}

/// Constraints for time columns. `format` is a strftime pattern used for
/// parsing query input and formatting get output; the empty string means
/// RFC 3339. Persisted form is always RFC 3339.
#[derive(Debug, Clone, Default)]
pub struct TimeOpts {
    pub format: String,
    pub required: bool,
}

impl TimeOpts {
    pub fn new(format: impl Into<String>) -> TimeOpts {
        TimeOpts {
            format: format.into(),
            required: false,
        }
    }
}

/// The closed set of column type descriptors.
#[derive(Debug, Clone)]
pub enum ItemType {
    Bool { default: bool },
    Int { width: IntWidth, opts: IntOpts },
    Uint { width: IntWidth, opts: UintOpts },
    Float { double: bool, opts: FloatOpts },
    String(StringOpts),
    Array(ArrayOpts),
    Map(MapOpts),
    Object(Schema),
    Time(TimeOpts),
}

impl ItemType {
    pub fn array(element: ItemType) -> ItemType {
        ItemType::Array(ArrayOpts::new(element))
    }

    pub fn map(element: ItemType) -> ItemType {
        ItemType::Map(MapOpts::new(element))
    }

    /// Construction-time validation. `unique && encrypted` is rejected
    /// statically: salted hashes cannot be deduplicated.
    fn validate(&self, name: &str) -> Result<()> {
        match self {
            ItemType::String(opts) if opts.unique && opts.encrypted => Err(ItemError::SchemaInvalid(
                format!("column '{name}' cannot be both unique and encrypted"),
            )
            .into()),
            ItemType::Array(opts) => opts.element.item_type.validate(name),
            ItemType::Map(opts) => opts.element.item_type.validate(name),
            // Nested object schemas were validated by their own Schema::new.
            _ => Ok(()),
        }
    }

    /// Whether this descriptor (or any nested one) is marked unique.
    pub(crate) fn has_unique(&self) -> bool {
        match self {
            ItemType::Int { opts, .. } => opts.unique,
            ItemType::Uint { opts, .. } => opts.unique,
            ItemType::Float { opts, .. } => opts.unique,
            ItemType::String(opts) => opts.unique,
            ItemType::Array(opts) => opts.element.item_type.has_unique(),
            ItemType::Map(opts) => opts.element.item_type.has_unique(),
            ItemType::Object(schema) => schema.has_unique,
            _ => false,
        }
    }

    /// The default value substituted when a write-mode query omits the item.
    pub(crate) fn default_value(&self) -> Result<Value> {
        match self {
            ItemType::Bool { default } => Ok(Value::Bool(*default)),
            ItemType::Int { width, opts } => Ok(Value::Int(clamp_int(opts.default, *width, opts))),
            ItemType::Uint { width, opts } => {
                Ok(Value::Uint(clamp_uint(opts.default, *width, opts)))
            }
            ItemType::Float { double, opts } => {
                Ok(Value::Float(clamp_float(opts.default, *double, opts)))
            }
            ItemType::String(opts) => {
                if opts.required && opts.default.is_empty() {
                    return Err(ItemError::StringRequired.into());
                }
                Ok(Value::String(opts.default.clone()))
            }
            ItemType::Array(opts) => {
                if opts.required {
                    return Err(ItemError::ArrayItemsRequired.into());
                }
                Ok(Value::List(Vec::new()))
            }
            ItemType::Map(opts) => {
                if opts.required {
                    return Err(ItemError::MapItemsRequired.into());
                }
                Ok(Value::Map(Default::default()))
            }
            ItemType::Object(schema) => {
                let mut tuple = Vec::with_capacity(schema.len());
                for item in schema.items() {
                    tuple.push(item.item_type.default_value()?);
                }
                Ok(Value::List(tuple))
            }
            ItemType::Time(opts) => {
                if opts.required {
                    return Err(ItemError::InvalidItemValue.into());
                }
                Ok(Value::Null)
            }
        }
    }
}

/// Clamp a signed value: storage width first, then the configured range
/// (only when `min < max`), then `abs`.
pub(crate) fn clamp_int(v: i64, width: IntWidth, opts: &IntOpts) -> i64 {
    let (lo, hi) = width.bounds_i64();
    let mut v = v.clamp(lo, hi);
    if opts.min < opts.max {
        v = v.clamp(opts.min, opts.max);
    }
    if opts.abs && v < 0 {
        v = v.saturating_abs();
    }
    v
}

pub(crate) fn clamp_uint(v: u64, width: IntWidth, opts: &UintOpts) -> u64 {
    let (lo, hi) = width.bounds_u64();
    let mut v = v.clamp(lo, hi);
    if opts.min < opts.max {
        v = v.clamp(opts.min, opts.max);
    }
    v
}

/// Clamp a float; single-precision columns round through `f32`.
pub(crate) fn clamp_float(v: f64, double: bool, opts: &FloatOpts) -> f64 {
    let mut v = v;
    if opts.min < opts.max {
        v = v.clamp(opts.min, opts.max);
    }
    if opts.abs && v < 0.0 {
        v = -v;
    }
    if double { v } else { v as f32 as f64 }
}

fn validate_column_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ItemError::SchemaInvalid("empty column name".into()).into());
    }
    if name.contains('.') || name.starts_with('*') {
        return Err(ItemError::SchemaInvalid(format!(
            "column name '{name}' may not contain '.' or start with '*'"
        ))
        .into());
    }
    Ok(())
}

/// Collect `(column path, canonical value)` pairs for every unique-marked
/// descriptor in `tuple`. Paths are dotted schema names (`friends.name`);
/// array and map elements share their container's path, so element-level
/// uniqueness is table-wide. Null slots contribute nothing.
pub(crate) fn collect_unique_values(schema: &Schema, tuple: &[Value]) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    for item in schema.items() {
        if let Some(v) = tuple.get(item.data_index) {
            collect_unique_item(&item.item_type, v, item.name(), &mut out);
        }
    }
    out
}

/// As [`collect_unique_values`], for a single descriptor rooted at `path`.
pub(crate) fn collect_unique_item(
    item_type: &ItemType,
    value: &Value,
    path: &str,
    out: &mut Vec<(String, Value)>,
) {
    if value.is_null() {
        return;
    }
    match item_type {
        ItemType::Int { opts, .. } if opts.unique => out.push((path.to_string(), value.clone())),
        ItemType::Uint { opts, .. } if opts.unique => out.push((path.to_string(), value.clone())),
        ItemType::Float { opts, .. } if opts.unique => out.push((path.to_string(), value.clone())),
        ItemType::String(opts) if opts.unique => out.push((path.to_string(), value.clone())),
        ItemType::Array(opts) => {
            if let Value::List(items) = value {
                for v in items {
                    collect_unique_item(&opts.element.item_type, v, path, out);
                }
            }
        }
        ItemType::Map(opts) => {
            if let Value::Map(map) = value {
                for v in map.values() {
                    collect_unique_item(&opts.element.item_type, v, path, out);
                }
            }
        }
        ItemType::Object(schema) => {
            if let Value::List(tuple) = value {
                for item in schema.items() {
                    if let Some(v) = tuple.get(item.data_index) {
                        let sub = format!("{path}.{}", item.name());
                        collect_unique_item(&item.item_type, v, &sub, out);
                    }
                }
            }
        }
        _ => {}
    }
}
