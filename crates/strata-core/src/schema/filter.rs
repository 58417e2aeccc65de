//! The recursive filter engine.
//!
//! [`filter_item`] takes a query value, a parsed method chain, a schema item,
//! and the entry's existing value for that item, and produces either the
//! canonical storage form (write modes) or a presentation value (get mode).
//! The schema and data hierarchies live on the call stack, and container
//! methods operate on copies so the entry's live data is never aliased
//! before commit.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{CryptoError, Error, ItemError, MethodError, Result, UniqueError};

use super::methods::{
    MethodToken, StringOutcome, apply_array_methods, apply_map_methods, apply_number_methods,
    apply_object_methods, apply_string_methods, apply_time_methods, params_slice,
};
use super::value::Value;
use super::{
    ArrayOpts, FloatOpts, IntOpts, IntWidth, ItemType, MapOpts, Schema, SchemaItem, StringOpts,
    TimeOpts, UintOpts, clamp_float, clamp_int, clamp_uint, collect_unique_item,
};

/// What a filter run is producing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Insert,
    Update,
    Get,
    Restore,
}

/// Unique-value candidates collected during one filter run, keyed by dotted
/// column path. Inserting a value twice fails immediately: two candidates in
/// the same batch may not collide.
#[derive(Debug, Default)]
pub struct UniqueBatch {
    vals: HashMap<String, HashSet<Value>>,
}

impl UniqueBatch {
    pub fn new() -> UniqueBatch {
        UniqueBatch::default()
    }

    pub fn insert(&mut self, column: &str, value: Value) -> Result<()> {
        if !self.vals.entry(column.to_string()).or_default().insert(value) {
            return Err(UniqueError::ValueDuplicate {
                column: column.to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HashSet<Value>)> {
        self.vals.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.vals.is_empty()
    }
}

/// Per-run filter context: the mode, the table's encryption cost, the unique
/// candidate batch (write modes only), and the dotted schema path of the item
/// currently being filtered.
pub struct FilterCtx<'a> {
    pub mode: FilterMode,
    pub ecost: u32,
    unique: Option<&'a mut UniqueBatch>,
    path: Vec<String>,
}

impl<'a> FilterCtx<'a> {
    pub fn new(mode: FilterMode, ecost: u32, unique: Option<&'a mut UniqueBatch>) -> FilterCtx<'a> {
        FilterCtx {
            mode,
            ecost,
            unique,
            path: Vec::new(),
        }
    }

    pub fn is_get(&self) -> bool {
        self.mode == FilterMode::Get
    }

    pub(crate) fn push_path(&mut self, seg: &str) {
        self.path.push(seg.to_string());
    }

    pub(crate) fn pop_path(&mut self) {
        self.path.pop();
    }

    pub(crate) fn path_string(&self) -> String {
        self.path.join(".")
    }

    fn add_unique(&mut self, value: &Value) -> Result<()> {
        if let Some(batch) = self.unique.as_deref_mut() {
            let column = self.path.join(".");
            batch.insert(&column, value.clone())?;
        }
        Ok(())
    }

    /// Register every unique value inside a default-substituted subtree.
    fn add_unique_tree(&mut self, item_type: &ItemType, value: &Value) -> Result<()> {
        if self.unique.is_none() || !item_type.has_unique() {
            return Ok(());
        }
        let mut pairs = Vec::new();
        collect_unique_item(item_type, value, &self.path_string(), &mut pairs);
        if let Some(batch) = self.unique.as_deref_mut() {
            for (column, v) in pairs {
                batch.insert(&column, v)?;
            }
        }
        Ok(())
    }
}

/// Filter one query item against its schema item.
///
/// Write modes return the canonical storage value; get mode returns the
/// presentation value. `existing` is the entry's current value for this item
/// (required by get mode and by any method evaluation).
pub fn filter_item(
    input: Value,
    methods: &[MethodToken],
    item: &SchemaItem,
    existing: Option<&Value>,
    ctx: &mut FilterCtx,
) -> Result<Value> {
    if !ctx.is_get() && input.is_null() {
        // A missing item takes the type's default; methods need a value.
        if !methods.is_empty() {
            return Err(MethodError::InvalidMethodParameters.into());
        }
        let default = item.item_type().default_value()?;
        ctx.add_unique_tree(item.item_type(), &default)?;
        return Ok(default);
    }

    match item.item_type() {
        ItemType::Bool { .. } => bool_filter(input, methods, existing, ctx),
        ItemType::Int { width, opts } => int_filter(input, methods, *width, opts, existing, ctx),
        ItemType::Uint { width, opts } => uint_filter(input, methods, *width, opts, existing, ctx),
        ItemType::Float { double, opts } => {
            float_filter(input, methods, *double, opts, existing, ctx)
        }
        ItemType::String(opts) => string_filter(input, methods, opts, existing, ctx),
        ItemType::Array(opts) => array_filter(input, methods, opts, existing, ctx),
        ItemType::Map(opts) => map_filter(input, methods, opts, existing, ctx),
        ItemType::Object(schema) => object_filter(input, methods, schema, existing, ctx),
        ItemType::Time(opts) => time_filter(input, methods, opts, existing, ctx),
    }
}

fn bool_filter(
    input: Value,
    methods: &[MethodToken],
    existing: Option<&Value>,
    ctx: &mut FilterCtx,
) -> Result<Value> {
    if let Some(m) = methods.first() {
        return Err(MethodError::InvalidMethod(m.to_string()).into());
    }
    if ctx.is_get() {
        return Ok(existing.cloned().unwrap_or(Value::Null));
    }
    match input {
        Value::Bool(b) => Ok(Value::Bool(b)),
        _ => Err(ItemError::InvalidItemValue.into()),
    }
}

fn int_filter(
    input: Value,
    methods: &[MethodToken],
    width: IntWidth,
    opts: &IntOpts,
    existing: Option<&Value>,
    ctx: &mut FilterCtx,
) -> Result<Value> {
    let val = if !methods.is_empty() {
        let out = numeric_methods(&input, methods, existing, ctx, false)?;
        if ctx.is_get() {
            return Ok(out);
        }
        out
    } else if ctx.is_get() {
        return Ok(existing.cloned().unwrap_or(Value::Null));
    } else {
        input
    };
    let Some(ic) = val.coerce_i64() else {
        return Err(ItemError::InvalidItemValue.into());
    };
    let v = Value::Int(clamp_int(ic, width, opts));
    if opts.unique {
        ctx.add_unique(&v)?;
    }
    Ok(v)
}

fn uint_filter(
    input: Value,
    methods: &[MethodToken],
    width: IntWidth,
    opts: &UintOpts,
    existing: Option<&Value>,
    ctx: &mut FilterCtx,
) -> Result<Value> {
    let val = if !methods.is_empty() {
        let out = numeric_methods(&input, methods, existing, ctx, false)?;
        if ctx.is_get() {
            return Ok(out);
        }
        out
    } else if ctx.is_get() {
        return Ok(existing.cloned().unwrap_or(Value::Null));
    } else {
        input
    };
    let Some(ic) = val.coerce_u64() else {
        return Err(ItemError::InvalidItemValue.into());
    };
    let v = Value::Uint(clamp_uint(ic, width, opts));
    if opts.unique {
        ctx.add_unique(&v)?;
    }
    Ok(v)
}

fn float_filter(
    input: Value,
    methods: &[MethodToken],
    double: bool,
    opts: &FloatOpts,
    existing: Option<&Value>,
    ctx: &mut FilterCtx,
) -> Result<Value> {
    let val = if !methods.is_empty() {
        let out = numeric_methods(&input, methods, existing, ctx, true)?;
        if ctx.is_get() {
            return Ok(out);
        }
        out
    } else if ctx.is_get() {
        return Ok(existing.cloned().unwrap_or(Value::Null));
    } else {
        input
    };
    let Some(fc) = val.as_f64() else {
        return Err(ItemError::InvalidItemValue.into());
    };
    let v = Value::Float(clamp_float(fc, double, opts));
    if opts.unique {
        ctx.add_unique(&v)?;
    }
    Ok(v)
}

/// Shared numeric method-chain entry: the chain reads the entry's current
/// value and the operands ride in the query value.
fn numeric_methods(
    input: &Value,
    methods: &[MethodToken],
    existing: Option<&Value>,
    ctx: &FilterCtx,
    float_result: bool,
) -> Result<Value> {
    let Some(base) = existing.and_then(Value::as_f64) else {
        return Err(MethodError::InvalidMethodParameters.into());
    };
    let params = params_slice(input)?;
    apply_number_methods(base, methods, params, ctx.is_get(), float_result)
}

fn string_filter(
    input: Value,
    methods: &[MethodToken],
    opts: &StringOpts,
    existing: Option<&Value>,
    ctx: &mut FilterCtx,
) -> Result<Value> {
    let ic: String;
    if !methods.is_empty() {
        if opts.encrypted {
            return Err(CryptoError::StringIsEncrypted.into());
        }
        let Some(base) = existing.and_then(Value::as_str) else {
            return Err(MethodError::InvalidMethodParameters.into());
        };
        let params = params_slice(&input)?;
        match apply_string_methods(base.to_string(), methods, params, ctx.is_get())? {
            StringOutcome::Presented(v) => return Ok(v),
            StringOutcome::Mutated(s) => ic = s,
        }
    } else if ctx.is_get() {
        if opts.encrypted {
            return Err(CryptoError::StringIsEncrypted.into());
        }
        return Ok(existing.cloned().unwrap_or(Value::Null));
    } else {
        let Value::String(s) = input else {
            return Err(ItemError::InvalidItemValue.into());
        };
        ic = s;
    }

    // Restored strings are already hashed; store them verbatim.
    if ctx.mode == FilterMode::Restore && opts.encrypted {
        return Ok(Value::String(ic));
    }
    if opts.max_chars > 0 && ic.len() > opts.max_chars as usize {
        return Err(ItemError::StringTooLarge {
            max: opts.max_chars,
        }
        .into());
    }
    if opts.required && ic.is_empty() {
        return Err(ItemError::StringRequired.into());
    }
    if opts.encrypted {
        let hash = bcrypt::hash(&ic, ctx.ecost).map_err(|_| CryptoError::EncryptingString)?;
        return Ok(Value::String(hash));
    }
    let v = Value::String(ic);
    if opts.unique {
        ctx.add_unique(&v)?;
    }
    Ok(v)
}

fn array_filter(
    input: Value,
    methods: &[MethodToken],
    opts: &ArrayOpts,
    existing: Option<&Value>,
    ctx: &mut FilterCtx,
) -> Result<Value> {
    if !methods.is_empty() {
        // Copy first: methods must never alias the entry's live container.
        let working = match existing {
            Some(Value::List(items)) => items.clone(),
            _ => return Err(MethodError::InvalidMethodParameters.into()),
        };
        return apply_array_methods(working, methods, input, opts, ctx);
    }
    if ctx.is_get() {
        let Some(Value::List(items)) = existing else {
            return Ok(Value::Null);
        };
        let mut out = Vec::with_capacity(items.len());
        for v in items {
            out.push(filter_item(Value::Null, &[], &opts.element, Some(v), ctx)?);
        }
        return Ok(Value::List(out));
    }
    let Value::List(items) = input else {
        return Err(ItemError::InvalidItemValue.into());
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(filter_item(item, &[], &opts.element, None, ctx)?);
    }
    if opts.required && out.is_empty() {
        return Err(ItemError::ArrayItemsRequired.into());
    }
    if opts.max_length > 0 && out.len() > opts.max_length as usize {
        return Err(ItemError::InvalidItemValue.into());
    }
    Ok(Value::List(out))
}

fn map_filter(
    input: Value,
    methods: &[MethodToken],
    opts: &MapOpts,
    existing: Option<&Value>,
    ctx: &mut FilterCtx,
) -> Result<Value> {
    if !methods.is_empty() {
        let working = match existing {
            Some(Value::Map(map)) => map.clone(),
            _ => return Err(MethodError::InvalidMethodParameters.into()),
        };
        return apply_map_methods(working, methods, input, opts, ctx);
    }
    if ctx.is_get() {
        let Some(Value::Map(map)) = existing else {
            return Ok(Value::Null);
        };
        let mut out = BTreeMap::new();
        for (k, v) in map {
            out.insert(
                k.clone(),
                filter_item(Value::Null, &[], &opts.element, Some(v), ctx)?,
            );
        }
        return Ok(Value::Map(out));
    }
    let Value::Map(entries) = input else {
        return Err(ItemError::InvalidItemValue.into());
    };
    let mut out = BTreeMap::new();
    for (k, item) in entries {
        out.insert(k, filter_item(item, &[], &opts.element, None, ctx)?);
    }
    if opts.required && out.is_empty() {
        return Err(ItemError::MapItemsRequired.into());
    }
    if opts.max_entries > 0 && out.len() > opts.max_entries as usize {
        return Err(ItemError::InvalidItemValue.into());
    }
    Ok(Value::Map(out))
}

fn object_filter(
    input: Value,
    methods: &[MethodToken],
    schema: &Schema,
    existing: Option<&Value>,
    ctx: &mut FilterCtx,
) -> Result<Value> {
    if !methods.is_empty() {
        let tuple = match existing {
            Some(Value::List(tuple)) => tuple.clone(),
            _ => return Err(MethodError::InvalidMethodParameters.into()),
        };
        return apply_object_methods(tuple, methods, input, schema, ctx);
    }
    if ctx.is_get() {
        let Some(Value::List(tuple)) = existing else {
            return Ok(Value::Null);
        };
        let mut out = BTreeMap::new();
        for item in schema.items() {
            ctx.push_path(item.name());
            let res = filter_item(Value::Null, &[], item, tuple.get(item.data_index()), ctx);
            ctx.pop_path();
            out.insert(item.name().to_string(), res?);
        }
        return Ok(Value::Map(out));
    }

    // Accept a keyed map or a positional tuple; missing fields take defaults.
    let mut out = vec![Value::Null; schema.len()];
    match input {
        Value::Map(mut fields) => {
            for item in schema.items() {
                let v_in = fields.remove(item.name()).unwrap_or(Value::Null);
                ctx.push_path(item.name());
                let res = filter_item(v_in, &[], item, None, ctx);
                ctx.pop_path();
                out[item.data_index()] = res?;
            }
        }
        Value::List(mut positional) => {
            for item in schema.items() {
                let v_in = if item.data_index() < positional.len() {
                    std::mem::replace(&mut positional[item.data_index()], Value::Null)
                } else {
                    Value::Null
                };
                ctx.push_path(item.name());
                let res = filter_item(v_in, &[], item, None, ctx);
                ctx.pop_path();
                out[item.data_index()] = res?;
            }
        }
        _ => return Err(ItemError::InvalidItemValue.into()),
    }
    Ok(Value::List(out))
}

fn time_filter(
    input: Value,
    methods: &[MethodToken],
    opts: &TimeOpts,
    existing: Option<&Value>,
    ctx: &mut FilterCtx,
) -> Result<Value> {
    if ctx.is_get() {
        let t = match existing {
            Some(Value::Time(t)) => *t,
            Some(Value::Null) | None => {
                if !methods.is_empty() {
                    return Err(MethodError::InvalidMethodParameters.into());
                }
                return Ok(Value::Null);
            }
            Some(other) => {
                return Err(Error::Unexpected(format!(
                    "time column holds a {} value",
                    other.type_name()
                )));
            }
        };
        if !methods.is_empty() {
            return apply_time_methods(t, methods);
        }
        return Ok(Value::String(format_time(t, &opts.format)));
    }
    if let Some(m) = methods.first() {
        return Err(MethodError::InvalidMethod(m.to_string()).into());
    }
    match input {
        Value::String(s) => {
            if s == "*now" {
                return Ok(Value::Time(Utc::now()));
            }
            let t = if ctx.mode == FilterMode::Restore {
                // Persisted form is RFC 3339.
                DateTime::parse_from_rfc3339(&s)
                    .ok()
                    .map(|t| t.with_timezone(&Utc))
            } else {
                parse_time(&s, &opts.format)
            };
            t.map(Value::Time)
                .ok_or_else(|| ItemError::InvalidTimeFormat.into())
        }
        Value::Time(t) => Ok(Value::Time(t)),
        _ => Err(ItemError::InvalidItemValue.into()),
    }
}

fn format_time(t: DateTime<Utc>, format: &str) -> String {
    if format.is_empty() {
        t.to_rfc3339()
    } else {
        t.format(format).to_string()
    }
}

/// Parse a time string against a column format. Formats without a date part
/// (e.g. `%-I:%M%p`) resolve on the epoch date; date-only formats resolve at
/// midnight.
fn parse_time(s: &str, format: &str) -> Option<DateTime<Utc>> {
    if format.is_empty() {
        return DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_str(s, format) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
        return Some(t.and_utc());
    }
    if let Ok(t) = NaiveTime::parse_from_str(s, format) {
        return Some(NaiveDate::from_ymd_opt(1970, 1, 1)?.and_time(t).and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, format) {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}
