//! Method chains: dotted path suffixes parsed into typed tokens, plus the
//! per-type evaluators the filter engine dispatches to.
//!
//! A query path like `friends.0.name.*append` splits into a column name
//! (`friends`) and a token chain (`0`, `name`, `*append`). Navigation tokens
//! descend into containers; `*`-prefixed tokens invoke a leaf operator.
//! Numeric chains consume one operand per token; container write methods
//! (`*append`, `*prepend`, `*append[i]`, `*delete`) consume the whole operand
//! value and must be the final token.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{ItemError, MethodError, Result, UniqueError};

use super::filter::{FilterCtx, filter_item};
use super::value::Value;
use super::{ArrayOpts, MapOpts, Schema, SchemaItem, collect_unique_item};

/// One parsed segment of a method chain.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodToken {
    /// Container navigation: an array index, map key, or object field name.
    Name(String),
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Container mutation
    Append,
    AppendAt(i64),
    Prepend,
    Delete,
    // Get operators
    Len,
    IndexOf,
    KeyOf,
    Contains,
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    // Time
    Since,
    Until,
    Mil,
    Sec,
    Min,
    Hr,
    Day,
}

impl MethodToken {
    fn parse(seg: &str) -> Result<MethodToken> {
        let Some(rest) = seg.strip_prefix('*') else {
            if seg.is_empty() {
                return Err(MethodError::InvalidMethod(seg.to_string()).into());
            }
            return Ok(MethodToken::Name(seg.to_string()));
        };
        let token = match rest {
            "add" => MethodToken::Add,
            "sub" => MethodToken::Sub,
            "mul" => MethodToken::Mul,
            "div" => MethodToken::Div,
            "mod" => MethodToken::Mod,
            "append" => MethodToken::Append,
            "prepend" => MethodToken::Prepend,
            "delete" => MethodToken::Delete,
            "len" => MethodToken::Len,
            "indexOf" => MethodToken::IndexOf,
            "keyOf" => MethodToken::KeyOf,
            "contains" => MethodToken::Contains,
            "eq" => MethodToken::Eq,
            "gt" => MethodToken::Gt,
            "gte" => MethodToken::Gte,
            "lt" => MethodToken::Lt,
            "lte" => MethodToken::Lte,
            "since" => MethodToken::Since,
            "until" => MethodToken::Until,
            "mil" => MethodToken::Mil,
            "sec" => MethodToken::Sec,
            "min" => MethodToken::Min,
            "hr" => MethodToken::Hr,
            "day" => MethodToken::Day,
            _ => {
                // *append[i]
                if let Some(idx) = rest.strip_prefix("append[").and_then(|r| r.strip_suffix(']'))
                    && let Ok(i) = idx.parse::<i64>()
                {
                    MethodToken::AppendAt(i)
                } else {
                    return Err(MethodError::InvalidMethod(seg.to_string()).into());
                }
            }
        };
        Ok(token)
    }
}

impl fmt::Display for MethodToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodToken::Name(s) => f.write_str(s),
            MethodToken::Add => f.write_str("*add"),
            MethodToken::Sub => f.write_str("*sub"),
            MethodToken::Mul => f.write_str("*mul"),
            MethodToken::Div => f.write_str("*div"),
            MethodToken::Mod => f.write_str("*mod"),
            MethodToken::Append => f.write_str("*append"),
            MethodToken::AppendAt(i) => write!(f, "*append[{i}]"),
            MethodToken::Prepend => f.write_str("*prepend"),
            MethodToken::Delete => f.write_str("*delete"),
            MethodToken::Len => f.write_str("*len"),
            MethodToken::IndexOf => f.write_str("*indexOf"),
            MethodToken::KeyOf => f.write_str("*keyOf"),
            MethodToken::Contains => f.write_str("*contains"),
            MethodToken::Eq => f.write_str("*eq"),
            MethodToken::Gt => f.write_str("*gt"),
            MethodToken::Gte => f.write_str("*gte"),
            MethodToken::Lt => f.write_str("*lt"),
            MethodToken::Lte => f.write_str("*lte"),
            MethodToken::Since => f.write_str("*since"),
            MethodToken::Until => f.write_str("*until"),
            MethodToken::Mil => f.write_str("*mil"),
            MethodToken::Sec => f.write_str("*sec"),
            MethodToken::Min => f.write_str("*min"),
            MethodToken::Hr => f.write_str("*hr"),
            MethodToken::Day => f.write_str("*day"),
        }
    }
}

/// Split a query path into its column name and parsed token chain.
pub fn parse_item_path(path: &str) -> Result<(String, Vec<MethodToken>)> {
    let mut segs = path.split('.');
    let name = segs.next().unwrap_or("").to_string();
    let tokens = segs.map(MethodToken::parse).collect::<Result<Vec<_>>>()?;
    Ok((name, tokens))
}

/// View method parameters as a slice. `Null` means "no parameters" (a plain
/// get path); anything other than a list is malformed.
pub(crate) fn params_slice(input: &Value) -> Result<&[Value]> {
    match input {
        Value::List(items) => Ok(items),
        Value::Null => Ok(&[]),
        _ => Err(MethodError::InvalidMethodParameters.into()),
    }
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Evaluate a numeric method chain over `base`, consuming one operand per
/// token. Comparison operators are get-only, consume their operand, and
/// terminate the chain with a Bool. In write modes the accumulated float is
/// returned for the caller to canonicalize (clamp, abs, width).
pub(crate) fn apply_number_methods(
    base: f64,
    methods: &[MethodToken],
    params: &[Value],
    get: bool,
    float_result: bool,
) -> Result<Value> {
    let mut acc = base;
    let mut on = 0usize;
    for (i, method) in methods.iter().enumerate() {
        let Some(param) = params.get(on) else {
            return Err(MethodError::NotEnoughMethodParameters.into());
        };
        let Some(n) = param.as_f64() else {
            return Err(MethodError::InvalidMethodParameters.into());
        };
        on += 1;
        match method {
            MethodToken::Add => acc += n,
            MethodToken::Sub => acc -= n,
            MethodToken::Mul => acc *= n,
            MethodToken::Div => acc /= n,
            MethodToken::Mod => {
                let div = n.trunc() as i64;
                if div == 0 {
                    return Err(MethodError::InvalidMethodParameters.into());
                }
                acc = ((acc.trunc() as i64) % div) as f64;
            }
            MethodToken::Eq | MethodToken::Gt | MethodToken::Gte | MethodToken::Lt
            | MethodToken::Lte
                if get =>
            {
                // Comparisons collapse to Bool and terminate the chain.
                if i + 1 != methods.len() {
                    return Err(MethodError::InvalidMethod(methods[i + 1].to_string()).into());
                }
                if on != params.len() {
                    return Err(MethodError::TooManyMethodParameters.into());
                }
                let b = match method {
                    MethodToken::Eq => acc == n,
                    MethodToken::Gt => acc > n,
                    MethodToken::Gte => acc >= n,
                    MethodToken::Lt => acc < n,
                    MethodToken::Lte => acc <= n,
                    _ => unreachable!(),
                };
                return Ok(Value::Bool(b));
            }
            other => return Err(MethodError::InvalidMethod(other.to_string()).into()),
        }
    }
    if on != params.len() {
        return Err(MethodError::TooManyMethodParameters.into());
    }
    if get && !float_result {
        Ok(Value::Int(acc as i64))
    } else {
        Ok(Value::Float(acc))
    }
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

/// Result of a string method chain: either a rewritten string (write modes,
/// still subject to the column's constraints) or a presentation value.
pub(crate) enum StringOutcome {
    Mutated(String),
    Presented(Value),
}

pub(crate) fn apply_string_methods(
    base: String,
    methods: &[MethodToken],
    params: &[Value],
    get: bool,
) -> Result<StringOutcome> {
    if get {
        return string_get_methods(&base, methods, params).map(StringOutcome::Presented);
    }

    let mut s = base;
    let mut on = 0usize;
    for method in methods {
        let Some(param) = params.get(on) else {
            return Err(MethodError::NotEnoughMethodParameters.into());
        };
        let Some(piece) = param.as_str() else {
            return Err(MethodError::InvalidMethodParameters.into());
        };
        on += 1;
        match method {
            MethodToken::Add | MethodToken::Append => s.push_str(piece),
            MethodToken::Prepend => s.insert_str(0, piece),
            MethodToken::AppendAt(i) => {
                let j = clamp_insert_index(*i, s.len());
                if !s.is_char_boundary(j) {
                    return Err(MethodError::InvalidMethodParameters.into());
                }
                s.insert_str(j, piece);
            }
            other => return Err(MethodError::InvalidMethod(other.to_string()).into()),
        }
    }
    if on != params.len() {
        return Err(MethodError::TooManyMethodParameters.into());
    }
    Ok(StringOutcome::Mutated(s))
}

fn string_get_methods(base: &str, methods: &[MethodToken], params: &[Value]) -> Result<Value> {
    match &methods[0] {
        MethodToken::Len => {
            let n = base.len() as f64;
            if methods.len() == 1 {
                expect_consumed(params, 0)?;
                Ok(Value::Int(n as i64))
            } else {
                apply_number_methods(n, &methods[1..], params, true, false)
            }
        }
        MethodToken::IndexOf => {
            let needle = first_string_param(params)?;
            let idx = base.find(needle).map(|i| i as i64).unwrap_or(-1);
            if methods.len() == 1 {
                expect_consumed(params, 1)?;
                Ok(Value::Int(idx))
            } else {
                apply_number_methods(idx as f64, &methods[1..], &params[1..], true, false)
            }
        }
        MethodToken::Contains => {
            let needle = first_string_param(params)?;
            terminal(methods, params, 1)?;
            Ok(Value::Bool(base.contains(needle)))
        }
        MethodToken::Eq => {
            let other = first_string_param(params)?;
            terminal(methods, params, 1)?;
            Ok(Value::Bool(base == other))
        }
        other => Err(MethodError::InvalidMethod(other.to_string()).into()),
    }
}

fn first_string_param(params: &[Value]) -> Result<&str> {
    let Some(param) = params.first() else {
        return Err(MethodError::NotEnoughMethodParameters.into());
    };
    param
        .as_str()
        .ok_or_else(|| MethodError::InvalidMethodParameters.into())
}

/// A terminal get operator: nothing may follow it, and it must have consumed
/// every operand.
fn terminal(methods: &[MethodToken], params: &[Value], used: usize) -> Result<()> {
    if methods.len() > 1 {
        return Err(MethodError::InvalidMethod(methods[1].to_string()).into());
    }
    expect_consumed(params, used)
}

fn expect_consumed(params: &[Value], used: usize) -> Result<()> {
    if params.len() > used {
        return Err(MethodError::TooManyMethodParameters.into());
    }
    Ok(())
}

/// Clamp an insert index into `[0, max(len - 1, 0)]`; an empty container
/// takes the insert at 0 (a plain append).
fn clamp_insert_index(i: i64, len: usize) -> usize {
    let hi = len.saturating_sub(1) as i64;
    i.clamp(0, hi) as usize
}

// ---------------------------------------------------------------------------
// Arrays
// ---------------------------------------------------------------------------

pub(crate) fn apply_array_methods(
    mut working: Vec<Value>,
    methods: &[MethodToken],
    input: Value,
    opts: &ArrayOpts,
    ctx: &mut FilterCtx,
) -> Result<Value> {
    let get = ctx.is_get();
    match &methods[0] {
        MethodToken::Name(tok) => {
            let Ok(i) = tok.parse::<usize>() else {
                return Err(MethodError::InvalidMethod(tok.clone()).into());
            };
            if working.is_empty() {
                return Err(ItemError::ArrayEmpty.into());
            }
            if i >= working.len() {
                return Err(ItemError::IndexOutOfBounds {
                    index: i as i64,
                    len: working.len(),
                }
                .into());
            }
            let res = filter_item(input, &methods[1..], &opts.element, Some(&working[i]), ctx)?;
            if get {
                Ok(res)
            } else {
                working[i] = res;
                Ok(Value::List(working))
            }
        }

        MethodToken::Len if get => {
            let n = working.len() as f64;
            let params = params_slice(&input)?;
            if methods.len() == 1 {
                expect_consumed(params, 0)?;
                Ok(Value::Int(n as i64))
            } else {
                apply_number_methods(n, &methods[1..], params, true, false)
            }
        }
        MethodToken::IndexOf if get => {
            let params = params_slice(&input)?;
            let Some(search) = params.first() else {
                return Err(MethodError::NotEnoughMethodParameters.into());
            };
            let idx = array_index_of(&working, search, &opts.element)?;
            if methods.len() == 1 {
                expect_consumed(params, 1)?;
                Ok(Value::Int(idx))
            } else {
                apply_number_methods(idx as f64, &methods[1..], &params[1..], true, false)
            }
        }
        MethodToken::Contains if get => {
            let params = params_slice(&input)?;
            let Some(search) = params.first() else {
                return Err(MethodError::NotEnoughMethodParameters.into());
            };
            let idx = array_index_of(&working, search, &opts.element)?;
            terminal(methods, params, 1)?;
            Ok(Value::Bool(idx != -1))
        }

        MethodToken::Append if !get => {
            final_token(methods)?;
            let incoming = filter_incoming(input, &working, opts, ctx)?;
            working.extend(incoming);
            Ok(Value::List(working))
        }
        MethodToken::Prepend if !get => {
            final_token(methods)?;
            let incoming = filter_incoming(input, &working, opts, ctx)?;
            working.splice(0..0, incoming);
            Ok(Value::List(working))
        }
        MethodToken::AppendAt(i) if !get => {
            final_token(methods)?;
            let j = clamp_insert_index(*i, working.len());
            let incoming = filter_incoming(input, &working, opts, ctx)?;
            working.splice(j..j, incoming);
            Ok(Value::List(working))
        }
        MethodToken::Delete if !get => {
            final_token(methods)?;
            let Value::List(indices) = input else {
                return Err(MethodError::InvalidMethodParameters.into());
            };
            // Indices must be strictly decreasing, each within bounds.
            let mut last = working.len() as i64;
            for n in &indices {
                let Some(i) = n.coerce_i64() else {
                    return Err(MethodError::InvalidMethodParameters.into());
                };
                if i < 0 || i >= last {
                    return Err(MethodError::InvalidMethodParameters.into());
                }
                working.remove(i as usize);
                last = i;
            }
            Ok(Value::List(working))
        }

        other => Err(MethodError::InvalidMethod(other.to_string()).into()),
    }
}

/// Container write methods take the operand array whole; nothing may follow.
fn final_token(methods: &[MethodToken]) -> Result<()> {
    if methods.len() > 1 {
        return Err(MethodError::InvalidMethod(methods[1].to_string()).into());
    }
    Ok(())
}

/// Filter items being appended/prepended into an array. Each item passes the
/// element filter individually and is checked for unique-value collisions
/// against both the existing elements and the other incoming items.
fn filter_incoming(
    input: Value,
    working: &[Value],
    opts: &ArrayOpts,
    ctx: &mut FilterCtx,
) -> Result<Vec<Value>> {
    let Value::List(items) = input else {
        return Err(MethodError::InvalidMethodParameters.into());
    };
    if items.is_empty() {
        return Err(MethodError::NotEnoughMethodParameters.into());
    }
    let mut filtered: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        let v = filter_item(item, &[], &opts.element, None, ctx)?;
        check_sibling_dup(
            &opts.element,
            working.iter().chain(filtered.iter()),
            &v,
            &ctx.path_string(),
        )?;
        filtered.push(v);
    }
    Ok(filtered)
}

/// Reject an incoming container element whose unique values collide with a
/// sibling's.
fn check_sibling_dup<'a>(
    element: &SchemaItem,
    siblings: impl Iterator<Item = &'a Value>,
    candidate: &Value,
    column: &str,
) -> Result<()> {
    if !element.item_type().has_unique() {
        return Ok(());
    }
    let mut cand_vals = Vec::new();
    collect_unique_item(element.item_type(), candidate, column, &mut cand_vals);
    if cand_vals.is_empty() {
        return Ok(());
    }
    for sib in siblings {
        let mut sib_vals = Vec::new();
        collect_unique_item(element.item_type(), sib, column, &mut sib_vals);
        if let Some((col, _)) = cand_vals.iter().find(|cv| sib_vals.contains(*cv)) {
            return Err(UniqueError::ValueDuplicate { column: col.clone() }.into());
        }
    }
    Ok(())
}

fn array_index_of(working: &[Value], search: &Value, element: &SchemaItem) -> Result<i64> {
    use super::ItemType;
    let pos = match element.item_type() {
        ItemType::Int { .. } | ItemType::Uint { .. } | ItemType::Float { .. } => {
            let Some(s) = search.as_f64() else {
                return Err(MethodError::InvalidMethodParameters.into());
            };
            working.iter().position(|v| v.as_f64() == Some(s))
        }
        ItemType::String(_) | ItemType::Bool { .. } => working.iter().position(|v| v == search),
        _ => return Err(MethodError::InvalidMethod("*indexOf".into()).into()),
    };
    Ok(pos.map(|i| i as i64).unwrap_or(-1))
}

// ---------------------------------------------------------------------------
// Maps
// ---------------------------------------------------------------------------

pub(crate) fn apply_map_methods(
    mut working: BTreeMap<String, Value>,
    methods: &[MethodToken],
    input: Value,
    opts: &MapOpts,
    ctx: &mut FilterCtx,
) -> Result<Value> {
    let get = ctx.is_get();
    match &methods[0] {
        MethodToken::Name(key) => {
            let existing = working.get(key.as_str());
            let res = filter_item(input, &methods[1..], &opts.element, existing, ctx)?;
            if get {
                Ok(res)
            } else {
                working.insert(key.clone(), res);
                Ok(Value::Map(working))
            }
        }

        MethodToken::Len if get => {
            let n = working.len() as f64;
            let params = params_slice(&input)?;
            if methods.len() == 1 {
                expect_consumed(params, 0)?;
                Ok(Value::Int(n as i64))
            } else {
                apply_number_methods(n, &methods[1..], params, true, false)
            }
        }
        MethodToken::KeyOf if get => {
            let params = params_slice(&input)?;
            let Some(search) = params.first() else {
                return Err(MethodError::NotEnoughMethodParameters.into());
            };
            let key = map_key_of(&working, search, &opts.element)?.unwrap_or_default();
            if methods.len() == 1 {
                expect_consumed(params, 1)?;
                Ok(Value::String(key))
            } else {
                match apply_string_methods(key, &methods[1..], &params[1..], true)? {
                    StringOutcome::Presented(v) => Ok(v),
                    StringOutcome::Mutated(_) => Err(MethodError::InvalidMethodParameters.into()),
                }
            }
        }
        MethodToken::Contains if get => {
            let params = params_slice(&input)?;
            let Some(search) = params.first() else {
                return Err(MethodError::NotEnoughMethodParameters.into());
            };
            let key = map_key_of(&working, search, &opts.element)?;
            terminal(methods, params, 1)?;
            Ok(Value::Bool(key.is_some()))
        }

        MethodToken::Append if !get => {
            final_token(methods)?;
            let Value::Map(incoming) = input else {
                return Err(MethodError::InvalidMethodParameters.into());
            };
            if incoming.is_empty() {
                return Err(MethodError::NotEnoughMethodParameters.into());
            }
            for (key, item) in incoming {
                let v = filter_item(item, &[], &opts.element, None, ctx)?;
                // The value may collide with any entry other than the one
                // being overwritten.
                let siblings = working
                    .iter()
                    .filter(|(k, _)| **k != key)
                    .map(|(_, v)| v);
                check_sibling_dup(&opts.element, siblings, &v, &ctx.path_string())?;
                working.insert(key, v);
            }
            Ok(Value::Map(working))
        }
        MethodToken::Delete if !get => {
            final_token(methods)?;
            let Value::List(keys) = input else {
                return Err(MethodError::InvalidMethodParameters.into());
            };
            for key in &keys {
                let Some(name) = key.as_str() else {
                    return Err(MethodError::InvalidMethodParameters.into());
                };
                working.remove(name);
            }
            Ok(Value::Map(working))
        }

        other => Err(MethodError::InvalidMethod(other.to_string()).into()),
    }
}

fn map_key_of(
    working: &BTreeMap<String, Value>,
    search: &Value,
    element: &SchemaItem,
) -> Result<Option<String>> {
    use super::ItemType;
    let found = match element.item_type() {
        ItemType::Int { .. } | ItemType::Uint { .. } | ItemType::Float { .. } => {
            let Some(s) = search.as_f64() else {
                return Err(MethodError::InvalidMethodParameters.into());
            };
            working.iter().find(|(_, v)| v.as_f64() == Some(s))
        }
        ItemType::String(_) | ItemType::Bool { .. } => working.iter().find(|(_, v)| *v == search),
        _ => return Err(MethodError::InvalidMethod("*keyOf".into()).into()),
    };
    Ok(found.map(|(k, _)| k.clone()))
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// Navigate into an object's sub-column. The token must name a column of the
/// nested schema.
pub(crate) fn apply_object_methods(
    mut tuple: Vec<Value>,
    methods: &[MethodToken],
    input: Value,
    schema: &Schema,
    ctx: &mut FilterCtx,
) -> Result<Value> {
    let MethodToken::Name(field) = &methods[0] else {
        return Err(MethodError::InvalidMethod(methods[0].to_string()).into());
    };
    let Some(item) = schema.get(field) else {
        return Err(MethodError::InvalidMethod(field.clone()).into());
    };
    ctx.push_path(field);
    let res = filter_item(input, &methods[1..], item, tuple.get(item.data_index()), ctx);
    ctx.pop_path();
    let res = res?;
    if ctx.is_get() {
        Ok(res)
    } else {
        tuple[item.data_index()] = res;
        Ok(Value::List(tuple))
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// `*since` / `*until` with an optional unit token (seconds by default).
pub(crate) fn apply_time_methods(t: DateTime<Utc>, methods: &[MethodToken]) -> Result<Value> {
    let dur = match &methods[0] {
        MethodToken::Since => Utc::now() - t,
        MethodToken::Until => t - Utc::now(),
        other => return Err(MethodError::InvalidMethod(other.to_string()).into()),
    };
    if methods.len() > 2 {
        return Err(MethodError::InvalidMethod(methods[2].to_string()).into());
    }
    let secs = dur.num_milliseconds() as f64 / 1000.0;
    let out = match methods.get(1) {
        None | Some(MethodToken::Sec) => secs,
        Some(MethodToken::Mil) => secs * 1000.0,
        Some(MethodToken::Min) => secs / 60.0,
        Some(MethodToken::Hr) => secs / 3600.0,
        Some(MethodToken::Day) => secs / 86400.0,
        Some(other) => return Err(MethodError::InvalidMethod(other.to_string()).into()),
    };
    Ok(Value::Float(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn toks(path: &str) -> (String, Vec<MethodToken>) {
        parse_item_path(path).unwrap()
    }

    #[test]
    fn test_parse_plain_column() {
        let (name, methods) = toks("email");
        assert_eq!(name, "email");
        assert!(methods.is_empty());
    }

    #[test]
    fn test_parse_navigation_and_methods() {
        let (name, methods) = toks("friends.0.name.*append");
        assert_eq!(name, "friends");
        assert_eq!(
            methods,
            vec![
                MethodToken::Name("0".into()),
                MethodToken::Name("name".into()),
                MethodToken::Append,
            ]
        );
    }

    #[test]
    fn test_parse_append_at() {
        let (_, methods) = toks("friends.*append[3]");
        assert_eq!(methods, vec![MethodToken::AppendAt(3)]);
        let (_, methods) = toks("friends.*append[-2]");
        assert_eq!(methods, vec![MethodToken::AppendAt(-2)]);
    }

    #[test]
    fn test_parse_rejects_unknown_method() {
        assert!(parse_item_path("mmr.*frobnicate").is_err());
        assert!(parse_item_path("mmr.*append[x]").is_err());
        assert!(parse_item_path("mmr..name").is_err());
    }

    #[test]
    fn test_number_chain_left_to_right() {
        // (1674 * 1.5) / 2 + 4 - 1 = 1258.5
        let v = apply_number_methods(
            1674.0,
            &[
                MethodToken::Mul,
                MethodToken::Div,
                MethodToken::Add,
                MethodToken::Sub,
            ],
            &[
                Value::Float(1.5),
                Value::Uint(2),
                Value::Uint(4),
                Value::Uint(1),
            ],
            false,
            false,
        )
        .unwrap();
        assert_eq!(v, Value::Float(1258.5));
    }

    #[test]
    fn test_number_comparison_terminates() {
        let v = apply_number_methods(
            1674.0,
            &[MethodToken::Gt],
            &[Value::Uint(1500)],
            true,
            false,
        )
        .unwrap();
        assert_eq!(v, Value::Bool(true));

        // Comparisons are get-only.
        let err = apply_number_methods(
            1674.0,
            &[MethodToken::Gt],
            &[Value::Uint(1500)],
            false,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Method(MethodError::InvalidMethod(_))));
    }

    #[test]
    fn test_number_param_count_mismatch() {
        let err = apply_number_methods(
            1.0,
            &[MethodToken::Add, MethodToken::Sub],
            &[Value::Uint(1)],
            false,
            false,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Method(MethodError::NotEnoughMethodParameters)
        ));

        let err = apply_number_methods(
            1.0,
            &[MethodToken::Add],
            &[Value::Uint(1), Value::Uint(2)],
            false,
            false,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Method(MethodError::TooManyMethodParameters)
        ));
    }

    #[test]
    fn test_mod_truncates_operands() {
        let v = apply_number_methods(
            10.9,
            &[MethodToken::Mod],
            &[Value::Float(3.7)],
            false,
            false,
        )
        .unwrap();
        assert_eq!(v, Value::Float(1.0));

        let err =
            apply_number_methods(10.0, &[MethodToken::Mod], &[Value::Float(0.4)], false, false)
                .unwrap_err();
        assert!(matches!(
            err,
            Error::Method(MethodError::InvalidMethodParameters)
        ));
    }

    #[test]
    fn test_string_append_prepend_insert() {
        let out = apply_string_methods(
            "Mag".into(),
            &[MethodToken::Append],
            &[Value::String("icarp".into())],
            false,
        )
        .unwrap();
        assert!(matches!(out, StringOutcome::Mutated(s) if s == "Magicarp"));

        let out = apply_string_methods(
            "world".into(),
            &[MethodToken::Prepend],
            &[Value::String("hello ".into())],
            false,
        )
        .unwrap();
        assert!(matches!(out, StringOutcome::Mutated(s) if s == "hello world"));

        // Insert clamps into [0, len-1].
        let out = apply_string_methods(
            "ad".into(),
            &[MethodToken::AppendAt(1)],
            &[Value::String("bc".into())],
            false,
        )
        .unwrap();
        assert!(matches!(out, StringOutcome::Mutated(s) if s == "abcd"));

        let out = apply_string_methods(
            "xy".into(),
            &[MethodToken::AppendAt(-5)],
            &[Value::String("!".into())],
            false,
        )
        .unwrap();
        assert!(matches!(out, StringOutcome::Mutated(s) if s == "!xy"));
    }

    #[test]
    fn test_string_get_methods() {
        let v = apply_string_methods("Magicarp".into(), &[MethodToken::Len], &[], true).unwrap();
        assert!(matches!(v, StringOutcome::Presented(Value::Int(8))));

        let v = apply_string_methods(
            "Magicarp".into(),
            &[MethodToken::IndexOf],
            &[Value::String("carp".into())],
            true,
        )
        .unwrap();
        assert!(matches!(v, StringOutcome::Presented(Value::Int(4))));

        let v = apply_string_methods(
            "Magicarp".into(),
            &[MethodToken::Contains],
            &[Value::String("gic".into())],
            true,
        )
        .unwrap();
        assert!(matches!(v, StringOutcome::Presented(Value::Bool(true))));

        // *len collapses to a number; the chain continues under that type.
        let v = apply_string_methods(
            "Magicarp".into(),
            &[MethodToken::Len, MethodToken::Add],
            &[Value::Uint(2)],
            true,
        )
        .unwrap();
        assert!(matches!(v, StringOutcome::Presented(Value::Int(10))));
    }

    #[test]
    fn test_time_methods() {
        let t = Utc::now() - chrono::Duration::seconds(120);
        let Value::Float(mins) =
            apply_time_methods(t, &[MethodToken::Since, MethodToken::Min]).unwrap()
        else {
            panic!("expected float")
        };
        assert!((mins - 2.0).abs() < 0.1, "got {mins}");

        let Value::Float(secs) = apply_time_methods(t, &[MethodToken::Until]).unwrap() else {
            panic!("expected float")
        };
        assert!(secs < 0.0);

        assert!(apply_time_methods(t, &[MethodToken::Add]).is_err());
        assert!(apply_time_methods(t, &[MethodToken::Since, MethodToken::Add]).is_err());
    }
}
