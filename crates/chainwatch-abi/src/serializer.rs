//! ABI-driven binary → JSON deserialization.
//!
//! Rendering follows the node's own JSON conventions:
//! - 64-bit integers outside ±`u32::MAX` and all 128-bit integers are strings
//! - `bytes`, checksums and `float128` are hex
//! - `asset` is `"1.0000 EOS"`, `symbol` is `"4,EOS"`
//! - a variant is `["type_name", value]`
//! - a missing trailing binary extension (`T$`) is omitted from its struct

use chainwatch_core::{ActionSerializer, Name, PayloadError};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Number, Value};
use std::collections::HashMap;
use std::time::Instant;

use crate::abi::{AbiDef, StructDef, VariantDef};
use crate::error::AbiError;
use crate::reader::Reader;

/// Nesting limit for structs, arrays, optionals and typedef chains.
pub const MAX_DEPTH: usize = 32;

/// Types every ABI may use without declaring them.
pub const BUILTIN_TYPES: &[&str] = &[
    "bool",
    "int8",
    "uint8",
    "int16",
    "uint16",
    "int32",
    "uint32",
    "int64",
    "uint64",
    "int128",
    "uint128",
    "varint32",
    "varuint32",
    "float32",
    "float64",
    "float128",
    "time_point",
    "time_point_sec",
    "block_timestamp_type",
    "name",
    "bytes",
    "string",
    "checksum160",
    "checksum256",
    "checksum512",
    "symbol",
    "symbol_code",
    "asset",
    "extended_asset",
];

const BLOCK_TIMESTAMP_EPOCH_MS: i64 = 946_684_800_000;
const BLOCK_INTERVAL_MS: i64 = 500;
const MAX_ASSET_PRECISION: u8 = 18;

// ─── AbiSerializer ────────────────────────────────────────────────────────────

/// A validated ABI, indexed for decoding.
#[derive(Debug, Clone)]
pub struct AbiSerializer {
    version: String,
    typedefs: HashMap<String, String>,
    structs: HashMap<String, StructDef>,
    variants: HashMap<String, VariantDef>,
    actions: HashMap<Name, String>,
}

impl AbiSerializer {
    /// Index `abi` and check that every referenced type resolves.
    pub fn new(abi: AbiDef) -> Result<Self, AbiError> {
        let mut ser = Self {
            version: abi.version,
            typedefs: HashMap::new(),
            structs: HashMap::new(),
            variants: HashMap::new(),
            actions: HashMap::new(),
        };

        for td in abi.types {
            if ser.typedefs.insert(td.new_type_name.clone(), td.type_name).is_some() {
                return Err(AbiError::Invalid(format!("duplicate type '{}'", td.new_type_name)));
            }
        }
        for sd in abi.structs {
            if ser.structs.contains_key(&sd.name) {
                return Err(AbiError::Invalid(format!("duplicate struct '{}'", sd.name)));
            }
            ser.structs.insert(sd.name.clone(), sd);
        }
        for vd in abi.variants {
            if ser.variants.contains_key(&vd.name) {
                return Err(AbiError::Invalid(format!("duplicate variant '{}'", vd.name)));
            }
            ser.variants.insert(vd.name.clone(), vd);
        }
        for ad in abi.actions {
            if ser.actions.insert(ad.name, ad.type_name).is_some() {
                return Err(AbiError::Invalid(format!("duplicate action '{}'", ad.name)));
            }
        }

        ser.validate()?;
        Ok(ser)
    }

    pub fn from_json(json: &str) -> Result<Self, AbiError> {
        Self::new(AbiDef::from_json(json)?)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Follows typedefs to the underlying type name.
    pub fn resolve<'a>(&'a self, mut ty: &'a str) -> Result<&'a str, PayloadError> {
        for _ in 0..MAX_DEPTH {
            match self.typedefs.get(ty) {
                Some(next) => ty = next,
                None => return Ok(ty),
            }
        }
        Err(PayloadError::Malformed(format!("typedef chain for '{ty}' too deep")))
    }

    fn is_known(&self, ty: &str) -> bool {
        let ty = strip_modifiers(ty);
        let Ok(ty) = self.resolve(ty) else {
            return false;
        };
        let ty = strip_modifiers(ty);
        BUILTIN_TYPES.contains(&ty) || self.structs.contains_key(ty) || self.variants.contains_key(ty)
    }

    fn validate(&self) -> Result<(), AbiError> {
        let check = |context: String, ty: &str| -> Result<(), AbiError> {
            if self.is_known(ty) {
                Ok(())
            } else {
                Err(AbiError::UnknownType {
                    context,
                    type_name: ty.to_string(),
                })
            }
        };

        for (alias, target) in &self.typedefs {
            if self.resolve(alias).is_err() {
                return Err(AbiError::Invalid(format!("typedef '{alias}' is cyclic")));
            }
            check(format!("typedef '{alias}'"), target)?;
        }

        for sd in self.structs.values() {
            if !sd.base.is_empty() {
                self.base_chain_depth(sd)?;
            }
            for field in &sd.fields {
                let ty = field.type_name.strip_suffix('$').unwrap_or(&field.type_name);
                check(format!("field '{}.{}'", sd.name, field.name), ty)?;
            }
        }

        for vd in self.variants.values() {
            for ty in &vd.types {
                check(format!("variant '{}'", vd.name), ty)?;
            }
        }

        for (action, ty) in &self.actions {
            check(format!("action '{action}'"), ty)?;
        }
        Ok(())
    }

    fn base_chain_depth(&self, sd: &StructDef) -> Result<usize, AbiError> {
        let mut current = sd;
        for depth in 0..MAX_DEPTH {
            if current.base.is_empty() {
                return Ok(depth);
            }
            let base = self.resolve(&current.base).unwrap_or(current.base.as_str());
            current = self.structs.get(base).ok_or_else(|| AbiError::UnknownType {
                context: format!("base of struct '{}'", current.name),
                type_name: current.base.clone(),
            })?;
        }
        Err(AbiError::Invalid(format!("struct '{}' has a cyclic or too deep base chain", sd.name)))
    }

    /// Decode `data` as `type_name`.
    pub fn decode(&self, type_name: &str, data: &[u8], deadline: Instant) -> Result<Value, PayloadError> {
        let mut decoding = Decoding {
            abi: self,
            reader: Reader::new(data),
            deadline,
        };
        let value = decoding.value(type_name, 0)?;
        if !decoding.reader.is_empty() {
            tracing::debug!(
                type_name,
                trailing = decoding.reader.remaining(),
                "Payload has trailing bytes after decode"
            );
        }
        Ok(value)
    }
}

impl ActionSerializer for AbiSerializer {
    fn action_type(&self, action: Name) -> Option<String> {
        self.actions.get(&action).cloned()
    }

    fn binary_to_value(&self, type_name: &str, data: &[u8], deadline: Instant) -> Result<Value, PayloadError> {
        self.decode(type_name, data, deadline)
    }
}

fn strip_modifiers(mut ty: &str) -> &str {
    loop {
        if let Some(inner) = ty.strip_suffix("[]") {
            ty = inner;
        } else if let Some(inner) = ty.strip_suffix('?') {
            ty = inner;
        } else {
            return ty;
        }
    }
}

// ─── Decoding ─────────────────────────────────────────────────────────────────

struct Decoding<'s, 'b> {
    abi: &'s AbiSerializer,
    reader: Reader<'b>,
    deadline: Instant,
}

impl<'s, 'b> Decoding<'s, 'b> {
    fn value(&mut self, ty: &str, depth: usize) -> Result<Value, PayloadError> {
        if Instant::now() >= self.deadline {
            return Err(PayloadError::DeadlineExceeded);
        }
        if depth > MAX_DEPTH {
            return Err(PayloadError::Malformed(format!("nesting deeper than {MAX_DEPTH} levels")));
        }

        let abi = self.abi;
        let ty = abi.resolve(ty)?;

        if let Some(elem) = ty.strip_suffix("[]") {
            let len = self.reader.varuint32()? as usize;
            if len > self.reader.remaining() {
                return Err(PayloadError::Malformed(format!(
                    "array of {len} elements exceeds remaining {} bytes",
                    self.reader.remaining()
                )));
            }
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(self.value(elem, depth + 1)?);
            }
            return Ok(Value::Array(items));
        }

        if let Some(inner) = ty.strip_suffix('?') {
            return match self.reader.u8()? {
                0 => Ok(Value::Null),
                _ => self.value(inner, depth + 1),
            };
        }

        if let Some(vd) = abi.variants.get(ty) {
            let index = self.reader.varuint32()? as usize;
            let member = vd.types.get(index).ok_or_else(|| {
                PayloadError::Malformed(format!("variant '{}' has no member {index}", vd.name))
            })?;
            let inner = self.value(member, depth + 1)?;
            return Ok(Value::Array(vec![Value::String(member.clone()), inner]));
        }

        if let Some(sd) = abi.structs.get(ty) {
            let mut out = Map::new();
            self.fields_into(sd, depth + 1, &mut out)?;
            return Ok(Value::Object(out));
        }

        self.builtin(ty)?
            .ok_or_else(|| PayloadError::Malformed(format!("unknown type '{ty}'")))
    }

    fn fields_into(&mut self, sd: &'s StructDef, depth: usize, out: &mut Map<String, Value>) -> Result<(), PayloadError> {
        if depth > MAX_DEPTH {
            return Err(PayloadError::Malformed(format!("nesting deeper than {MAX_DEPTH} levels")));
        }
        let abi = self.abi;
        if !sd.base.is_empty() {
            let base_name = abi.resolve(&sd.base)?;
            let base = abi.structs.get(base_name).ok_or_else(|| {
                PayloadError::Malformed(format!("base '{}' of '{}' is not a struct", sd.base, sd.name))
            })?;
            self.fields_into(base, depth + 1, out)?;
        }

        for field in &sd.fields {
            let value = match field.type_name.strip_suffix('$') {
                Some(_) if self.reader.is_empty() => break,
                Some(inner) => self.value(inner, depth + 1)?,
                None => self.value(&field.type_name, depth + 1)?,
            };
            out.insert(field.name.clone(), value);
        }
        Ok(())
    }

    fn builtin(&mut self, ty: &str) -> Result<Option<Value>, PayloadError> {
        let r = &mut self.reader;
        let value = match ty {
            "bool" => Value::Bool(r.u8()? != 0),
            "int8" => json!(r.u8()? as i8),
            "uint8" => json!(r.u8()?),
            "int16" => json!(r.u16()? as i16),
            "uint16" => json!(r.u16()?),
            "int32" => json!(r.u32()? as i32),
            "uint32" => json!(r.u32()?),
            "int64" => int64(r.i64()?),
            "uint64" => uint64(r.u64()?),
            "int128" => Value::String((r.u128()? as i128).to_string()),
            "uint128" => Value::String(r.u128()?.to_string()),
            "varint32" => json!(r.varint32()?),
            "varuint32" => json!(r.varuint32()?),
            "float32" => float(f32::from_le_bytes(r.fixed()?).into()),
            "float64" => float(f64::from_le_bytes(r.fixed()?)),
            "float128" => hex_string(r.take(16)?),
            "time_point" => {
                let micros = r.i64()?;
                let at = DateTime::<Utc>::from_timestamp_micros(micros)
                    .ok_or_else(|| out_of_range("time_point", micros))?;
                Value::String(at.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
            }
            "time_point_sec" => {
                let secs = r.u32()?;
                let at = DateTime::<Utc>::from_timestamp(i64::from(secs), 0)
                    .ok_or_else(|| out_of_range("time_point_sec", secs))?;
                Value::String(at.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            "block_timestamp_type" => {
                let slot = r.u32()?;
                let ms = BLOCK_TIMESTAMP_EPOCH_MS + i64::from(slot) * BLOCK_INTERVAL_MS;
                let at = DateTime::<Utc>::from_timestamp_millis(ms)
                    .ok_or_else(|| out_of_range("block_timestamp_type", slot))?;
                Value::String(at.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
            }
            "name" => Value::String(Name::from_u64(r.u64()?).to_string()),
            "bytes" => Value::String(hex::encode(r.prefixed()?)),
            "string" => {
                let raw = r.prefixed()?;
                let s = std::str::from_utf8(raw)
                    .map_err(|e| PayloadError::Malformed(format!("string is not UTF-8: {e}")))?;
                Value::String(s.to_string())
            }
            "checksum160" => Value::String(hex::encode(r.take(20)?)),
            "checksum256" => Value::String(hex::encode(r.take(32)?)),
            "checksum512" => Value::String(hex::encode(r.take(64)?)),
            "symbol_code" => Value::String(symbol_code(r.u64()?)?),
            "symbol" => {
                let (precision, code) = symbol(r.u64()?)?;
                Value::String(format!("{precision},{code}"))
            }
            "asset" => Value::String(asset(r)?),
            "extended_asset" => {
                let quantity = asset(r)?;
                let contract = Name::from_u64(r.u64()?);
                json!({ "quantity": quantity, "contract": contract.to_string() })
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}

// ─── Rendering helpers ────────────────────────────────────────────────────────

fn uint64(v: u64) -> Value {
    if v > u64::from(u32::MAX) {
        Value::String(v.to_string())
    } else {
        json!(v)
    }
}

fn int64(v: i64) -> Value {
    if v.unsigned_abs() > u64::from(u32::MAX) {
        Value::String(v.to_string())
    } else {
        json!(v)
    }
}

fn float(v: f64) -> Value {
    Number::from_f64(v).map_or_else(|| Value::String(v.to_string()), Value::Number)
}

fn hex_string(bytes: &[u8]) -> Value {
    Value::String(format!("0x{}", hex::encode(bytes)))
}

fn out_of_range(ty: &str, raw: impl std::fmt::Display) -> PayloadError {
    PayloadError::Malformed(format!("{ty} value {raw} out of range"))
}

fn symbol_code(raw: u64) -> Result<String, PayloadError> {
    let bytes = raw.to_le_bytes();
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    if bytes[len..].iter().any(|&b| b != 0) || !bytes[..len].iter().all(u8::is_ascii_uppercase) {
        return Err(PayloadError::Malformed(format!("invalid symbol code {raw:#x}")));
    }
    Ok(bytes[..len].iter().map(|&b| b as char).collect())
}

fn symbol(raw: u64) -> Result<(u8, String), PayloadError> {
    let precision = (raw & 0xff) as u8;
    if precision > MAX_ASSET_PRECISION {
        return Err(PayloadError::Malformed(format!("symbol precision {precision} above {MAX_ASSET_PRECISION}")));
    }
    Ok((precision, symbol_code(raw >> 8)?))
}

fn asset(r: &mut Reader<'_>) -> Result<String, PayloadError> {
    let amount = r.i64()?;
    let (precision, code) = symbol(r.u64()?)?;
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    if precision == 0 {
        return Ok(format!("{sign}{abs} {code}"));
    }
    let scale = 10u64.pow(u32::from(precision));
    Ok(format!(
        "{sign}{}.{:0width$} {code}",
        abs / scale,
        abs % scale,
        width = usize::from(precision)
    ))
}
