//! Conversions between enum values and their underlying integers

use graphbin_core::{EnumValue, Error, IntegerKind, Result, TypeDefRef, Value};

/// Underlying integer value of an enum
pub(crate) fn enum_payload(e: &EnumValue) -> Result<Value> {
    let kind = e
        .ty
        .enum_underlying()
        .ok_or_else(|| Error::unsupported(e.ty.name(), "not an enum type"))?;
    let bits = e.bits & kind.mask();
    Ok(match kind {
        IntegerKind::I8 => Value::I8(bits as u8 as i8),
        IntegerKind::U8 => Value::U8(bits as u8),
        IntegerKind::I16 => Value::I16(bits as u16 as i16),
        IntegerKind::U16 => Value::U16(bits as u16),
        IntegerKind::I32 => Value::I32(bits as u32 as i32),
        IntegerKind::U32 => Value::U32(bits as u32),
        IntegerKind::I64 => Value::I64(bits as i64),
        IntegerKind::U64 => Value::U64(bits),
    })
}

/// Enum value of `def` from a decoded underlying integer
pub(crate) fn enum_from_payload(def: &TypeDefRef, payload: &Value) -> Result<Value> {
    let bits = match *payload {
        Value::I8(v) => v as u8 as u64,
        Value::U8(v) => v as u64,
        Value::I16(v) => v as u16 as u64,
        Value::U16(v) => v as u64,
        Value::I32(v) => v as u32 as u64,
        Value::U32(v) => v as u64,
        Value::I64(v) => v as u64,
        Value::U64(v) => v,
        _ => {
            return Err(Error::invalid_stream(format!(
                "enum {} has a non-integer payload",
                def.name()
            )))
        }
    };
    let kind = def
        .enum_underlying()
        .ok_or_else(|| Error::invalid_stream(format!("{} is not an enum", def.name())))?;
    Ok(Value::Enum(EnumValue {
        ty: def.clone(),
        bits: bits & kind.mask(),
    }))
}
