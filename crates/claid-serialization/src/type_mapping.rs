// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Example-value driven selection of payload codecs.

use std::collections::HashMap;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use serde_json::Value;

use crate::builtin::{
    BoolVal, DoubleVal, IntVal, NumberArray, NumberMap, StringArray, StringMap, StringVal,
};
use crate::{CodecError, CodecResult, Message, MessageCodec, Mutator};

/// Holds one [`MessageCodec`] per fully qualified message name.
#[derive(Debug, Default)]
pub struct TypeMapping {
    codecs: Mutex<AHashMap<String, Arc<MessageCodec>>>,
}

impl TypeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached codec for `full_name`, created on first use.
    pub fn codec_for(&self, full_name: &str) -> Arc<MessageCodec> {
        let mut codecs = self.codecs.lock();
        Arc::clone(
            codecs
                .entry(full_name.to_string())
                .or_insert_with(|| Arc::new(MessageCodec::new(full_name))),
        )
    }

    pub fn cached_codec_count(&self) -> usize {
        self.codecs.lock().len()
    }

    /// Mutator for the type of `example`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedShape`] when the example cannot be
    /// mapped onto a payload type. Channels are declared with an example, so
    /// the mismatch surfaces at declaration time rather than when data flows.
    pub fn mutator_for<T: ChannelValue>(&self, example: &T) -> CodecResult<Mutator<T>> {
        T::mutator(example, self)
    }
}

/// A value that can travel on a channel.
pub trait ChannelValue: Clone + Send + Sync + 'static {
    fn mutator(example: &Self, mapping: &TypeMapping) -> CodecResult<Mutator<Self>>;
}

/// Integer payloads are 64 bit on the wire; narrower channels reject
/// values they cannot hold instead of wrapping.
fn int_out_of_range(message_type: &str, value: impl std::fmt::Display, target: &str) -> CodecError {
    CodecError::Decode {
        message_type: message_type.to_string(),
        reason: format!("{} does not fit into {}", value, target),
    }
}

/// Whole-number view of a wire double, for integer element types.
fn integer_from_f64<T: TryFrom<i128>>(message_type: &str, value: f64, target: &str) -> CodecResult<T> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(int_out_of_range(message_type, value, target));
    }
    // Saturates far outside every target range, so try_from still rejects.
    T::try_from(value as i128).map_err(|_| int_out_of_range(message_type, value, target))
}

macro_rules! integer_channel_value {
    ($($ty:ty),*) => {
        $(
            impl ChannelValue for $ty {
                fn mutator(_example: &Self, mapping: &TypeMapping) -> CodecResult<Mutator<Self>> {
                    Ok(Mutator::wrapping(
                        mapping,
                        |value: &$ty| {
                            let val = i64::try_from(*value).map_err(|_| CodecError::TypeMismatch {
                                expected: IntVal::FULL_NAME.to_string(),
                                actual: format!("{} {} (exceeds the 64 bit signed range)", stringify!($ty), value),
                            })?;
                            Ok(IntVal { val })
                        },
                        |wrapper: IntVal| {
                            <$ty>::try_from(wrapper.val)
                                .map_err(|_| int_out_of_range(IntVal::FULL_NAME, wrapper.val, stringify!($ty)))
                        },
                    ))
                }
            }
        )*
    };
}

integer_channel_value!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

macro_rules! float_channel_value {
    ($($ty:ty),*) => {
        $(
            impl ChannelValue for $ty {
                fn mutator(_example: &Self, mapping: &TypeMapping) -> CodecResult<Mutator<Self>> {
                    Ok(Mutator::wrapping(
                        mapping,
                        |value: &$ty| Ok(DoubleVal { val: *value as f64 }),
                        |wrapper: DoubleVal| Ok(wrapper.val as $ty),
                    ))
                }
            }
        )*
    };
}

float_channel_value!(f32, f64);

impl ChannelValue for bool {
    fn mutator(_example: &Self, mapping: &TypeMapping) -> CodecResult<Mutator<Self>> {
        Ok(Mutator::wrapping(
            mapping,
            |value: &bool| Ok(BoolVal { val: *value }),
            |wrapper: BoolVal| Ok(wrapper.val),
        ))
    }
}

impl ChannelValue for String {
    fn mutator(_example: &Self, mapping: &TypeMapping) -> CodecResult<Mutator<Self>> {
        Ok(Mutator::wrapping(
            mapping,
            |value: &String| Ok(StringVal { val: value.clone() }),
            |wrapper: StringVal| Ok(wrapper.val),
        ))
    }
}

macro_rules! float_array_channel_value {
    ($($ty:ty),*) => {
        $(
            impl ChannelValue for Vec<$ty> {
                fn mutator(_example: &Self, mapping: &TypeMapping) -> CodecResult<Mutator<Self>> {
                    Ok(Mutator::wrapping(
                        mapping,
                        |values: &Vec<$ty>| Ok(NumberArray {
                            val: values.iter().map(|v| *v as f64).collect(),
                        }),
                        |wrapper: NumberArray| Ok(wrapper.val.into_iter().map(|v| v as $ty).collect()),
                    ))
                }
            }
        )*
    };
}

float_array_channel_value!(f32, f64);

macro_rules! integer_array_channel_value {
    ($($ty:ty),*) => {
        $(
            impl ChannelValue for Vec<$ty> {
                fn mutator(_example: &Self, mapping: &TypeMapping) -> CodecResult<Mutator<Self>> {
                    Ok(Mutator::wrapping(
                        mapping,
                        |values: &Vec<$ty>| Ok(NumberArray {
                            val: values.iter().map(|v| *v as f64).collect(),
                        }),
                        |wrapper: NumberArray| {
                            wrapper
                                .val
                                .into_iter()
                                .map(|v| integer_from_f64::<$ty>(NumberArray::FULL_NAME, v, stringify!($ty)))
                                .collect()
                        },
                    ))
                }
            }
        )*
    };
}

integer_array_channel_value!(i8, i16, i32, i64, u8, u16, u32, u64);

impl ChannelValue for Vec<String> {
    fn mutator(_example: &Self, mapping: &TypeMapping) -> CodecResult<Mutator<Self>> {
        Ok(Mutator::wrapping(
            mapping,
            |values: &Vec<String>| Ok(StringArray { val: values.clone() }),
            |wrapper: StringArray| Ok(wrapper.val),
        ))
    }
}

fn check_single_entry_example<V>(example: &HashMap<String, V>) -> CodecResult<()> {
    if example.len() > 1 {
        return Err(CodecError::UnsupportedShape(format!(
            "map example must hold at most one entry to describe its key/value types, got {}",
            example.len()
        )));
    }
    Ok(())
}

macro_rules! number_map_channel_value {
    ($($ty:ty => $decode:expr),*) => {
        $(
            impl ChannelValue for HashMap<String, $ty> {
                fn mutator(example: &Self, mapping: &TypeMapping) -> CodecResult<Mutator<Self>> {
                    check_single_entry_example(example)?;
                    Ok(Mutator::wrapping(
                        mapping,
                        |values: &HashMap<String, $ty>| Ok(NumberMap {
                            val: values.iter().map(|(k, v)| (k.clone(), *v as f64)).collect(),
                        }),
                        |wrapper: NumberMap| {
                            let decode: fn(f64) -> CodecResult<$ty> = $decode;
                            wrapper
                                .val
                                .into_iter()
                                .map(|(k, v)| decode(v).map(|v| (k, v)))
                                .collect()
                        },
                    ))
                }
            }
        )*
    };
}

number_map_channel_value!(
    f32 => |v| Ok(v as f32),
    f64 => Ok,
    i32 => |v| integer_from_f64(NumberMap::FULL_NAME, v, "i32"),
    i64 => |v| integer_from_f64(NumberMap::FULL_NAME, v, "i64"),
    u32 => |v| integer_from_f64(NumberMap::FULL_NAME, v, "u32"),
    u64 => |v| integer_from_f64(NumberMap::FULL_NAME, v, "u64")
);

impl ChannelValue for HashMap<String, String> {
    fn mutator(example: &Self, mapping: &TypeMapping) -> CodecResult<Mutator<Self>> {
        check_single_entry_example(example)?;
        Ok(Mutator::wrapping(
            mapping,
            |values: &HashMap<String, String>| Ok(StringMap { val: values.clone() }),
            |wrapper: StringMap| Ok(wrapper.val),
        ))
    }
}

/// Runtime shape of a dynamic [`serde_json::Value`] example.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Integer,
    Float,
    Bool,
    String,
    NumberArray,
    StringArray,
    NumberMap,
    StringMap,
}

impl ValueShape {
    pub fn of(value: &Value) -> CodecResult<Self> {
        match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(ValueShape::Integer),
            Value::Number(_) => Ok(ValueShape::Float),
            Value::Bool(_) => Ok(ValueShape::Bool),
            Value::String(_) => Ok(ValueShape::String),
            Value::Array(items) => {
                if items.is_empty() {
                    Err(CodecError::UnsupportedShape(
                        "cannot infer the element type of an empty array".to_string(),
                    ))
                } else if items.iter().all(Value::is_number) {
                    Ok(ValueShape::NumberArray)
                } else if items.iter().all(Value::is_string) {
                    Ok(ValueShape::StringArray)
                } else {
                    Err(CodecError::UnsupportedShape(
                        "arrays must hold only numbers or only strings".to_string(),
                    ))
                }
            }
            Value::Object(entries) => {
                if entries.len() != 1 {
                    return Err(CodecError::UnsupportedShape(format!(
                        "map example must contain exactly one entry, got {}",
                        entries.len()
                    )));
                }
                match entries.values().next() {
                    Some(Value::Number(_)) => Ok(ValueShape::NumberMap),
                    Some(Value::String(_)) => Ok(ValueShape::StringMap),
                    _ => Err(CodecError::UnsupportedShape(
                        "map values must be numbers or strings".to_string(),
                    )),
                }
            }
            Value::Null => Err(CodecError::UnsupportedShape(
                "null has no payload type".to_string(),
            )),
        }
    }
}

fn shape_mismatch(expected: ValueShape, value: &Value) -> CodecError {
    CodecError::TypeMismatch {
        expected: format!("{:?}", expected),
        actual: match ValueShape::of(value) {
            Ok(shape) => format!("{:?}", shape),
            Err(_) => value.to_string(),
        },
    }
}

fn number_of(value: &Value) -> Option<f64> {
    value.as_f64()
}

impl ChannelValue for Value {
    fn mutator(example: &Self, mapping: &TypeMapping) -> CodecResult<Mutator<Self>> {
        let shape = ValueShape::of(example)?;
        let mutator = match shape {
            ValueShape::Integer => Mutator::wrapping(
                mapping,
                move |value: &Value| {
                    value
                        .as_i64()
                        .map(|val| IntVal { val })
                        .ok_or_else(|| shape_mismatch(shape, value))
                },
                |wrapper: IntVal| Ok(Value::from(wrapper.val)),
            ),
            ValueShape::Float => Mutator::wrapping(
                mapping,
                move |value: &Value| {
                    number_of(value)
                        .map(|val| DoubleVal { val })
                        .ok_or_else(|| shape_mismatch(shape, value))
                },
                |wrapper: DoubleVal| Ok(Value::from(wrapper.val)),
            ),
            ValueShape::Bool => Mutator::wrapping(
                mapping,
                move |value: &Value| {
                    value
                        .as_bool()
                        .map(|val| BoolVal { val })
                        .ok_or_else(|| shape_mismatch(shape, value))
                },
                |wrapper: BoolVal| Ok(Value::from(wrapper.val)),
            ),
            ValueShape::String => Mutator::wrapping(
                mapping,
                move |value: &Value| {
                    value
                        .as_str()
                        .map(|val| StringVal { val: val.to_string() })
                        .ok_or_else(|| shape_mismatch(shape, value))
                },
                |wrapper: StringVal| Ok(Value::from(wrapper.val)),
            ),
            ValueShape::NumberArray => Mutator::wrapping(
                mapping,
                move |value: &Value| {
                    value
                        .as_array()
                        .and_then(|items| items.iter().map(number_of).collect::<Option<Vec<_>>>())
                        .map(|val| NumberArray { val })
                        .ok_or_else(|| shape_mismatch(shape, value))
                },
                |wrapper: NumberArray| Ok(Value::from(wrapper.val)),
            ),
            ValueShape::StringArray => Mutator::wrapping(
                mapping,
                move |value: &Value| {
                    value
                        .as_array()
                        .and_then(|items| {
                            items
                                .iter()
                                .map(|item| item.as_str().map(str::to_string))
                                .collect::<Option<Vec<_>>>()
                        })
                        .map(|val| StringArray { val })
                        .ok_or_else(|| shape_mismatch(shape, value))
                },
                |wrapper: StringArray| Ok(Value::from(wrapper.val)),
            ),
            ValueShape::NumberMap => Mutator::wrapping(
                mapping,
                move |value: &Value| {
                    value
                        .as_object()
                        .and_then(|entries| {
                            entries
                                .iter()
                                .map(|(k, v)| number_of(v).map(|n| (k.clone(), n)))
                                .collect::<Option<HashMap<_, _>>>()
                        })
                        .map(|val| NumberMap { val })
                        .ok_or_else(|| shape_mismatch(shape, value))
                },
                |wrapper: NumberMap| Ok(serde_json::to_value(wrapper.val)?),
            ),
            ValueShape::StringMap => Mutator::wrapping(
                mapping,
                move |value: &Value| {
                    value
                        .as_object()
                        .and_then(|entries| {
                            entries
                                .iter()
                                .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                                .collect::<Option<HashMap<_, _>>>()
                        })
                        .map(|val| StringMap { val })
                        .ok_or_else(|| shape_mismatch(shape, value))
                },
                |wrapper: StringMap| Ok(serde_json::to_value(wrapper.val)?),
            ),
        };
        Ok(mutator)
    }
}
