// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::CodecResult;

/// A schema-defined structured message.
///
/// `FULL_NAME` is the fully qualified type name used as the payload's type
/// identifier; two runtimes exchanging a message must agree on it.
pub trait Message: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    const FULL_NAME: &'static str;
}

/// Object-safe view of a [`Message`], used where the concrete type is only
/// known at run time (codec type checks).
pub trait AnyMessage: Send + Sync {
    fn full_name(&self) -> &str;
    fn encode_bytes(&self) -> CodecResult<Vec<u8>>;
}

impl<M: Message> AnyMessage for M {
    fn full_name(&self) -> &str {
        M::FULL_NAME
    }

    fn encode_bytes(&self) -> CodecResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Declare a serde type as a CLAID message and make it usable as a channel
/// value.
///
/// ```
/// use claid_serialization::{claid_message, TypeMapping};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// pub struct AccelerationSample {
///     pub x: f64,
///     pub y: f64,
///     pub z: f64,
/// }
/// claid_message!(AccelerationSample, "claid.AccelerationSample");
///
/// let mutator = TypeMapping::new()
///     .mutator_for(&AccelerationSample::default())
///     .unwrap();
/// assert_eq!(mutator.message_type(), "claid.AccelerationSample");
/// ```
#[macro_export]
macro_rules! claid_message {
    ($ty:ty, $full_name:expr) => {
        impl $crate::Message for $ty {
            const FULL_NAME: &'static str = $full_name;
        }

        impl $crate::ChannelValue for $ty {
            fn mutator(
                _example: &Self,
                mapping: &$crate::TypeMapping,
            ) -> $crate::CodecResult<$crate::Mutator<Self>> {
                Ok($crate::Mutator::for_message(mapping))
            }
        }
    };
}
