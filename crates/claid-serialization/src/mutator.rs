// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use claid_structures::DataPackage;

use crate::{CodecError, CodecResult, Message, TypeMapping};

type Setter<T> = Arc<dyn Fn(&mut DataPackage, &T) -> CodecResult<()> + Send + Sync>;
type Getter<T> = Arc<dyn Fn(&DataPackage) -> CodecResult<T> + Send + Sync>;

/// Writes values of `T` into package payloads and reads them back.
pub struct Mutator<T> {
    message_type: String,
    setter: Setter<T>,
    getter: Getter<T>,
}

impl<T> Clone for Mutator<T> {
    fn clone(&self) -> Self {
        Self {
            message_type: self.message_type.clone(),
            setter: Arc::clone(&self.setter),
            getter: Arc::clone(&self.getter),
        }
    }
}

impl<T> std::fmt::Debug for Mutator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutator")
            .field("message_type", &self.message_type)
            .finish()
    }
}

impl<T: 'static> Mutator<T> {
    pub fn new(
        message_type: impl Into<String>,
        setter: impl Fn(&mut DataPackage, &T) -> CodecResult<()> + Send + Sync + 'static,
        getter: impl Fn(&DataPackage) -> CodecResult<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            setter: Arc::new(setter),
            getter: Arc::new(getter),
        }
    }

    /// Mutator that carries `T` inside wrapper message `W`.
    pub fn wrapping<W: Message>(
        mapping: &TypeMapping,
        wrap: impl Fn(&T) -> CodecResult<W> + Send + Sync + 'static,
        unwrap: impl Fn(W) -> CodecResult<T> + Send + Sync + 'static,
    ) -> Self {
        let inner = Mutator::<W>::for_message(mapping);
        let getter_inner = inner.clone();
        Self::new(
            W::FULL_NAME,
            move |package, value| inner.set_package_payload(package, &wrap(value)?),
            move |package| unwrap(getter_inner.get_package_payload(package)?),
        )
    }

    /// Type identifier written into every payload this mutator produces.
    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn set_package_payload(&self, package: &mut DataPackage, value: &T) -> CodecResult<()> {
        (self.setter)(package, value)
    }

    pub fn get_package_payload(&self, package: &DataPackage) -> CodecResult<T> {
        (self.getter)(package)
    }
}

impl<M: Message> Mutator<M> {
    pub fn for_message(mapping: &TypeMapping) -> Self {
        let codec = mapping.codec_for(M::FULL_NAME);
        let decode_codec = Arc::clone(&codec);
        Self::new(
            M::FULL_NAME,
            move |package, value: &M| {
                let blob = codec.encode(value).ok_or_else(|| CodecError::TypeMismatch {
                    expected: codec.full_name().to_string(),
                    actual: M::FULL_NAME.to_string(),
                })?;
                package.set_payload(blob);
                Ok(())
            },
            move |package| {
                let blob = package
                    .payload()
                    .ok_or_else(|| CodecError::MissingPayload(package.channel.clone()))?;
                decode_codec.decode::<M>(blob)
            },
        )
    }
}
