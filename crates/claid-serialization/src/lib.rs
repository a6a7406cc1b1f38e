// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # claid-serialization
//!
//! Codec registry for channel payloads.
//!
//! A channel is declared with an *example value*. [`TypeMapping::mutator_for`]
//! inspects that example and returns a [`Mutator`] that writes values of the
//! same type into a [`DataPackage`](claid_structures::DataPackage) payload and
//! reads them back out. Every payload is a schema-defined [`Message`]: plain
//! numbers, strings, arrays and maps travel inside the built-in wrapper
//! messages of [`builtin`], and applications declare their own message types
//! with [`claid_message!`].
//!
//! ```
//! use claid_serialization::TypeMapping;
//! use claid_structures::DataPackage;
//!
//! let mapping = TypeMapping::new();
//! let mutator = mapping.mutator_for(&0_i32).unwrap();
//!
//! let mut package = DataPackage::default();
//! mutator.set_package_payload(&mut package, &42).unwrap();
//! assert_eq!(package.message_type(), "claidservice.IntVal");
//! assert_eq!(mutator.get_package_payload(&package).unwrap(), 42);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod builtin;
mod error;
mod message;
mod message_codec;
mod mutator;
mod type_mapping;

pub use error::{CodecError, CodecResult};
pub use message::{AnyMessage, Message};
pub use message_codec::MessageCodec;
pub use mutator::Mutator;
pub use type_mapping::{ChannelValue, TypeMapping, ValueShape};
