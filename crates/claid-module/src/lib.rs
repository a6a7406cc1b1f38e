// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Units ("modules") of the CLAID Rust runtime: lifecycle, channels,
//! annotations and the class factory.
//!
//! A unit implements [`Module`] and [`Describe`], is registered in a
//! [`ModuleFactory`] and is driven by a [`ModuleRunner`]. All of a unit's
//! code runs on the runtime's single execution thread; each unit has its own
//! dispatcher that hands due work to that thread.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod annotator;
mod channel;
mod channel_data;
mod channel_subscriber_publisher;
mod context;
mod diagnostics;
mod error;
mod factory;
mod module;
mod properties;
mod publisher;
mod runner;
mod subscriber;

pub use annotator::ModuleAnnotator;
pub use channel::{Channel, ChannelAccessRights};
pub use channel_data::ChannelData;
pub use channel_subscriber_publisher::ChannelSubscriberPublisher;
pub use context::ModuleContext;
pub use error::{ModuleError, ModuleResult};
pub use factory::{ModuleBundle, ModuleClass, ModuleConstructor, ModuleFactory};
pub use module::{Describe, LifecycleState, Module};
pub use properties::Properties;
pub use publisher::Publisher;
pub use runner::{ManagedModule, ModuleRunner, DEFAULT_LIFECYCLE_TIMEOUT};
pub use subscriber::{AnySubscriber, Subscriber, SubscriberCallback};
