// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # CLAID Rust runtime
//!
//! Hosts user-defined processing units ("modules") and connects them to the
//! CLAID middleware core. The core tells the runtime which units to run;
//! the runtime instantiates them, runs their lifecycles on a single
//! serialized execution thread and moves typed channel data between them
//! and the core.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! claid = "0.1"
//! ```
//!
//! ```rust,no_run
//! use claid::prelude::*;
//!
//! #[derive(Default)]
//! struct Heartbeat {
//!     beats: Option<Channel<i64>>,
//!     count: i64,
//! }
//!
//! impl Module for Heartbeat {
//!     fn initialize(&mut self, ctx: &ModuleContext<Self>, _properties: &Properties) -> ModuleResult<()> {
//!         self.beats = Some(ctx.publish("beats", 0_i64));
//!         ctx.register_periodic_function("beat", std::time::Duration::from_secs(1), |hb: &mut Heartbeat, _ctx: &ModuleContext<Heartbeat>| {
//!             hb.count += 1;
//!             if let Some(beats) = &hb.beats {
//!                 beats.post(&hb.count);
//!             }
//!             Ok(())
//!         })
//!     }
//! }
//!
//! impl Describe for Heartbeat {
//!     fn describe(annotator: &mut ModuleAnnotator) -> ModuleResult<()> {
//!         annotator.describe_publish_channel("beats", &0_i64, "beat counter")
//!     }
//! }
//!
//! let claid = Claid::new(load_config_or_default(None).unwrap());
//! claid.register_module::<Heartbeat>().unwrap();
//! claid.start_zmq().unwrap();
//! claid.wait_while_running(std::time::Duration::from_millis(500));
//! ```
//!
//! ## Feature Flags
//!
//! - **`file-logging`**: non-blocking file output for `init_logging`.

pub use claid_config as config;
pub use claid_io as io;
pub use claid_module as module;
pub use claid_observability as observability;
pub use claid_runtime as runtime;
pub use claid_scheduling as scheduling;
pub use claid_serialization as serialization;
pub use claid_structures as structures;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use claid_config::{load_config, load_config_or_default, RuntimeConfig};
    pub use claid_io::{CoreTransport, MemoryCore, ZmqCoreTransport};
    pub use claid_module::{
        Channel, ChannelData, Describe, Module, ModuleAnnotator, ModuleBundle, ModuleContext,
        ModuleError, ModuleResult, Properties,
    };
    pub use claid_observability::{Logger, MemorySink};
    pub use claid_runtime::{Claid, ModuleManager, RuntimeError};
    pub use claid_structures::{DataPackage, LogMessageSeverityLevel, Runtime};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        let claid = Claid::new(RuntimeConfig::default());
        assert!(!claid.is_running());
    }
}
