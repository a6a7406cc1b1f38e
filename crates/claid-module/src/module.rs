// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::{ModuleAnnotator, ModuleContext, ModuleResult, Properties};

/// Lifecycle of a unit instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Stopped,
    Initializing,
    Initialized,
    Terminating,
}

/// User-defined behavior of a unit.
///
/// Every hook runs on the runtime's execution thread, the same thread that
/// runs the unit's timers and channel callbacks, so hooks of one unit never
/// run concurrently.
pub trait Module: Sized + Send + 'static {
    /// Declare channels and timers. Publishing and subscribing is only
    /// possible from here.
    fn initialize(&mut self, ctx: &ModuleContext<Self>, properties: &Properties) -> ModuleResult<()>;

    fn terminate(&mut self, _ctx: &ModuleContext<Self>) -> ModuleResult<()> {
        Ok(())
    }

    fn on_connected_to_remote_server(&mut self, _ctx: &ModuleContext<Self>) -> ModuleResult<()> {
        Ok(())
    }

    fn on_disconnected_from_remote_server(&mut self, _ctx: &ModuleContext<Self>) -> ModuleResult<()> {
        Ok(())
    }
}

/// Static description of a unit class, required for registration.
pub trait Describe {
    /// Class name the core refers to. Defaults to the type's name.
    fn module_class() -> String
    where
        Self: Sized,
    {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full).to_string()
    }

    fn describe(annotator: &mut ModuleAnnotator) -> ModuleResult<()>;
}
