// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Class name to constructor table, including classes injected at runtime
//! from plugin bundles.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use claid_observability::Logger;
use claid_structures::ModuleAnnotation;
use tracing::{debug, info};

use crate::{
    Describe, ManagedModule, Module, ModuleAnnotator, ModuleError, ModuleResult, ModuleRunner,
};

pub type ModuleConstructor =
    Arc<dyn Fn(&str, Arc<Logger>) -> Arc<dyn ManagedModule> + Send + Sync>;

/// A registered unit class: its constructor and its annotation.
#[derive(Clone)]
pub struct ModuleClass {
    name: String,
    constructor: ModuleConstructor,
    annotation: ModuleAnnotation,
}

impl ModuleClass {
    /// Class backed by `M::default()`.
    pub fn of<M: Module + Describe + Default>() -> ModuleResult<Self> {
        let class_name = M::module_class();
        Self::with_constructor::<M>(Arc::new(move |id: &str, logger: Arc<Logger>| {
            Arc::new(ModuleRunner::new(id, class_name.clone(), M::default(), logger))
                as Arc<dyn ManagedModule>
        }))
    }

    /// Class with a custom constructor; the annotation still comes from
    /// `M::describe`.
    pub fn with_constructor<M: Module + Describe>(constructor: ModuleConstructor) -> ModuleResult<Self> {
        let name = M::module_class();
        let mut annotator = ModuleAnnotator::new(name.clone());
        M::describe(&mut annotator)?;
        Ok(Self {
            name,
            constructor,
            annotation: annotator.into_annotation(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn annotation(&self) -> &ModuleAnnotation {
        &self.annotation
    }

    pub fn instantiate(&self, id: &str, logger: Arc<Logger>) -> Arc<dyn ManagedModule> {
        (self.constructor)(id, logger)
    }
}

impl std::fmt::Debug for ModuleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleClass").field("name", &self.name).finish()
    }
}

/// Unit classes shipped together under one source-file name. Config uploads
/// name the file and the classes to take from it.
#[derive(Debug, Clone, Default)]
pub struct ModuleBundle {
    classes: Vec<ModuleClass>,
}

impl ModuleBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module<M: Module + Describe + Default>(mut self) -> ModuleResult<Self> {
        self.classes.push(ModuleClass::of::<M>()?);
        Ok(self)
    }

    pub fn with_class(mut self, class: ModuleClass) -> Self {
        self.classes.push(class);
        self
    }

    pub fn class_names(&self) -> Vec<&str> {
        self.classes.iter().map(|c| c.name()).collect()
    }

    fn find(&self, name: &str) -> Option<&ModuleClass> {
        self.classes.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Default)]
pub struct ModuleFactory {
    builtin: HashMap<String, ModuleClass>,
    injected: HashMap<String, ModuleClass>,
    plugins: HashMap<String, ModuleBundle>,
}

impl ModuleFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_module<M: Module + Describe + Default>(&mut self) -> ModuleResult<()> {
        self.register_class(ModuleClass::of::<M>()?);
        Ok(())
    }

    pub fn register_module_with<M: Module + Describe>(
        &mut self,
        constructor: ModuleConstructor,
    ) -> ModuleResult<()> {
        self.register_class(ModuleClass::with_constructor::<M>(constructor)?);
        Ok(())
    }

    pub fn register_class(&mut self, class: ModuleClass) {
        debug!("[FACTORY] registered module class {}", class.name);
        self.builtin.insert(class.name.clone(), class);
    }

    /// Make a bundle available for later injection under `file_name`.
    pub fn register_plugin(&mut self, file_name: impl Into<String>, bundle: ModuleBundle) {
        self.plugins.insert(file_name.into(), bundle);
    }

    /// Inject `class_names` from the bundle registered for `module_file`.
    /// The file is looked up joined to `payload_path` first, then by its
    /// bare file name.
    pub fn inject_modules(
        &mut self,
        payload_path: &str,
        module_file: &str,
        class_names: &[String],
    ) -> ModuleResult<()> {
        let joined = Path::new(payload_path).join(module_file);
        let bare = Path::new(module_file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| module_file.to_string());

        let bundle = self
            .plugins
            .get(joined.to_string_lossy().as_ref())
            .or_else(|| self.plugins.get(module_file))
            .or_else(|| self.plugins.get(&bare))
            .ok_or_else(|| {
                ModuleError::Injection(format!(
                    "no module bundle registered for \"{}\"",
                    joined.display()
                ))
            })?;

        let mut classes = Vec::with_capacity(class_names.len());
        for name in class_names {
            let class = bundle.find(name).ok_or_else(|| {
                ModuleError::Injection(format!(
                    "module class \"{}\" not found in \"{}\"",
                    name, module_file
                ))
            })?;
            classes.push(class.clone());
        }

        for class in classes {
            info!("[FACTORY] injected module class {} from {}", class.name, module_file);
            self.injected.insert(class.name.clone(), class);
        }
        Ok(())
    }

    fn lookup(&self, class_name: &str) -> Option<&ModuleClass> {
        self.injected
            .get(class_name)
            .or_else(|| self.builtin.get(class_name))
    }

    pub fn is_module_class_registered(&self, class_name: &str) -> bool {
        self.lookup(class_name).is_some()
    }

    /// Built-in and injected class names, sorted.
    pub fn get_registered_module_classes(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .builtin
            .keys()
            .chain(self.injected.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn get_injected_module_classes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.injected.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get_module_annotation(&self, class_name: &str) -> Option<&ModuleAnnotation> {
        self.lookup(class_name).map(ModuleClass::annotation)
    }

    pub fn get_module_annotations(&self) -> HashMap<String, ModuleAnnotation> {
        self.get_registered_module_classes()
            .into_iter()
            .filter_map(|name| {
                let annotation = self.get_module_annotation(&name)?.clone();
                Some((name, annotation))
            })
            .collect()
    }

    pub fn registered_modules_summary(&self) -> String {
        let rows: BTreeMap<String, &str> = self
            .get_registered_module_classes()
            .into_iter()
            .map(|name| {
                let origin = if self.injected.contains_key(&name) { "injected" } else { "builtin" };
                (name, origin)
            })
            .collect();
        let mut summary = format!("{} registered module classes", rows.len());
        for (name, origin) in rows {
            summary.push_str(&format!("\n  {} ({})", name, origin));
        }
        summary
    }

    pub fn create_module(
        &self,
        id: &str,
        class_name: &str,
        logger: Arc<Logger>,
    ) -> ModuleResult<Arc<dyn ManagedModule>> {
        self.lookup(class_name)
            .map(|class| class.instantiate(id, logger))
            .ok_or_else(|| ModuleError::UnknownClass(class_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ModuleContext, Properties};
    use claid_structures::Runtime;

    #[derive(Default)]
    struct Blinker;

    impl Module for Blinker {
        fn initialize(&mut self, _ctx: &ModuleContext<Self>, _properties: &Properties) -> ModuleResult<()> {
            Ok(())
        }
    }

    impl Describe for Blinker {
        fn describe(annotator: &mut ModuleAnnotator) -> ModuleResult<()> {
            annotator.set_module_category("Demo");
            annotator.describe_publish_channel("state", &false, "on/off")
        }
    }

    #[derive(Default)]
    struct Recorder;

    impl Module for Recorder {
        fn initialize(&mut self, _ctx: &ModuleContext<Self>, _properties: &Properties) -> ModuleResult<()> {
            Ok(())
        }
    }

    impl Describe for Recorder {
        fn module_class() -> String {
            "AudioRecorder".to_string()
        }

        fn describe(annotator: &mut ModuleAnnotator) -> ModuleResult<()> {
            annotator.make_injectable();
            Ok(())
        }
    }

    #[test]
    fn test_register_and_create() {
        let mut factory = ModuleFactory::new();
        factory.register_module::<Blinker>().unwrap();

        assert!(factory.is_module_class_registered("Blinker"));
        assert_eq!(
            factory.get_module_annotation("Blinker").unwrap().module_category,
            "Demo"
        );

        let module = factory
            .create_module("blink1", "Blinker", Logger::console(Runtime::Rust))
            .unwrap();
        assert_eq!(module.id(), "blink1");
        assert_eq!(module.module_class(), "Blinker");
    }

    #[test]
    fn test_unknown_class_is_rejected() {
        let factory = ModuleFactory::new();
        let result = factory.create_module("x", "Nope", Logger::console(Runtime::Rust));
        assert!(matches!(result, Err(ModuleError::UnknownClass(name)) if name == "Nope"));
    }

    #[test]
    fn test_inject_from_registered_bundle() {
        let mut factory = ModuleFactory::new();
        factory.register_module::<Blinker>().unwrap();
        factory.register_plugin(
            "recorder_plugin.rs",
            ModuleBundle::new().with_module::<Recorder>().unwrap(),
        );

        assert!(!factory.is_module_class_registered("AudioRecorder"));
        factory
            .inject_modules("/tmp/payload", "recorder_plugin.rs", &["AudioRecorder".to_string()])
            .unwrap();

        assert!(factory.is_module_class_registered("AudioRecorder"));
        assert_eq!(factory.get_injected_module_classes(), vec!["AudioRecorder"]);
        assert_eq!(
            factory.get_registered_module_classes(),
            vec!["AudioRecorder", "Blinker"]
        );
        assert!(factory.get_module_annotations()["AudioRecorder"].is_injectable);
        assert!(factory.registered_modules_summary().contains("AudioRecorder (injected)"));
    }

    #[test]
    fn test_inject_missing_file_or_class_fails() {
        let mut factory = ModuleFactory::new();
        factory.register_plugin("a.rs", ModuleBundle::new().with_module::<Recorder>().unwrap());

        assert!(matches!(
            factory.inject_modules("/p", "b.rs", &["AudioRecorder".to_string()]),
            Err(ModuleError::Injection(_))
        ));
        assert!(matches!(
            factory.inject_modules("/p", "a.rs", &["Blinker".to_string()]),
            Err(ModuleError::Injection(_))
        ));
        assert!(factory.get_injected_module_classes().is_empty());
    }
}
