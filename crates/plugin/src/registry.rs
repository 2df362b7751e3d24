//! String→constructor registries for source and sink plugins.

use crate::sinks::{FileSink, LogSink};
use crate::sources::{FileSource, StaticSource};
use crate::{PluginError, Result, SinkPlugin, SourcePlugin};
use std::collections::HashMap;

type SourceCtor = Box<dyn Fn(&serde_yaml::Value) -> Result<Box<dyn SourcePlugin>> + Send + Sync>;
type SinkCtor = Box<dyn Fn(&serde_yaml::Value) -> Result<Box<dyn SinkPlugin>> + Send + Sync>;

/// Maps a service's `type` tag to a constructor that parses its `spec` into
/// a typed plugin instance (§9).
pub struct SourceRegistry {
    constructors: HashMap<String, SourceCtor>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// The two built-in reference source plugins (§0/§2 of the expanded
    /// spec): `file` and `static`.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register("file", |spec| {
            let parsed: FileSource = serde_yaml::from_value(spec.clone())?;
            Ok(Box::new(parsed) as Box<dyn SourcePlugin>)
        });
        reg.register("static", |spec| {
            let parsed: StaticSource = serde_yaml::from_value(spec.clone())?;
            Ok(Box::new(parsed) as Box<dyn SourcePlugin>)
        });
        reg
    }

    pub fn register(
        &mut self,
        type_name: &str,
        ctor: impl Fn(&serde_yaml::Value) -> Result<Box<dyn SourcePlugin>> + Send + Sync + 'static,
    ) {
        self.constructors.insert(type_name.to_string(), Box::new(ctor));
    }

    /// Dispatch `spec` to the plugin registered under `type_name` (§9: "the
    /// source stores spec as an untyped mapping and re-marshals to dispatch
    /// to a typed plugin parser").
    pub fn build(&self, type_name: &str, spec: &serde_yaml::Value) -> Result<Box<dyn SourcePlugin>> {
        let ctor = self
            .constructors
            .get(type_name)
            .ok_or_else(|| PluginError::UnknownType(type_name.to_string()))?;
        ctor(spec)
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Maps a publisher's `type` tag to a constructor for its sink plugin.
pub struct SinkRegistry {
    constructors: HashMap<String, SinkCtor>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// The two built-in reference sink plugins: `file` and `log`.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register("file", |spec| {
            let parsed: FileSink = serde_yaml::from_value(spec.clone())?;
            Ok(Box::new(parsed) as Box<dyn SinkPlugin>)
        });
        reg.register("log", |spec| {
            let parsed: LogSink = serde_yaml::from_value(spec.clone())?;
            Ok(Box::new(parsed) as Box<dyn SinkPlugin>)
        });
        reg
    }

    pub fn register(
        &mut self,
        type_name: &str,
        ctor: impl Fn(&serde_yaml::Value) -> Result<Box<dyn SinkPlugin>> + Send + Sync + 'static,
    ) {
        self.constructors.insert(type_name.to_string(), Box::new(ctor));
    }

    pub fn build(&self, type_name: &str, spec: &serde_yaml::Value) -> Result<Box<dyn SinkPlugin>> {
        let ctor = self
            .constructors
            .get(type_name)
            .ok_or_else(|| PluginError::UnknownType(type_name.to_string()))?;
        ctor(spec)
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_source_type_is_rejected() {
        let reg = SourceRegistry::with_builtins();
        let err = reg.build("nonexistent", &serde_yaml::Value::Null).unwrap_err();
        assert!(matches!(err, PluginError::UnknownType(_)));
    }

    #[test]
    fn builds_file_source_from_spec() {
        let reg = SourceRegistry::with_builtins();
        let spec: serde_yaml::Value = serde_yaml::from_str("file: /tmp/backends.txt\n").unwrap();
        let plugin = reg.build("file", &spec).unwrap();
        assert_eq!(plugin.name(), "fileSource");
    }
}
