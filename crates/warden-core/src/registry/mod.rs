//! Static, ordered list of task definitions.
use std::{collections::HashSet, fmt, sync::Arc, time::Duration};

use warden_model::{DurationMs, TaskName};

use crate::{error::CoreError, task::WorkRef};

/// Declarative description of one background task.
///
/// Immutable once built; the registry validates it.
#[derive(Clone)]
pub struct TaskDefinition {
    name: TaskName,
    work: WorkRef,
    interval_ms: DurationMs,
    initial_delay_ms: DurationMs,
}

impl TaskDefinition {
    /// Task that runs immediately at scheduler start and then every `interval_ms`.
    pub fn new(name: impl Into<TaskName>, work: WorkRef, interval_ms: DurationMs) -> Self {
        Self {
            name: name.into(),
            work,
            interval_ms,
            initial_delay_ms: 0,
        }
    }

    /// Delay the first run by `initial_delay_ms` (stagger).
    pub fn with_initial_delay_ms(mut self, initial_delay_ms: DurationMs) -> Self {
        self.initial_delay_ms = initial_delay_ms;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn work(&self) -> &WorkRef {
        &self.work
    }

    #[inline]
    pub fn interval_ms(&self) -> DurationMs {
        self.interval_ms
    }

    #[inline]
    pub fn initial_delay_ms(&self) -> DurationMs {
        self.initial_delay_ms
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    #[inline]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::EmptyName);
        }
        if self.interval_ms == 0 {
            return Err(CoreError::InvalidInterval {
                task: self.name.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("interval_ms", &self.interval_ms)
            .field("initial_delay_ms", &self.initial_delay_ms)
            .finish_non_exhaustive()
    }
}

/// Validated, ordered, immutable set of task definitions.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Vec<Arc<TaskDefinition>>,
}

impl TaskRegistry {
    /// Validate and freeze the given definitions, keeping their order.
    ///
    /// Fails on an empty name, a zero interval or a duplicate name.
    pub fn new(definitions: Vec<TaskDefinition>) -> Result<Self, CoreError> {
        let mut seen = HashSet::with_capacity(definitions.len());

        for def in &definitions {
            def.validate()?;
            if !seen.insert(def.name.as_str()) {
                return Err(CoreError::DuplicateName(def.name.clone()));
            }
        }

        Ok(Self {
            tasks: definitions.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TaskDefinition>> {
        self.tasks.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TaskDefinition>> {
        self.tasks.iter().find(|def| def.name == name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::WorkFn;

    fn def(name: &str, interval_ms: u64) -> TaskDefinition {
        TaskDefinition::new(name, WorkFn::arc(|| async { Ok(()) }), interval_ms)
    }

    #[test]
    fn keeps_declaration_order() {
        let registry = TaskRegistry::new(vec![
            def("weather", 600_000),
            def("news", 300_000).with_initial_delay_ms(5_000),
            def("events", 900_000).with_initial_delay_ms(10_000),
        ])
        .unwrap();

        let names: Vec<_> = registry.iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, ["weather", "news", "events"]);
        assert_eq!(registry.get("news").unwrap().initial_delay_ms(), 5_000);
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = TaskRegistry::new(vec![def("news", 1000), def("news", 2000)]).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateName(name) if name == "news"));
    }

    #[test]
    fn rejects_zero_interval() {
        let err = TaskRegistry::new(vec![def("news", 0)]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInterval { task } if task == "news"));
    }

    #[test]
    fn rejects_blank_name() {
        let err = TaskRegistry::new(vec![def("  ", 1000)]).unwrap_err();
        assert!(matches!(err, CoreError::EmptyName));
    }

    #[test]
    fn empty_registry_is_valid() {
        let registry = TaskRegistry::new(Vec::new()).unwrap();
        assert!(registry.is_empty());
    }
}
