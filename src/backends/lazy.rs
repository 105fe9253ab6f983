//! Deferred detector construction.
//!
//! Model-backed detectors are expensive to build. [`LazyDetector`] holds a
//! factory and builds the detector on the first `analyze` call, exactly
//! once, even under concurrent calls. The outcome is cached either way: a
//! failed build is not retried, and every later call reports it as a
//! detector failure (which the adapter turns into "found nothing").

use crate::{Detector, Error, Result};
use once_cell::sync::OnceCell;
use std::fmt;

type Factory<D> = Box<dyn Fn() -> Result<D> + Send + Sync>;

/// A detector built on first use.
pub struct LazyDetector<D> {
    name: String,
    entities: Vec<String>,
    factory: Factory<D>,
    cell: OnceCell<std::result::Result<D, String>>,
}

impl<D> fmt::Debug for LazyDetector<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyDetector")
            .field("name", &self.name)
            .field("entities", &self.entities)
            .field("initialized", &self.cell.get().is_some())
            .finish()
    }
}

impl<D: Detector> LazyDetector<D> {
    /// Wrap a factory. `entities` is what the built detector will support;
    /// it is declared up front so routing never forces a build.
    pub fn new<F>(name: impl Into<String>, entities: Vec<String>, factory: F) -> Self
    where
        F: Fn() -> Result<D> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            entities,
            factory: Box::new(factory),
            cell: OnceCell::new(),
        }
    }

    /// Whether the factory has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    fn get(&self) -> Result<&D> {
        let built = self.cell.get_or_init(|| {
            log::info!("initializing detector {}", self.name);
            (self.factory)().map_err(|e| {
                log::warn!("detector {} failed to initialize: {}", self.name, e);
                e.to_string()
            })
        });
        built
            .as_ref()
            .map_err(|msg| Error::detector(format!("{} unavailable: {}", self.name, msg)))
    }
}

impl<D: Detector> Detector for LazyDetector<D> {
    fn analyze(&self, text: &str, entities: &[String]) -> Result<Vec<crate::DetectedSpan>> {
        self.get()?.analyze(text, entities)
    }

    fn supported_entities(&self) -> Vec<String> {
        self.entities.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &'static str {
        "Detector constructed on first use"
    }

    fn is_available(&self) -> bool {
        self.cell.get().map_or(true, std::result::Result::is_ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::DetectedSpan;
    use crate::MockDetector;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn person() -> Vec<String> {
        vec!["PERSON".to_string()]
    }

    #[test]
    fn test_builds_once_on_first_use() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let lazy = LazyDetector::new("mock", person(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(MockDetector::new("mock")
                .with_entities(&["PERSON"])
                .with_spans(vec![DetectedSpan::new("PERSON", 0, 4, 0.9)]))
        });

        assert!(!lazy.is_initialized());
        assert_eq!(lazy.supported_entities(), person());
        assert_eq!(builds.load(Ordering::SeqCst), 0);

        assert_eq!(lazy.analyze("Taro", &person()).unwrap().len(), 1);
        assert_eq!(lazy.analyze("Taro", &person()).unwrap().len(), 1);
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(lazy.is_available());
    }

    #[test]
    fn test_failed_build_is_cached() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let lazy: LazyDetector<MockDetector> = LazyDetector::new("missing", person(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::detector("model file not found"))
        });

        assert!(lazy.is_available());
        assert!(matches!(lazy.analyze("Taro", &person()), Err(Error::Detector(_))));
        assert!(lazy.analyze("Taro", &person()).is_err());
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(!lazy.is_available());
    }
}
