//! Service descriptors and dependency resolution.
//!
//! The graph is a plain adjacency list keyed by service name. Edges may point
//! at names that were never registered ("external" dependencies); resolution
//! skips them and leaves it to the dependency wait to see them Running.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::StartupError;
use crate::ports::outbound::Startable;

/// A registered service: name, direct dependencies, optional start routine.
#[derive(Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    /// Direct dependencies, duplicates removed, declaration order kept.
    pub dependencies: Vec<String>,
    routine: Option<Arc<dyn Startable>>,
}

impl ServiceDescriptor {
    pub fn new<I, S>(name: impl Into<String>, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let dependencies = dependencies
            .into_iter()
            .map(Into::into)
            .filter(|dep: &String| seen.insert(dep.clone()))
            .collect();

        Self {
            name: name.into(),
            dependencies,
            routine: None,
        }
    }

    #[must_use]
    pub fn with_routine(mut self, routine: Arc<dyn Startable>) -> Self {
        self.routine = Some(routine);
        self
    }

    pub fn routine(&self) -> Option<&Arc<dyn Startable>> {
        self.routine.as_ref()
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("has_routine", &self.routine.is_some())
            .finish()
    }
}

/// All registered descriptors, in registration order.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    services: HashMap<String, ServiceDescriptor>,
    registration_order: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a descriptor.
    ///
    /// A replaced service keeps its original registration position.
    pub fn register(&mut self, descriptor: ServiceDescriptor) {
        if !self.services.contains_key(&descriptor.name) {
            self.registration_order.push(descriptor.name.clone());
        }
        self.services.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Direct dependencies of `name`; empty for unknown services.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.services
            .get(name)
            .map(|d| d.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Names in registration order.
    pub fn names(&self) -> &[String] {
        &self.registration_order
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn clear(&mut self) {
        self.services.clear();
        self.registration_order.clear();
    }

    /// Order every registered service so that each comes after all of its
    /// registered dependencies.
    ///
    /// Depth-first over registration order, so the result is deterministic.
    /// Fails with [`StartupError::Cycle`] naming the service at which the
    /// back edge was found.
    pub fn resolve_order(&self) -> Result<Vec<String>, StartupError> {
        let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(self.services.len());
        let mut order = Vec::with_capacity(self.services.len());

        for name in &self.registration_order {
            self.visit(name, &mut marks, &mut order)?;
        }

        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        order: &mut Vec<String>,
    ) -> Result<(), StartupError> {
        match marks.get(name) {
            Some(Mark::Visited) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(StartupError::Cycle {
                    service: name.to_string(),
                })
            }
            None => {}
        }

        // External dependency: nothing to order
        let Some(descriptor) = self.services.get(name) else {
            return Ok(());
        };

        marks.insert(name, Mark::Visiting);
        for dep in &descriptor.dependencies {
            self.visit(dep, marks, order)?;
        }
        marks.insert(name, Mark::Visited);
        order.push(name.to_string());

        Ok(())
    }

    /// Registered services that depend on `name`, directly or transitively,
    /// in resolution order.
    ///
    /// Restarts never cascade on their own; hosts that want cascading
    /// recovery restart these explicitly.
    pub fn dependents_of(&self, name: &str) -> Result<Vec<String>, StartupError> {
        let order = self.resolve_order()?;
        let mut affected: HashSet<&str> = HashSet::from([name]);
        let mut dependents = Vec::new();

        for service in &order {
            if service == name {
                continue;
            }
            let hit = self
                .dependencies_of(service)
                .iter()
                .any(|dep| affected.contains(dep.as_str()));
            if hit {
                affected.insert(service.as_str());
                dependents.push(service.clone());
            }
        }

        Ok(dependents)
    }
}
