//! Dependency graph of the binding phases.
//!
//! The pipeline does not hard-code the order of its phases; each [`BindingPhase`] declares
//! the phases it depends on and the [`PhaseGraph`] derives execution levels from them,
//! rejecting missing or circular dependencies.
use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use crate::{Error::GraphError, Result};

/// The phases of a binding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::EnumIter)]
pub enum BindingPhase {
    /// Type definitions and identifier generators
    Independent,
    /// Filter definitions
    TypeDependent,
    /// Entities, collections and imports
    Mapping,
    /// Documents deferred on `extends`
    ExtendsResolution,
    /// Named queries, result sets, entity graphs and back references
    MappingDependent,
    /// Cache regions and cross-entity references
    SecondPass,
}

impl BindingPhase {
    /// Phases that must complete before this one starts
    #[must_use]
    pub fn dependencies(self) -> &'static [BindingPhase] {
        match self {
            BindingPhase::Independent => &[],
            BindingPhase::TypeDependent => &[BindingPhase::Independent],
            BindingPhase::Mapping => &[BindingPhase::TypeDependent],
            BindingPhase::ExtendsResolution => &[BindingPhase::Mapping],
            BindingPhase::MappingDependent => &[BindingPhase::ExtendsResolution],
            BindingPhase::SecondPass => &[BindingPhase::MappingDependent],
        }
    }
}

/// Directed acyclic graph of binding phases.
#[derive(Debug, Default)]
pub struct PhaseGraph {
    phases: HashSet<BindingPhase>,
    dependencies: HashMap<BindingPhase, HashSet<BindingPhase>>,
    dependents: HashMap<BindingPhase, HashSet<BindingPhase>>,
}

impl PhaseGraph {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A graph holding every phase, relationships built
    ///
    /// # Errors
    /// Returns [`crate::Error::GraphError`] if the declared dependencies are inconsistent.
    pub fn standard() -> Result<Self> {
        let mut graph = Self::new();
        for phase in <BindingPhase as strum::IntoEnumIterator>::iter() {
            graph.add_phase(phase);
        }
        graph.build_relationships()?;
        Ok(graph)
    }

    /// Add a phase to the graph
    pub fn add_phase(&mut self, phase: BindingPhase) {
        self.phases.insert(phase);
        self.dependencies.entry(phase).or_default();
        self.dependents.entry(phase).or_default();
    }

    /// Connect every phase with the phases it depends on
    ///
    /// # Errors
    /// Returns [`crate::Error::GraphError`] if a phase depends on one that is not in the
    /// graph, or if the dependencies form a cycle.
    pub fn build_relationships(&mut self) -> Result<()> {
        self.dependencies.values_mut().for_each(HashSet::clear);
        self.dependents.values_mut().for_each(HashSet::clear);

        for phase in &self.phases {
            for dependency in phase.dependencies() {
                if !self.phases.contains(dependency) {
                    return Err(GraphError(format!(
                        "Phase {phase} depends on {dependency}, which is not part of the graph"
                    )));
                }

                self.dependencies
                    .get_mut(phase)
                    .ok_or_else(|| {
                        GraphError(format!("Internal error: phase {phase} not found in dependencies map"))
                    })?
                    .insert(*dependency);

                self.dependents
                    .get_mut(dependency)
                    .ok_or_else(|| {
                        GraphError(format!("Internal error: phase {dependency} not found in dependents map"))
                    })?
                    .insert(*phase);
            }
        }

        self.check_circular_dependencies()
    }

    fn check_circular_dependencies(&self) -> Result<()> {
        let mut visited = HashSet::new();
        let mut stack = HashSet::new();

        for phase in &self.phases {
            if !visited.contains(phase) {
                self.detect_cycle(*phase, &mut visited, &mut stack)?;
            }
        }
        Ok(())
    }

    fn detect_cycle(
        &self,
        phase: BindingPhase,
        visited: &mut HashSet<BindingPhase>,
        stack: &mut HashSet<BindingPhase>,
    ) -> Result<()> {
        visited.insert(phase);
        stack.insert(phase);

        if let Some(dependencies) = self.dependencies.get(&phase) {
            for &dependency in dependencies {
                if !visited.contains(&dependency) {
                    self.detect_cycle(dependency, visited, stack)?;
                } else if stack.contains(&dependency) {
                    return Err(GraphError(format!(
                        "Circular dependency detected involving phase {dependency}"
                    )));
                }
            }
        }

        stack.remove(&phase);
        Ok(())
    }

    /// Group phases into levels; every phase only depends on phases of earlier levels
    ///
    /// # Errors
    /// Returns [`crate::Error::GraphError`] if no order satisfies the dependencies.
    pub fn topological_levels(&self) -> Result<Vec<Vec<BindingPhase>>> {
        let mut levels = Vec::new();
        let mut unscheduled: HashSet<BindingPhase> = self.phases.iter().copied().collect();
        let mut satisfied = HashSet::new();

        while !unscheduled.is_empty() {
            let mut ready: Vec<BindingPhase> = unscheduled
                .iter()
                .filter(|phase| {
                    self.dependencies
                        .get(phase)
                        .map(|deps| deps.iter().all(|dep| satisfied.contains(dep)))
                        .unwrap_or(true)
                })
                .copied()
                .collect();

            if ready.is_empty() {
                return Err(GraphError(
                    "Unable to resolve phase order, possible circular dependency".to_string(),
                ));
            }

            ready.sort();
            for phase in &ready {
                unscheduled.remove(phase);
                satisfied.insert(*phase);
            }
            levels.push(ready);
        }

        Ok(levels)
    }

    /// Phases in execution order
    ///
    /// # Errors
    /// Returns [`crate::Error::GraphError`] if no order satisfies the dependencies.
    pub fn execution_order(&self) -> Result<Vec<BindingPhase>> {
        Ok(self.topological_levels()?.into_iter().flatten().collect())
    }

    /// Human-readable execution plan, one level per line
    ///
    /// # Errors
    /// Returns [`crate::Error::GraphError`] if no order satisfies the dependencies.
    pub fn dump_execution_plan(&self) -> Result<String> {
        let mut result = String::new();
        for (index, level) in self.topological_levels()?.iter().enumerate() {
            let phases = level
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(result, "Level {index}: [{phases}]");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_order() {
        let graph = PhaseGraph::standard().unwrap();
        assert_eq!(
            graph.execution_order().unwrap(),
            vec![
                BindingPhase::Independent,
                BindingPhase::TypeDependent,
                BindingPhase::Mapping,
                BindingPhase::ExtendsResolution,
                BindingPhase::MappingDependent,
                BindingPhase::SecondPass,
            ]
        );
        assert!(graph
            .dump_execution_plan()
            .unwrap()
            .starts_with("Level 0: [Independent]"));
    }

    #[test]
    fn test_missing_dependency() {
        let mut graph = PhaseGraph::new();
        graph.add_phase(BindingPhase::Mapping);
        let err = graph.build_relationships().unwrap_err();
        assert!(err.to_string().contains("TypeDependent"));
    }
}
