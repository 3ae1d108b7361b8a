use std::collections::BTreeMap;
use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::binder::{BinderMatrix, BindingContext};
use crate::capability::CapabilityRegistry;
use crate::component::{ComponentRegistry, SynthContext};
use crate::config_builder::HydratedConfig;
use crate::error::CompileError;
use crate::hardening::{self, HardeningAction};
use crate::ir::{BindingSummary, ResolvedBinding, ResolvedComponentIr};
use crate::manifest::{EnvironmentSpec, Manifest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeKind {
    /// A `binds` entry: mutation is possible, cycles are fatal.
    Bind,
    /// A `${ref:...}` observation: read-only, cycles are tolerated.
    Observe,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    source: usize,
    target: usize,
    kind: EdgeKind,
}

/// What the resolver hands back for plan assembly.
pub struct Resolution {
    pub components: IndexMap<String, ResolvedComponentIr>,
    pub bindings: Vec<ResolvedBinding>,
    pub hardening_actions: Vec<HardeningAction>,
    pub warnings: Vec<String>,
}

/// Walks the dependency graph and turns hydrated configs into the plan.
/// All registries are read-only; the resolver owns the per-compilation
/// arena of components and addresses them by declaration index.
pub struct Resolver<'a> {
    pub components: &'a ComponentRegistry,
    pub capabilities: &'a CapabilityRegistry,
    pub binders: &'a BinderMatrix,
}

impl Resolver<'_> {
    /// Semantic validation (stage 4): every edge endpoint, capability,
    /// access level and governance reference must check out before any
    /// component synthesizes.
    pub fn validate_semantics(
        &self,
        manifest: &Manifest,
        hydrated: &[HydratedConfig],
    ) -> Result<(), CompileError> {
        let edges = self.build_graph(manifest, hydrated)?;
        self.reject_binding_cycles(manifest, &edges)
    }

    pub fn resolve(
        &self,
        manifest: &Manifest,
        environment_name: &str,
        environment: &EnvironmentSpec,
        hydrated: Vec<HydratedConfig>,
    ) -> Result<Resolution, CompileError> {
        let edges = self.build_graph(manifest, &hydrated)?;
        self.reject_binding_cycles(manifest, &edges)?;
        let order = self.topological_order(manifest.components.len(), &edges);

        let mut warnings = Vec::new();

        // Synthesize dependencies first. Capability data is validated
        // against the registered shape as soon as it exists.
        let mut capabilities: Vec<BTreeMap<String, Value>> =
            vec![BTreeMap::new(); manifest.components.len()];
        let mut resources = vec![Vec::new(); manifest.components.len()];
        for &index in &order {
            let spec = &manifest.components[index];
            let component_type = self.components.get(&spec.type_tag).ok_or_else(|| {
                CompileError::Internal(format!("unregistered type `{}`", spec.type_tag))
            })?;
            let ctx = SynthContext {
                service: manifest.service.as_str(),
                environment: environment_name,
                component: spec.name.as_str(),
                config: &hydrated[index].value,
                framework: manifest.compliance_framework,
            };
            debug!(component = %spec.name, type_tag = %spec.type_tag, "synthesizing");
            let output = component_type.synth(&ctx)?;

            for (key, data) in &output.capabilities {
                let Some(shape) = self.capabilities.shape(key) else {
                    return Err(CompileError::UnknownCapability {
                        capability: key.to_string(),
                        reason: format!("exposed by `{}` but not registered", spec.name),
                        pointer: String::new(),
                    });
                };
                let issues = shape.conformance_issues(data);
                if !issues.is_empty() {
                    return Err(CompileError::CapabilityShapeMismatch {
                        component: spec.name.to_string(),
                        capability: key.to_string(),
                        issues,
                    });
                }
            }

            capabilities[index] = output
                .capabilities
                .into_iter()
                .map(|(key, data)| (key.as_str().to_string(), data))
                .collect();
            resources[index] = output.resources;
        }

        // Wire every binding edge in declaration order.
        let index_of: HashMap<&str, usize> = manifest
            .components
            .iter()
            .enumerate()
            .map(|(index, spec)| (spec.name.as_str(), index))
            .collect();

        let mut configs: Vec<Value> = hydrated.iter().map(|h| h.value.clone()).collect();
        let mut resolved_bindings = Vec::new();
        let mut summaries: Vec<Vec<BindingSummary>> = vec![Vec::new(); manifest.components.len()];

        for (source_index, spec) in manifest.components.iter().enumerate() {
            for bind in &spec.binds {
                let target_index = index_of[bind.to.as_str()];
                let capability_data = capabilities[target_index]
                    .get(bind.capability.as_str())
                    .ok_or_else(|| CompileError::Internal(format!(
                        "capability `{}` validated but absent on `{}`",
                        bind.capability, bind.to
                    )))?;
                let strategy = self
                    .binders
                    .lookup(&spec.type_tag, &bind.capability)
                    .ok_or_else(|| CompileError::Internal(format!(
                        "binder for ({}, {}) vanished after validation",
                        spec.type_tag, bind.capability
                    )))?;

                let ctx = BindingContext {
                    source_component: spec.name.as_str(),
                    source_type: &spec.type_tag,
                    target_component: bind.to.as_str(),
                    capability: &bind.capability,
                    access: bind.access,
                    capability_data,
                    env_overrides: &bind.env,
                    options: &bind.options,
                    framework: manifest.compliance_framework,
                };
                let result = strategy.bind(&ctx)?;
                warnings.extend(result.warnings);

                merge_environment(&mut configs[source_index], &result.env_vars);
                summaries[source_index].push(BindingSummary {
                    to: bind.to.to_string(),
                    capability: bind.capability.to_string(),
                    access: bind.access,
                });
                resolved_bindings.push(ResolvedBinding {
                    source: spec.name.to_string(),
                    target: bind.to.to_string(),
                    capability: bind.capability.to_string(),
                    access: bind.access,
                    env_vars: result.env_vars,
                    grants: result.grants,
                    network: result.network,
                    constraints: result.constraints,
                });
            }
        }

        // Observation pass: substitute `${ref:...}` placeholders with the
        // target's exposed capability data.
        for (index, hydrated_config) in hydrated.iter().enumerate() {
            for token in &hydrated_config.refs {
                let target_index = index_of[token.component.as_str()];
                let observed = capabilities[target_index]
                    .get(token.capability.as_str())
                    .and_then(|data| data.get(&token.field))
                    .ok_or_else(|| CompileError::CapabilityFieldMissing {
                        component: token.component.clone(),
                        capability: token.capability.to_string(),
                        field: token.field.clone(),
                    })?
                    .clone();
                crate::interpolate::substitute_ref(&mut configs[index], token, &observed);
            }
        }

        // Assemble in declaration order, then run Phase-B hardening over
        // the finished components.
        let mut assembled: Vec<(String, ResolvedComponentIr)> = Vec::new();
        let mut summaries_iter = summaries.into_iter();
        let mut resources_iter = resources.into_iter();
        let mut capabilities_iter = capabilities.into_iter();
        let mut configs_iter = configs.into_iter();
        for (spec, hydrated_config) in manifest.components.iter().zip(&hydrated) {
            assembled.push((
                spec.name.to_string(),
                ResolvedComponentIr {
                    type_tag: spec.type_tag.clone(),
                    resolved_config: configs_iter.next().unwrap_or(Value::Null),
                    capabilities: capabilities_iter.next().unwrap_or_default(),
                    bindings: summaries_iter.next().unwrap_or_default(),
                    source_layers: hydrated_config.source_layers.clone(),
                    resources: resources_iter.next().unwrap_or_default(),
                },
            ));
        }

        let hardening_actions = hardening::enforce(
            &mut assembled,
            manifest.compliance_framework,
            environment.is_production(environment_name),
        )?;

        Ok(Resolution {
            components: assembled.into_iter().collect(),
            bindings: resolved_bindings,
            hardening_actions,
            warnings,
        })
    }

    /// Build the dependency graph, validating endpoints as edges appear.
    fn build_graph(
        &self,
        manifest: &Manifest,
        hydrated: &[HydratedConfig],
    ) -> Result<Vec<Edge>, CompileError> {
        let index_of: HashMap<&str, usize> = manifest
            .components
            .iter()
            .enumerate()
            .map(|(index, spec)| (spec.name.as_str(), index))
            .collect();

        let mut edges = Vec::new();
        for (source_index, spec) in manifest.components.iter().enumerate() {
            for (bind_index, bind) in spec.binds.iter().enumerate() {
                let pointer = format!("/components/{source_index}/binds/{bind_index}");
                let Some(&target_index) = index_of.get(bind.to.as_str()) else {
                    return Err(CompileError::DanglingRef {
                        source_component: spec.name.to_string(),
                        target: bind.to.to_string(),
                        pointer: format!("{pointer}/to"),
                    });
                };
                if !self.capabilities.contains(&bind.capability) {
                    return Err(CompileError::UnknownCapability {
                        capability: bind.capability.to_string(),
                        reason: "not a registered capability".into(),
                        pointer: format!("{pointer}/capability"),
                    });
                }
                let target_spec = &manifest.components[target_index];
                let target_type = self.components.get(&target_spec.type_tag).ok_or_else(|| {
                    CompileError::Internal(format!("unregistered type `{}`", target_spec.type_tag))
                })?;
                if !target_type.provides().contains(&bind.capability.as_str()) {
                    return Err(CompileError::UnknownCapability {
                        capability: bind.capability.to_string(),
                        reason: format!(
                            "component `{}` ({}) does not provide it",
                            target_spec.name, target_spec.type_tag
                        ),
                        pointer: format!("{pointer}/capability"),
                    });
                }
                let Some(strategy) = self.binders.lookup(&spec.type_tag, &bind.capability) else {
                    return Err(CompileError::UnknownCapability {
                        capability: bind.capability.to_string(),
                        reason: format!(
                            "no binder strategy accepts source type `{}`",
                            spec.type_tag
                        ),
                        pointer: format!("{pointer}/capability"),
                    });
                };
                if !strategy.supported_access().contains(&bind.access) {
                    return Err(CompileError::UnsupportedAccess {
                        source_component: spec.name.to_string(),
                        capability: bind.capability.to_string(),
                        access: bind.access,
                        supported: strategy.supported_access().to_vec(),
                    });
                }
                edges.push(Edge {
                    source: source_index,
                    target: target_index,
                    kind: EdgeKind::Bind,
                });
            }

            for token in &hydrated[source_index].refs {
                let Some(&target_index) = index_of.get(token.component.as_str()) else {
                    return Err(CompileError::DanglingRef {
                        source_component: spec.name.to_string(),
                        target: token.component.clone(),
                        pointer: format!("/components/{source_index}/config"),
                    });
                };
                if !self.capabilities.contains(&token.capability) {
                    return Err(CompileError::UnknownCapability {
                        capability: token.capability.to_string(),
                        reason: "not a registered capability".into(),
                        pointer: format!("/components/{source_index}/config"),
                    });
                }
                let target_spec = &manifest.components[target_index];
                let target_type = self.components.get(&target_spec.type_tag).ok_or_else(|| {
                    CompileError::Internal(format!("unregistered type `{}`", target_spec.type_tag))
                })?;
                if !target_type.provides().contains(&token.capability.as_str()) {
                    return Err(CompileError::UnknownCapability {
                        capability: token.capability.to_string(),
                        reason: format!(
                            "component `{}` ({}) does not provide it",
                            target_spec.name, target_spec.type_tag
                        ),
                        pointer: format!("/components/{source_index}/config"),
                    });
                }
                // Observation is strict: only declared shape fields resolve.
                let shape = self
                    .capabilities
                    .shape(&token.capability)
                    .expect("checked above");
                if !shape.has_field(&token.field) {
                    return Err(CompileError::CapabilityFieldMissing {
                        component: token.component.clone(),
                        capability: token.capability.to_string(),
                        field: token.field.clone(),
                    });
                }
                edges.push(Edge {
                    source: source_index,
                    target: target_index,
                    kind: EdgeKind::Observe,
                });
            }
        }
        Ok(edges)
    }

    /// A cycle is fatal when any of its edges is a binding; cycles made
    /// purely of observation edges are read-only and safe.
    fn reject_binding_cycles(
        &self,
        manifest: &Manifest,
        edges: &[Edge],
    ) -> Result<(), CompileError> {
        let n = manifest.components.len();
        let mut adjacency = vec![Vec::new(); n];
        for edge in edges {
            adjacency[edge.source].push(edge.target);
        }
        let sccs = strongly_connected_components(n, &adjacency);

        let mut component_of = vec![0usize; n];
        for (scc_index, scc) in sccs.iter().enumerate() {
            for &node in scc {
                component_of[node] = scc_index;
            }
        }

        for edge in edges {
            let cyclic = component_of[edge.source] == component_of[edge.target]
                && (sccs[component_of[edge.source]].len() > 1 || edge.source == edge.target);
            if cyclic && edge.kind == EdgeKind::Bind {
                let mut members: Vec<usize> = sccs[component_of[edge.source]].clone();
                members.sort_unstable();
                let mut chain: Vec<String> = members
                    .iter()
                    .map(|&i| manifest.components[i].name.to_string())
                    .collect();
                chain.push(chain[0].clone());
                return Err(CompileError::BindingCycle { chain });
            }
        }
        Ok(())
    }

    /// Stable topological order: dependencies first, declaration order as
    /// the tie-break. Observation-only cycles are broken deterministically
    /// at the lowest-index remaining node.
    fn topological_order(&self, n: usize, edges: &[Edge]) -> Vec<usize> {
        let mut remaining_deps: Vec<usize> = vec![0; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for edge in edges {
            if edge.source == edge.target {
                continue;
            }
            remaining_deps[edge.source] += 1;
            dependents[edge.target].push(edge.source);
        }

        let mut placed = vec![false; n];
        let mut order = Vec::with_capacity(n);
        while order.len() < n {
            let next = (0..n)
                .find(|&i| !placed[i] && remaining_deps[i] == 0)
                // Only observation cycles can leave the frontier empty;
                // force the lowest-index node to keep the order stable.
                .unwrap_or_else(|| (0..n).find(|&i| !placed[i]).expect("nodes remain"));
            placed[next] = true;
            order.push(next);
            for &dependent in &dependents[next] {
                if !placed[dependent] {
                    remaining_deps[dependent] = remaining_deps[dependent].saturating_sub(1);
                }
            }
        }
        order
    }
}

fn merge_environment(config: &mut Value, env_vars: &BTreeMap<String, String>) {
    if env_vars.is_empty() {
        return;
    }
    let Some(root) = config.as_object_mut() else {
        return;
    };
    let entry = root
        .entry("environment".to_string())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if let Some(map) = entry.as_object_mut() {
        for (name, value) in env_vars {
            map.insert(name.clone(), Value::String(value.clone()));
        }
    }
}

/// Tarjan's algorithm over the component graph.
fn strongly_connected_components(n: usize, adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    struct State<'a> {
        adjacency: &'a [Vec<usize>],
        index: usize,
        indices: Vec<Option<usize>>,
        lowlink: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        sccs: Vec<Vec<usize>>,
    }

    fn visit(state: &mut State<'_>, v: usize) {
        state.indices[v] = Some(state.index);
        state.lowlink[v] = state.index;
        state.index += 1;
        state.stack.push(v);
        state.on_stack[v] = true;

        for &w in &state.adjacency[v].to_vec() {
            if state.indices[w].is_none() {
                visit(state, w);
                state.lowlink[v] = state.lowlink[v].min(state.lowlink[w]);
            } else if state.on_stack[w] {
                state.lowlink[v] = state.lowlink[v].min(state.indices[w].expect("visited"));
            }
        }

        if state.lowlink[v] == state.indices[v].expect("assigned above") {
            let mut scc = Vec::new();
            loop {
                let w = state.stack.pop().expect("stack non-empty");
                state.on_stack[w] = false;
                scc.push(w);
                if w == v {
                    break;
                }
            }
            state.sccs.push(scc);
        }
    }

    let mut state = State {
        adjacency,
        index: 0,
        indices: vec![None; n],
        lowlink: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        sccs: Vec::new(),
    };
    for v in 0..n {
        if state.indices[v].is_none() {
            visit(&mut state, v);
        }
    }
    state.sccs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sccs_identify_cycles() {
        // 0 -> 1 -> 2 -> 0, 3 isolated
        let adjacency = vec![vec![1], vec![2], vec![0], vec![]];
        let sccs = strongly_connected_components(4, &adjacency);
        let cycle = sccs.iter().find(|scc| scc.len() == 3).expect("cycle scc");
        let mut members = cycle.clone();
        members.sort_unstable();
        assert_eq!(members, vec![0, 1, 2]);
    }

    #[test]
    fn topological_order_places_dependencies_first() {
        let resolver = Resolver {
            components: &ComponentRegistry::builtin(),
            capabilities: &CapabilityRegistry::builtin(),
            binders: &BinderMatrix::builtin(),
        };
        // 0 depends on 2, 1 depends on 0.
        let edges = vec![
            Edge {
                source: 0,
                target: 2,
                kind: EdgeKind::Bind,
            },
            Edge {
                source: 1,
                target: 0,
                kind: EdgeKind::Bind,
            },
        ];
        let order = resolver.topological_order(3, &edges);
        let position = |node: usize| order.iter().position(|&x| x == node).unwrap();
        assert!(position(2) < position(0));
        assert!(position(0) < position(1));
    }

    #[test]
    fn observation_cycles_get_a_stable_forced_order() {
        let resolver = Resolver {
            components: &ComponentRegistry::builtin(),
            capabilities: &CapabilityRegistry::builtin(),
            binders: &BinderMatrix::builtin(),
        };
        let edges = vec![
            Edge {
                source: 0,
                target: 1,
                kind: EdgeKind::Observe,
            },
            Edge {
                source: 1,
                target: 0,
                kind: EdgeKind::Observe,
            },
        ];
        let order = resolver.topological_order(2, &edges);
        assert_eq!(order, vec![0, 1]);
    }
}
