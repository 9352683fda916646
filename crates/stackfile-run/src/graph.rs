//! Release dependency graph
//!
//! Built from the whole release universe and the indices picked by
//! selectors. Building checks identity uniqueness, resolves every `needs`
//! entry of the run and rejects cycles, so the scheduler can assume every
//! node eventually becomes ready.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use stackfile_core::{Release, ReleaseId};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use crate::error::{GraphError, Result};

/// What to do with `needs` targets excluded by the selectors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NeedsPolicy {
    /// Fail with an unselected-dependency error
    #[default]
    Strict,
    /// Drop the edge; the dependency is not required
    Skip,
    /// Pull direct dependencies of selected releases into the run
    Include,
    /// Pull the whole dependency closure into the run
    IncludeTransitive,
}

/// Options for building a [`ReleaseGraph`]
#[derive(Debug, Clone, Default)]
pub struct GraphOptions {
    pub needs: NeedsPolicy,
}

impl GraphOptions {
    pub fn with_needs(mut self, needs: NeedsPolicy) -> Self {
        self.needs = needs;
        self
    }
}

/// Validated dependency graph over the releases of a run
///
/// Nodes keep the order of the universe. Edges point from a release to the
/// releases it needs.
#[derive(Debug, Clone)]
pub struct ReleaseGraph {
    releases: Vec<Release>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl ReleaseGraph {
    /// Build the graph for `selected` (indices into `universe`)
    pub fn build(universe: &[Release], selected: &[usize], options: &GraphOptions) -> Result<Self> {
        check_unique(universe)?;

        let by_id: HashMap<&ReleaseId, usize> = universe
            .iter()
            .enumerate()
            .filter(|(_, r)| r.enabled)
            .map(|(i, r)| (&r.id, i))
            .collect();
        let disabled: HashSet<&ReleaseId> = universe
            .iter()
            .filter(|r| !r.enabled)
            .map(|r| &r.id)
            .collect();

        let originally: HashSet<usize> = selected.iter().copied().collect();
        let in_run = include_needs(universe, selected, &by_id, options.needs);

        let nodes: Vec<usize> = (0..universe.len()).filter(|i| in_run.contains(i)).collect();
        let position: HashMap<usize, usize> =
            nodes.iter().enumerate().map(|(pos, &idx)| (idx, pos)).collect();

        let mut dependencies = vec![Vec::new(); nodes.len()];
        let mut undefined: IndexMap<ReleaseId, Vec<ReleaseId>> = IndexMap::new();
        let mut unselected: Option<GraphError> = None;

        for (pos, &idx) in nodes.iter().enumerate() {
            let release = &universe[idx];
            for need in release.need_ids() {
                match by_id.get(&need) {
                    Some(target) => {
                        if let Some(&target_pos) = position.get(target) {
                            if !dependencies[pos].contains(&target_pos) {
                                dependencies[pos].push(target_pos);
                            }
                        } else if originally.contains(&idx) && options.needs == NeedsPolicy::Strict {
                            if unselected.is_none() {
                                unselected = Some(GraphError::Unselected {
                                    release: release.id.clone(),
                                    name: need.name.clone(),
                                    dependency: need,
                                });
                            }
                        } else {
                            debug!(release = %release.id, dependency = %need, "dropping edge to release outside the run");
                        }
                    }
                    None if disabled.contains(&need) => {
                        debug!(release = %release.id, dependency = %need, "dropping edge to disabled release");
                    }
                    None => undefined.entry(need).or_default().push(release.id.clone()),
                }
            }
        }

        if let Some((dependency, releases)) = undefined.into_iter().next() {
            return Err(GraphError::Undefined {
                releases,
                name: dependency.name.clone(),
                dependency,
            });
        }
        if let Some(err) = unselected {
            return Err(err);
        }

        let releases: Vec<Release> = nodes.iter().map(|&i| universe[i].clone()).collect();
        let mut dependents = vec![Vec::new(); releases.len()];
        for (pos, deps) in dependencies.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(pos);
            }
        }

        let graph = Self {
            releases,
            dependencies,
            dependents,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    pub fn releases(&self) -> &[Release] {
        &self.releases
    }

    pub fn release(&self, node: usize) -> &Release {
        &self.releases[node]
    }

    /// Nodes `node` needs
    pub fn dependencies(&self, node: usize) -> &[usize] {
        &self.dependencies[node]
    }

    /// Nodes that need `node`
    pub fn dependents(&self, node: usize) -> &[usize] {
        &self.dependents[node]
    }

    /// Group nodes by the length of their longest needs chain
    pub fn levels(&self) -> Vec<Vec<usize>> {
        let mut depth: Vec<Option<usize>> = vec![None; self.len()];
        for node in 0..self.len() {
            self.depth(node, &mut depth);
        }

        let mut levels: Vec<Vec<usize>> = Vec::new();
        for (node, d) in depth.into_iter().enumerate() {
            let d = d.unwrap_or_default();
            if levels.len() <= d {
                levels.resize_with(d + 1, Vec::new);
            }
            levels[d].push(node);
        }
        levels
    }

    fn depth(&self, node: usize, memo: &mut Vec<Option<usize>>) -> usize {
        if let Some(d) = memo[node] {
            return d;
        }
        let d = self.dependencies[node]
            .iter()
            .map(|&dep| self.depth(dep, memo) + 1)
            .max()
            .unwrap_or(0);
        memo[node] = Some(d);
        d
    }

    /// Plan for display
    pub fn plan(&self) -> ExecutionPlan {
        ExecutionPlan {
            levels: self
                .levels()
                .into_iter()
                .map(|level| level.into_iter().map(|n| self.releases[n].id.clone()).collect())
                .collect(),
        }
    }

    fn check_acyclic(&self) -> Result<()> {
        // Kahn: whatever never reaches in-degree zero sits on or behind a cycle
        let mut remaining: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = (0..self.len()).filter(|&n| remaining[n] == 0).collect();
        let mut seen = 0;

        while let Some(node) = queue.pop_front() {
            seen += 1;
            for &dependent in &self.dependents[node] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if seen == self.len() {
            return Ok(());
        }

        let start = (0..self.len()).find(|&n| remaining[n] > 0).unwrap_or_default();
        Err(GraphError::Cycle {
            chain: self.find_cycle(start, &remaining),
        })
    }

    /// Walk unresolved dependencies from `start` until a node repeats
    fn find_cycle(&self, start: usize, remaining: &[usize]) -> Vec<ReleaseId> {
        let mut path = vec![start];
        let mut node = start;
        loop {
            let next = self.dependencies[node]
                .iter()
                .copied()
                .find(|&dep| remaining[dep] > 0);
            let Some(next) = next else {
                break;
            };
            if let Some(at) = path.iter().position(|&n| n == next) {
                let mut cycle: Vec<ReleaseId> =
                    path[at..].iter().map(|&n| self.releases[n].id.clone()).collect();
                cycle.push(self.releases[next].id.clone());
                return cycle;
            }
            path.push(next);
            node = next;
        }
        path.iter().map(|&n| self.releases[n].id.clone()).collect()
    }
}

fn check_unique(universe: &[Release]) -> Result<()> {
    let mut counts: IndexMap<&ReleaseId, usize> = IndexMap::new();
    for release in universe.iter().filter(|r| r.enabled) {
        *counts.entry(&release.id).or_default() += 1;
    }
    match counts.into_iter().find(|(_, count)| *count > 1) {
        Some((id, count)) => Err(GraphError::Duplicate {
            id: id.clone(),
            count,
        }),
        None => Ok(()),
    }
}

/// Selected indices plus whatever the needs policy pulls in
fn include_needs(
    universe: &[Release],
    selected: &[usize],
    by_id: &HashMap<&ReleaseId, usize>,
    policy: NeedsPolicy,
) -> HashSet<usize> {
    let mut in_run: HashSet<usize> = selected.iter().copied().collect();
    if !matches!(policy, NeedsPolicy::Include | NeedsPolicy::IncludeTransitive) {
        return in_run;
    }

    let mut queue: VecDeque<usize> = selected.iter().copied().collect();
    while let Some(idx) = queue.pop_front() {
        for need in universe[idx].need_ids() {
            let Some(&target) = by_id.get(&need) else {
                continue;
            };
            if in_run.insert(target) {
                debug!(release = %universe[idx].id, dependency = %need, "including dependency");
                if policy == NeedsPolicy::IncludeTransitive {
                    queue.push_back(target);
                }
            }
        }
    }
    in_run
}

/// Releases grouped by dependency level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub levels: Vec<Vec<ReleaseId>>,
}

impl ExecutionPlan {
    pub fn release_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    pub fn display(&self) -> String {
        let mut lines = vec![format!(
            "Execution plan: {} releases in {} levels",
            self.release_count(),
            self.levels.len()
        )];

        for (number, level) in self.levels.iter().enumerate() {
            let ids: Vec<String> = level.iter().map(ToString::to_string).collect();
            lines.push(format!("  Level {}: {}", number + 1, ids.join(", ")));
        }

        lines.join("\n")
    }
}
