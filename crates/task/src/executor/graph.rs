use indexmap::IndexMap;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use taskweave_core::{Error, Result};

/// Dependency adjacency in submission order: task id -> ids it depends on
pub type DependencyMap = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Find a cycle with an iterative depth-first search
///
/// Returns the id of the first task reached again while still on the DFS
/// stack. Dependencies missing from the map are treated as leaves.
pub fn find_cycle(dependencies: &DependencyMap) -> Option<String> {
    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(dependencies.len());

    for root in dependencies.keys() {
        if marks.contains_key(root.as_str()) {
            continue;
        }

        marks.insert(root.as_str(), Mark::Visiting);
        let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let children = dependencies.get(node).map(Vec::as_slice).unwrap_or(&[]);

            match children.get(frame.1) {
                Some(child) => {
                    frame.1 += 1;
                    match marks.get(child.as_str()) {
                        Some(Mark::Visiting) => return Some(child.clone()),
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(child.as_str(), Mark::Visiting);
                            stack.push((child.as_str(), 0));
                        }
                    }
                }
                None => {
                    marks.insert(node, Mark::Done);
                    stack.pop();
                }
            }
        }
    }

    None
}

/// In-degree (own dependency count) and reverse edges, indexed by position
fn edges(dependencies: &DependencyMap) -> (Vec<usize>, Vec<Vec<usize>>) {
    let mut in_degree = vec![0usize; dependencies.len()];
    let mut dependents = vec![Vec::new(); dependencies.len()];

    for (index, deps) in dependencies.values().enumerate() {
        for dep in deps {
            if let Some(dep_index) = dependencies.get_index_of(dep) {
                in_degree[index] += 1;
                dependents[dep_index].push(index);
            }
        }
    }

    (in_degree, dependents)
}

/// Topological order using Kahn's algorithm
///
/// Among tasks that are ready at the same time, the one submitted first comes
/// first. Fails if the graph still contains a cycle.
pub fn topological_order(dependencies: &DependencyMap) -> Result<Vec<String>> {
    let (mut in_degree, dependents) = edges(dependencies);

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &degree)| degree == 0)
        .map(|(index, _)| Reverse(index))
        .collect();

    let mut order = Vec::with_capacity(dependencies.len());
    while let Some(Reverse(index)) = ready.pop() {
        for &dependent in &dependents[index] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
        if let Some((id, _)) = dependencies.get_index(index) {
            order.push(id.clone());
        }
    }

    if order.len() != dependencies.len() {
        return Err(unresolved(dependencies, &in_degree));
    }

    Ok(order)
}

/// Group tasks into levels: level 0 has no dependencies, level `n` depends
/// only on earlier levels
pub fn levels(dependencies: &DependencyMap) -> Result<Vec<Vec<String>>> {
    let (mut in_degree, dependents) = edges(dependencies);

    let mut current: Vec<usize> = (0..in_degree.len())
        .filter(|&index| in_degree[index] == 0)
        .collect();
    let mut levels = Vec::new();
    let mut processed = 0;

    while !current.is_empty() {
        let mut next = Vec::new();
        for &index in &current {
            for &dependent in &dependents[index] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        next.sort_unstable();

        processed += current.len();
        levels.push(
            current
                .iter()
                .filter_map(|&index| dependencies.get_index(index).map(|(id, _)| id.clone()))
                .collect(),
        );
        current = next;
    }

    if processed != dependencies.len() {
        return Err(unresolved(dependencies, &in_degree));
    }

    Ok(levels)
}

fn unresolved(dependencies: &DependencyMap, in_degree: &[usize]) -> Error {
    let task_id = in_degree
        .iter()
        .position(|&degree| degree > 0)
        .and_then(|index| dependencies.get_index(index))
        .map(|(id, _)| id.clone())
        .unwrap_or_default();
    Error::circular_dependency(task_id)
}
