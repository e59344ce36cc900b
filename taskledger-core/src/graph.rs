//! Cycle detection over the track dependency relation.
//!
//! The graph is never materialised: the walk asks a lookup function for the
//! outgoing edges of each node it enters, so the same code runs against the
//! SQLite edge table inside a transaction or against an in-memory map.

use std::collections::HashSet;

use crate::error::{Error, Result};

/// Depth-first search from `start` for a path that returns to a node still on
/// the current recursion path. Returns that path, closed on the repeated node.
///
/// Nodes whose subtree was fully explored are skipped on later visits, so a
/// node reachable through several disjoint paths is walked once.
pub fn find_cycle<F>(start: &str, mut dependencies_of: F) -> Result<Option<Vec<String>>>
where
    F: FnMut(&str) -> Result<Vec<String>>,
{
    let mut on_path: HashSet<String> = HashSet::new();
    let mut finished: HashSet<String> = HashSet::new();
    let mut stack: Vec<(String, std::vec::IntoIter<String>)> = Vec::new();

    let first = dependencies_of(start)?;
    on_path.insert(start.to_string());
    stack.push((start.to_string(), first.into_iter()));

    while let Some((_, pending)) = stack.last_mut() {
        match pending.next() {
            Some(next) => {
                if on_path.contains(&next) {
                    let from = stack.iter().position(|(node, _)| *node == next).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[from..].iter().map(|(node, _)| node.clone()).collect();
                    cycle.push(next);
                    return Ok(Some(cycle));
                }
                if finished.contains(&next) {
                    continue;
                }
                let edges = dependencies_of(&next)?;
                on_path.insert(next.clone());
                stack.push((next, edges.into_iter()));
            }
            None => {
                if let Some((node, _)) = stack.pop() {
                    on_path.remove(&node);
                    finished.insert(node);
                }
            }
        }
    }

    Ok(None)
}

/// Fails with `InvalidArgument` naming the cycle if one is reachable from `start`.
pub fn validate_no_cycles<F>(start: &str, dependencies_of: F) -> Result<()>
where
    F: FnMut(&str) -> Result<Vec<String>>,
{
    match find_cycle(start, dependencies_of)? {
        Some(cycle) => Err(Error::invalid(
            "track",
            format!("dependency cycle detected: {}", cycle.join(" -> ")),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;

    fn lookup(edges: &[(&str, &str)]) -> impl FnMut(&str) -> Result<Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (from, to) in edges {
            map.entry(from.to_string()).or_default().push(to.to_string());
        }
        move |node| Ok(map.get(node).cloned().unwrap_or_default())
    }

    #[test]
    fn empty_graph_has_no_cycle() {
        assert!(validate_no_cycles("a", lookup(&[])).is_ok());
    }

    #[test]
    fn detects_direct_cycle() {
        let err = validate_no_cycles("a", lookup(&[("a", "b"), ("b", "a")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn detects_transitive_cycle() {
        let edges = [("a", "b"), ("b", "c"), ("c", "d"), ("d", "b")];
        let cycle = find_cycle("a", lookup(&edges)).unwrap().unwrap();
        assert_eq!(cycle, vec!["b", "c", "d", "b"]);
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let edges = [("a", "b"), ("a", "c"), ("b", "d"), ("c", "d"), ("d", "e")];
        assert!(validate_no_cycles("a", lookup(&edges)).is_ok());
    }

    #[test]
    fn cycle_off_the_start_path_is_still_found() {
        let edges = [("a", "b"), ("a", "c"), ("c", "d"), ("d", "c")];
        assert!(validate_no_cycles("a", lookup(&edges)).is_err());
    }

    #[test]
    fn lookup_errors_propagate() {
        let err = find_cycle("a", |_| Err(Error::Internal("gone".into()))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
