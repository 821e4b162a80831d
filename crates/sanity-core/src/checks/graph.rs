//! Breadth-first traversals over a template's location graph.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::cancel::CancelToken;
use crate::domain::{Edge, Template, Trace, TraceStep};
use crate::error::Result;

/// Locations reachable from the template's initial location.
pub fn reachable<'a>(template: &'a Template, cancel: &CancelToken) -> Result<HashSet<&'a str>> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    seen.insert(template.init.as_str());
    queue.push_back(template.init.as_str());

    while let Some(location) = queue.pop_front() {
        cancel.check()?;
        for edge in template.outgoing(location) {
            if seen.insert(edge.target.as_str()) {
                queue.push_back(edge.target.as_str());
            }
        }
    }

    Ok(seen)
}

/// Shortest edge path from the initial location to `location`.
///
/// `Some(vec![])` when `location` is the initial location, `None` when it is
/// unreachable.
pub fn path_to<'a>(
    template: &'a Template,
    location: &str,
    cancel: &CancelToken,
) -> Result<Option<Vec<&'a Edge>>> {
    let mut parent: HashMap<&str, &Edge> = HashMap::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    seen.insert(template.init.as_str());
    queue.push_back(template.init.as_str());

    let mut found = template.init == location;
    while !found {
        let Some(current) = queue.pop_front() else {
            break;
        };
        cancel.check()?;
        for edge in template.outgoing(current) {
            if seen.insert(edge.target.as_str()) {
                parent.insert(edge.target.as_str(), edge);
                if edge.target == location {
                    found = true;
                    break;
                }
                queue.push_back(edge.target.as_str());
            }
        }
    }

    if !found {
        return Ok(None);
    }

    let mut path = Vec::new();
    let mut current = location;
    while let Some(edge) = parent.get(current) {
        path.push(*edge);
        current = edge.source.as_str();
    }
    path.reverse();
    Ok(Some(path))
}

/// Build a trace from a path of edges.
pub fn to_trace<'a>(template: &Template, path: impl IntoIterator<Item = &'a Edge>) -> Trace {
    Trace {
        template: template.name.clone(),
        steps: path
            .into_iter()
            .map(|edge| TraceStep {
                source: edge.source.clone(),
                target: edge.target.clone(),
                sync: edge.sync.as_ref().map(ToString::to_string),
            })
            .collect(),
    }
}
