//! Process-wide registry of live nodes and endpoints.
//!
//! Every [`Node`](crate::Node), publisher, subscriber, service server and
//! service client registers itself here on construction and unregisters when
//! its last handle is dropped. The registry only sees entities created in
//! this process.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use crate::sync::lock_ignore_poison;

/// Kind of entity tracked by the [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Node,
    Publisher,
    Subscriber,
    Service,
    Client,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Node => "node",
            EntityKind::Publisher => "publisher",
            EntityKind::Subscriber => "subscriber",
            EntityKind::Service => "service",
            EntityKind::Client => "client",
        };
        f.write_str(s)
    }
}

struct Entity {
    kind: EntityKind,
    node: String,
    /// Topic or service name; the node's own name for `EntityKind::Node`.
    name: String,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    entities: Mutex<HashMap<u64, Entity>>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::default)
}

/// Keeps an entity registered until dropped.
#[derive(Debug)]
pub(crate) struct EntityGuard {
    id: u64,
}

impl Drop for EntityGuard {
    fn drop(&mut self) {
        lock_ignore_poison(&registry().entities).remove(&self.id);
    }
}

/// Read-only view of the process-wide entity registry.
pub struct Graph;

impl Graph {
    pub(crate) fn register(kind: EntityKind, node: &str, name: &str) -> EntityGuard {
        // ---
        let registry = registry();
        let id = registry.next_id.fetch_add(1, Ordering::Relaxed);
        lock_ignore_poison(&registry.entities).insert(
            id,
            Entity {
                kind,
                node: node.to_owned(),
                name: name.to_owned(),
            },
        );
        EntityGuard { id }
    }

    /// Number of live entities of `kind` on `name`.
    ///
    /// `name` is a topic for publishers and subscribers, a service name for
    /// services and clients, and the node name for nodes.
    pub fn count(kind: EntityKind, name: &str) -> usize {
        // ---
        lock_ignore_poison(&registry().entities)
            .values()
            .filter(|e| e.kind == kind && e.name == name)
            .count()
    }

    /// Names of live nodes, sorted and deduplicated.
    pub fn node_names() -> Vec<String> {
        // ---
        lock_ignore_poison(&registry().entities)
            .values()
            .filter(|e| e.kind == EntityKind::Node)
            .map(|e| e.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Names of the nodes owning live entities of `kind` on `name`.
    pub fn nodes_with(kind: EntityKind, name: &str) -> Vec<String> {
        // ---
        lock_ignore_poison(&registry().entities)
            .values()
            .filter(|e| e.kind == kind && e.name == name)
            .map(|e| e.node.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_register_and_drop() {
        // ---
        let topic = "graph-test/register-and-drop";
        assert_eq!(Graph::count(EntityKind::Publisher, topic), 0);

        let a = Graph::register(EntityKind::Publisher, "node-a", topic);
        let b = Graph::register(EntityKind::Publisher, "node-b", topic);
        let _sub = Graph::register(EntityKind::Subscriber, "node-b", topic);

        assert_eq!(Graph::count(EntityKind::Publisher, topic), 2);
        assert_eq!(Graph::count(EntityKind::Subscriber, topic), 1);
        assert_eq!(
            Graph::nodes_with(EntityKind::Publisher, topic),
            vec!["node-a".to_owned(), "node-b".to_owned()]
        );

        drop(a);
        assert_eq!(Graph::count(EntityKind::Publisher, topic), 1);
        drop(b);
        assert_eq!(Graph::count(EntityKind::Publisher, topic), 0);
    }

    #[test]
    fn test_node_names_deduplicated() {
        // ---
        let _a = Graph::register(EntityKind::Node, "graph-test-dup", "graph-test-dup");
        let _b = Graph::register(EntityKind::Node, "graph-test-dup", "graph-test-dup");

        let names = Graph::node_names();
        assert_eq!(names.iter().filter(|n| *n == "graph-test-dup").count(), 1);
    }
}
