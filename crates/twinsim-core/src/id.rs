use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a node (distribution center) in the network graph.
    pub struct NodeId;

    /// Identifies an edge (transport lane) in the network graph.
    pub struct EdgeId;
}

/// Identifies a deferred effect spawn. Returned by the scheduler so a
/// single pending spawn can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn task_ids_order_by_value() {
        assert!(TaskId(1) < TaskId(2));
        assert_eq!(TaskId(7), TaskId(7));
    }

    #[test]
    fn node_ids_are_hashable() {
        use std::collections::HashMap;
        let mut nodes = SlotMap::<NodeId, ()>::with_key();
        let a = nodes.insert(());
        let b = nodes.insert(());
        let mut map = HashMap::new();
        map.insert(a, "dc-1");
        map.insert(b, "dc-2");
        assert_eq!(map[&a], "dc-1");
        assert_eq!(map[&b], "dc-2");
    }
}
