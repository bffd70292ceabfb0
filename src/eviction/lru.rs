use super::EvictionPolicy;
use std::collections::HashMap;

/// Sentinel for "no neighbor" in the intrusive list below — plays the role
/// a null pointer would in an unsafe linked-list implementation.
const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node {
    key: String,
    prev: usize,
    next: usize,
}

/// Least-recently-used eviction: the candidate is always the key that has
/// gone the longest without a hit or insert.
///
/// Keys live in an intrusive doubly linked list threaded through a slab
/// (`nodes`), with `index` mapping each key to its slot. `on_access`/
/// `on_add` unlink a node and relink it at the tail, `on_remove` unlinks it
/// and recycles the slot via `free`, and `get_eviction_candidate` reads the
/// head — every operation is `O(1)`, none ever walks the list.
#[derive(Debug)]
pub struct LruPolicy {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    head: usize,
    tail: usize,
    free: Vec<usize>,
}

impl Default for LruPolicy {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            head: NIL,
            tail: NIL,
            free: Vec::new(),
        }
    }
}

impl LruPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn link_at_tail(&mut self, slot: usize) {
        self.nodes[slot].prev = self.tail;
        self.nodes[slot].next = NIL;
        if self.tail != NIL {
            self.nodes[self.tail].next = slot;
        } else {
            self.head = slot;
        }
        self.tail = slot;
    }

    fn touch(&mut self, key: &str) {
        if let Some(&slot) = self.index.get(key) {
            self.unlink(slot);
            self.link_at_tail(slot);
            return;
        }
        let slot = if let Some(free_slot) = self.free.pop() {
            self.nodes[free_slot] = Node {
                key: key.to_string(),
                prev: NIL,
                next: NIL,
            };
            free_slot
        } else {
            self.nodes.push(Node {
                key: key.to_string(),
                prev: NIL,
                next: NIL,
            });
            self.nodes.len() - 1
        };
        self.index.insert(key.to_string(), slot);
        self.link_at_tail(slot);
    }
}

impl EvictionPolicy for LruPolicy {
    fn on_access(&mut self, key: &str) {
        self.touch(key);
    }

    fn on_add(&mut self, key: &str) {
        self.touch(key);
    }

    fn on_remove(&mut self, key: &str) {
        if let Some(slot) = self.index.remove(key) {
            self.unlink(slot);
            self.free.push(slot);
        }
    }

    fn get_eviction_candidate(&mut self) -> Option<String> {
        if self.head == NIL {
            None
        } else {
            Some(self.nodes[self.head].key.clone())
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.head = NIL;
        self.tail = NIL;
        self.free.clear();
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_is_least_recently_touched() {
        let mut p = LruPolicy::new();
        p.on_add("a");
        p.on_add("b");
        p.on_add("c");
        assert_eq!(p.get_eviction_candidate().as_deref(), Some("a"));
    }

    #[test]
    fn access_moves_key_to_most_recent() {
        let mut p = LruPolicy::new();
        p.on_add("a");
        p.on_add("b");
        p.on_add("c");
        p.on_access("a");
        assert_eq!(p.get_eviction_candidate().as_deref(), Some("b"));
    }

    #[test]
    fn remove_drops_tracking() {
        let mut p = LruPolicy::new();
        p.on_add("a");
        p.on_add("b");
        p.on_remove("a");
        assert_eq!(p.len(), 1);
        assert_eq!(p.get_eviction_candidate().as_deref(), Some("b"));
    }

    #[test]
    fn clear_resets_everything() {
        let mut p = LruPolicy::new();
        p.on_add("a");
        p.clear();
        assert_eq!(p.len(), 0);
        assert_eq!(p.get_eviction_candidate(), None);
    }

    #[test]
    fn recycled_slots_are_reused_after_removal() {
        let mut p = LruPolicy::new();
        p.on_add("a");
        p.on_add("b");
        p.on_remove("a");
        p.on_add("c");
        assert_eq!(p.nodes.len(), 2, "removing then adding reuses a's freed slot");
        let mut seen = Vec::new();
        while let Some(k) = p.get_eviction_candidate() {
            p.on_remove(&k);
            seen.push(k);
        }
        assert_eq!(seen, vec!["b".to_string(), "c".to_string()]);
    }
}
