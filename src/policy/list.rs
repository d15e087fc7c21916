//! Doubly linked list stored in a slab.
//!
//! Nodes live in a `Vec` and link to each other by index, so moving a node
//! to the front or unlinking it is O(1) and freed slots are reused instead
//! of being reallocated. Indices stay valid until the node is removed.
//!
//! ```text
//!   head ─► [3] ◄──► [0] ◄──► [2] ◄── tail
//!           MRU                LRU
//! ```

/// Stable handle to a node in a [`List`].
pub(crate) type NodeId = usize;

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

#[derive(Debug)]
pub(crate) struct List<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<NodeId>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }
}

impl<T> List<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert at the front and return the new node's handle.
    pub(crate) fn push_front(&mut self, value: T) -> NodeId {
        let node = Node {
            value,
            prev: None,
            next: self.head,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        match self.head {
            Some(head) => self.node_mut(head).prev = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        self.len += 1;
        id
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&T> {
        self.slots.get(id)?.as_ref().map(|node| &node.value)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slots.get_mut(id)?.as_mut().map(|node| &mut node.value)
    }

    /// Unlink a node and hand back its value.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<T> {
        let node = self.slots.get_mut(id)?.take()?;

        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }

        self.free.push(id);
        self.len -= 1;
        Some(node.value)
    }

    pub(crate) fn pop_back(&mut self) -> Option<T> {
        let tail = self.tail?;
        self.remove(tail)
    }

    pub(crate) fn pop_front(&mut self) -> Option<T> {
        let head = self.head?;
        self.remove(head)
    }

    pub(crate) fn move_to_front(&mut self, id: NodeId) {
        if self.head == Some(id) || self.get(id).is_none() {
            return;
        }

        let (prev, next) = {
            let node = self.node_mut(id);
            (node.prev, node.next)
        };
        // Not the head, so `prev` is always set here.
        if let Some(prev) = prev {
            self.node_mut(prev).next = next;
        }
        match next {
            Some(next) => self.node_mut(next).prev = prev,
            None => self.tail = prev,
        }

        let old_head = self.head;
        {
            let node = self.node_mut(id);
            node.prev = None;
            node.next = old_head;
        }
        if let Some(old_head) = old_head {
            self.node_mut(old_head).prev = Some(id);
        }
        self.head = Some(id);
    }

    /// Remove every node, front to back.
    pub(crate) fn take_all(&mut self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.len);
        while let Some(value) = self.pop_front() {
            values.push(value);
        }
        self.slots.clear();
        self.free.clear();
        values
    }

    /// Iterate from front (most recent) to back.
    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        match self.slots[id].as_mut() {
            Some(node) => node,
            None => unreachable!("linked node {id} is vacant"),
        }
    }
}

pub(crate) struct Iter<'a, T> {
    list: &'a List<T>,
    cursor: Option<NodeId>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = self.list.slots[id].as_ref()?;
        self.cursor = node.next;
        Some(&node.value)
    }
}
