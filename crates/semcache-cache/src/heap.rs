//! Array-backed binary heap with a pluggable heap property.
//!
//! The ordering is an injected predicate `holds(parent, child)` rather
//! than a total order, so min- and max-oriented variants share one
//! implementation. Violated invariants (extracting from an empty heap,
//! updating an absent node) are programming errors and panic; they are
//! never surfaced as recoverable results.

/// Heap property predicate: must hold between every parent/child pair.
pub type HeapProperty<T> = Box<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// Binary heap whose root is the extremal element under the injected
/// property. With `parent.timestamp <= child.timestamp` the root is the
/// least-recently-used entry.
pub struct MinHeap<T> {
    store: Vec<T>,
    holds: HeapProperty<T>,
}

impl<T: PartialEq> MinHeap<T> {
    pub fn new(holds: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            store: Vec::new(),
            holds: Box::new(holds),
        }
    }

    /// Builds a heap from arbitrary items, bottom-up.
    pub fn from_vec(items: Vec<T>, holds: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        let mut heap = Self {
            store: items,
            holds: Box::new(holds),
        };
        if heap.store.len() > 1 {
            for i in (0..=Self::parent_of(heap.store.len() - 1)).rev() {
                heap.sift_down(i);
            }
        }
        heap
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn peek(&self) -> Option<&T> {
        self.store.first()
    }

    /// Appends and restores the property upward.
    pub fn insert(&mut self, item: T) {
        self.store.push(item);
        self.sift_up(self.store.len() - 1);
    }

    /// Removes and returns the root, moving the last element into its
    /// place.
    ///
    /// # Panics
    ///
    /// Panics on an empty heap.
    pub fn extract(&mut self) -> T {
        assert!(!self.store.is_empty(), "heap underflow");
        let root = self.store.swap_remove(0);
        if !self.store.is_empty() {
            self.sift_down(0);
        }
        root
    }

    /// Replaces the element equal to `old` with `new` and restores the
    /// heap property in whichever direction it was disturbed. The linear
    /// lookup is acceptable at the cache's bounded size.
    ///
    /// # Panics
    ///
    /// Panics when `old` is not present in the heap.
    pub fn update_node(&mut self, old: &T, new: T) {
        let i = self
            .store
            .iter()
            .position(|item| item == old)
            .expect("update_node: item is not present in the heap");
        self.store[i] = new;

        if i > 0 && !(self.holds)(&self.store[Self::parent_of(i)], &self.store[i]) {
            self.sift_up(i);
        } else {
            self.sift_down(i);
        }
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    fn parent_of(i: usize) -> usize {
        (i - 1) / 2
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = Self::parent_of(i);
            if (self.holds)(&self.store[parent], &self.store[i]) {
                break;
            }
            self.store.swap(parent, i);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut selected = i;

            if left < self.store.len() && !(self.holds)(&self.store[selected], &self.store[left]) {
                selected = left;
            }
            if right < self.store.len() && !(self.holds)(&self.store[selected], &self.store[right])
            {
                selected = right;
            }
            if selected == i {
                break;
            }
            self.store.swap(i, selected);
            i = selected;
        }
    }
}
