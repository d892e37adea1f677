//! The retained fiber tree.
//!
//! Fibers live in an arena and refer to each other by [`FiberId`] handles: parent, first child,
//! and next sibling. Removed slots are recycled, and generation counters make stale handles fail
//! lookups instead of silently aliasing a newer fiber.
//!
//! A render pass edits the tree in place under a journal that remembers the first prior state of
//! every slot it touches, so an abandoned pass can be rolled back in time proportional to what it
//! changed.

use crate::environment::EnvironmentValues;
use crate::geometry::{ProposedSize, Rect, Size};
use crate::layout::{LayoutComputer, ProposalLayout};
use crate::mutation::{Element, ElementHandle};
use crate::preference::PreferenceStore;
use crate::view::{view_type, AnyView, View};
use cgmath::Vector2;
use core::any::TypeId;
use core::fmt;
use core::ops::Index;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

/// A handle to a fiber in a [`FiberTree`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiberId {
    idx: u32,
    generation: u32,
}

impl fmt::Debug for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FiberId({}@gen{})", self.idx, self.generation)
    }
}

/// The durable identity for one position in the tree.
pub struct Fiber<E: Element> {
    /// The current view object.
    pub(crate) view: AnyView,
    pub(crate) view_type: TypeId,
    pub(crate) key: Option<u64>,
    pub(crate) parent: Option<FiberId>,
    pub(crate) first_child: Option<FiberId>,
    pub(crate) next_sibling: Option<FiberId>,
    /// Only primitive fibers own an element.
    pub(crate) element: Option<ElementHandle<E>>,
    /// Content last sent to the element.
    pub(crate) content: Option<E::Content>,
    /// Environment this fiber was evaluated with.
    pub(crate) input_environment: EnvironmentValues,
    /// Environment seen by the fiber’s children.
    pub(crate) environment: EnvironmentValues,
    pub(crate) preferences: PreferenceStore,
    pub(crate) layout: Arc<dyn LayoutComputer>,
    pub(crate) proposed_size: ProposedSize,
    pub(crate) requested_size: Size,
    /// Position relative to the parent fiber, and requested size.
    pub(crate) frame: Rect,
    /// Number of elements this fiber contributes to its nearest primitive ancestor.
    pub(crate) span: usize,
    /// Set when the view changed since the last evaluation.
    pub(crate) stale: bool,
}

impl<E: Element> Fiber<E> {
    pub(crate) fn new(
        view: AnyView,
        parent: Option<FiberId>,
        element: Option<(ElementHandle<E>, E::Content)>,
        environment: &EnvironmentValues,
    ) -> Fiber<E> {
        let (element, content) = match element {
            Some((element, content)) => (Some(element), Some(content)),
            None => (None, None),
        };
        Fiber {
            view_type: view_type(&*view),
            key: view.key(),
            view,
            parent,
            first_child: None,
            next_sibling: None,
            span: if element.is_some() { 1 } else { 0 },
            element,
            content,
            input_environment: environment.clone(),
            environment: environment.clone(),
            preferences: PreferenceStore::new(),
            layout: Arc::new(ProposalLayout),
            proposed_size: ProposedSize::UNSPECIFIED,
            requested_size: Vector2::new(0., 0.),
            frame: Rect::zero(),
            stale: true,
        }
    }

    /// Returns true if this fiber can be reused for the view.
    ///
    /// The concrete view type must match, and so must explicit keys if either side has one.
    pub fn matches(&self, view: &dyn View) -> bool {
        self.view_type == view_type(view) && self.key == view.key()
    }

    pub fn view(&self) -> &AnyView {
        &self.view
    }

    pub fn key(&self) -> Option<u64> {
        self.key
    }

    pub fn parent(&self) -> Option<FiberId> {
        self.parent
    }

    /// The backend element, if this is a primitive fiber.
    pub fn element(&self) -> Option<&ElementHandle<E>> {
        self.element.as_ref()
    }

    pub fn is_primitive(&self) -> bool {
        self.element.is_some()
    }

    pub fn proposed_size(&self) -> ProposedSize {
        self.proposed_size
    }

    pub fn requested_size(&self) -> Size {
        self.requested_size
    }

    /// Position within the parent fiber, and requested size.
    pub fn frame(&self) -> Rect {
        self.frame
    }

    pub fn environment(&self) -> &EnvironmentValues {
        &self.environment
    }

    /// Preferences reported by this fiber and its descendants.
    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    pub fn layout(&self) -> &Arc<dyn LayoutComputer> {
        &self.layout
    }
}

impl<E: Element> Clone for Fiber<E> {
    fn clone(&self) -> Self {
        Fiber {
            view: Arc::clone(&self.view),
            view_type: self.view_type,
            key: self.key,
            parent: self.parent,
            first_child: self.first_child,
            next_sibling: self.next_sibling,
            element: self.element.clone(),
            content: self.content.clone(),
            input_environment: self.input_environment.clone(),
            environment: self.environment.clone(),
            preferences: self.preferences.clone(),
            layout: Arc::clone(&self.layout),
            proposed_size: self.proposed_size,
            requested_size: self.requested_size,
            frame: self.frame,
            span: self.span,
            stale: self.stale,
        }
    }
}

impl<E: Element> fmt::Debug for Fiber<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("view", &self.view.type_name())
            .field("key", &self.key)
            .field("parent", &self.parent)
            .field("primitive", &self.element.is_some())
            .field("requested_size", &self.requested_size)
            .field("frame", &self.frame)
            .finish()
    }
}

struct Slot<E: Element> {
    generation: u32,
    fiber: Option<Fiber<E>>,
}

impl<E: Element> Clone for Slot<E> {
    fn clone(&self) -> Self {
        Slot {
            generation: self.generation,
            fiber: self.fiber.clone(),
        }
    }
}

/// Arena storage for all fibers of one tree.
pub struct FiberTree<E: Element> {
    slots: Vec<Slot<E>>,
    free_list: Vec<u32>,
    root: Option<FiberId>,
    len: usize,
    journal: Option<Journal<E>>,
}

/// Prior state of everything a pass has touched so far.
struct Journal<E: Element> {
    /// Slot count when the pass began; later slots are simply truncated.
    slot_count: usize,
    slots: HashMap<u32, Slot<E>>,
    free_list: Option<Vec<u32>>,
    root: Option<FiberId>,
    len: usize,
}

impl<E: Element> FiberTree<E> {
    pub fn new() -> FiberTree<E> {
        FiberTree {
            slots: Vec::new(),
            free_list: Vec::new(),
            root: None,
            len: 0,
            journal: None,
        }
    }

    /// The fiber for the root view, once rendered.
    pub fn root(&self) -> Option<FiberId> {
        self.root
    }

    /// Number of live fibers.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns whether the handle refers to a live fiber.
    pub fn is_alive(&self, id: FiberId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: FiberId) -> Option<&Fiber<E>> {
        self.slots
            .get(id.idx as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.fiber.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber<E>> {
        self.record(id.idx);
        self.slots
            .get_mut(id.idx as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.fiber.as_mut())
    }

    pub fn parent(&self, id: FiberId) -> Option<FiberId> {
        self.get(id).and_then(|fiber| fiber.parent)
    }

    /// Iterates over a fiber’s children in order.
    pub fn children(&self, id: FiberId) -> FiberChildren<'_, E> {
        FiberChildren {
            tree: self,
            next: self.get(id).and_then(|fiber| fiber.first_child),
        }
    }

    /// Collects the elements a fiber contributes to its nearest primitive ancestor, in order.
    ///
    /// That is the fiber’s own element if it has one, otherwise the same for each child.
    pub fn host_elements(&self, id: FiberId) -> Vec<ElementHandle<E>> {
        let mut elements = Vec::new();
        self.collect_host_elements(id, &mut elements);
        elements
    }

    fn collect_host_elements(&self, id: FiberId, elements: &mut Vec<ElementHandle<E>>) {
        match self.get(id) {
            Some(Fiber {
                element: Some(element),
                ..
            }) => elements.push(element.clone()),
            Some(_) => {
                for child in self.children(id) {
                    self.collect_host_elements(child, elements);
                }
            }
            None => (),
        }
    }

    /// The fiber’s frame relative to the root fiber’s origin.
    pub fn absolute_frame(&self, id: FiberId) -> Option<Rect> {
        let mut frame = self.get(id)?.frame;
        let mut parent = self.parent(id);
        while let Some(ancestor) = parent {
            let fiber = self.get(ancestor)?;
            frame = frame + fiber.frame.origin;
            parent = fiber.parent;
        }
        Some(frame)
    }

    /// Starts recording changes so they can be rolled back.
    ///
    /// A journal left behind by an interrupted pass is rolled back first.
    pub(crate) fn begin_journal(&mut self) {
        self.rollback();
        self.journal = Some(Journal {
            slot_count: self.slots.len(),
            slots: HashMap::new(),
            free_list: None,
            root: self.root,
            len: self.len,
        });
    }

    /// Keeps every change made since [`begin_journal`](Self::begin_journal).
    pub(crate) fn finish_journal(&mut self) {
        self.journal = None;
    }

    /// Restores the state from when the journal began. Returns false if there was no journal.
    pub(crate) fn rollback(&mut self) -> bool {
        let journal = match self.journal.take() {
            Some(journal) => journal,
            None => return false,
        };
        self.slots.truncate(journal.slot_count);
        for (idx, slot) in journal.slots {
            self.slots[idx as usize] = slot;
        }
        if let Some(free_list) = journal.free_list {
            self.free_list = free_list;
        }
        self.root = journal.root;
        self.len = journal.len;
        true
    }

    /// Number of pre-existing slots the current journal has saved.
    #[cfg(test)]
    pub(crate) fn journaled_slots(&self) -> usize {
        self.journal.as_ref().map_or(0, |journal| journal.slots.len())
    }

    fn record(&mut self, idx: u32) {
        if let Some(journal) = &mut self.journal {
            if (idx as usize) < journal.slot_count {
                if let Entry::Vacant(entry) = journal.slots.entry(idx) {
                    entry.insert(self.slots[idx as usize].clone());
                }
            }
        }
    }

    fn record_free_list(&mut self) {
        if let Some(journal) = &mut self.journal {
            if journal.free_list.is_none() {
                journal.free_list = Some(self.free_list.clone());
            }
        }
    }

    pub(crate) fn insert(&mut self, fiber: Fiber<E>) -> FiberId {
        self.record_free_list();
        self.len += 1;
        if let Some(idx) = self.free_list.pop() {
            self.record(idx);
            let slot = &mut self.slots[idx as usize];
            slot.fiber = Some(fiber);
            FiberId {
                idx,
                generation: slot.generation,
            }
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                fiber: Some(fiber),
            });
            FiberId { idx, generation: 0 }
        }
    }

    /// Frees one fiber’s slot. Does not touch its children or its parent’s links.
    pub(crate) fn remove(&mut self, id: FiberId) -> Option<Fiber<E>> {
        if !self.is_alive(id) {
            return None;
        }
        self.record(id.idx);
        self.record_free_list();
        let slot = self.slots.get_mut(id.idx as usize)?;
        let fiber = slot.fiber.take()?;
        // bump the generation so old handles immediately fail lookups
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.idx);
        self.len -= 1;
        if self.root == Some(id) {
            self.root = None;
        }
        Some(fiber)
    }

    /// Replaces a parent’s child list. `None` sets the root.
    ///
    /// # Panics
    /// - if `parent` is `None` and there is more than one child
    ///
    /// Links that are already correct are left alone, so they never reach the journal.
    pub(crate) fn set_children(&mut self, parent: Option<FiberId>, children: &[FiberId]) {
        for (i, child) in children.iter().enumerate() {
            let next = children.get(i + 1).copied();
            let linked = self
                .get(*child)
                .map_or(true, |fiber| fiber.parent == parent && fiber.next_sibling == next);
            if linked {
                continue;
            }
            if let Some(fiber) = self.get_mut(*child) {
                fiber.parent = parent;
                fiber.next_sibling = next;
            }
        }
        match parent {
            Some(parent) => {
                let first = children.first().copied();
                let linked = self
                    .get(parent)
                    .map_or(true, |fiber| fiber.first_child == first);
                if !linked {
                    if let Some(fiber) = self.get_mut(parent) {
                        fiber.first_child = first;
                    }
                }
            }
            None => {
                assert!(children.len() <= 1, "a fiber tree has at most one root");
                self.root = children.first().copied();
            }
        }
    }
}

impl<E: Element> Default for FiberTree<E> {
    fn default() -> Self {
        FiberTree::new()
    }
}

impl<E: Element> Index<FiberId> for FiberTree<E> {
    type Output = Fiber<E>;

    /// # Panics
    /// - if the handle is stale
    fn index(&self, id: FiberId) -> &Fiber<E> {
        match self.get(id) {
            Some(fiber) => fiber,
            None => panic!("stale fiber handle {:?}", id),
        }
    }
}

impl<E: Element> fmt::Debug for FiberTree<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FiberTree")
            .field("root", &self.root)
            .field("len", &self.len)
            .finish()
    }
}

/// Iterator over a fiber’s children.
pub struct FiberChildren<'a, E: Element> {
    tree: &'a FiberTree<E>,
    next: Option<FiberId>,
}

impl<'a, E: Element> Iterator for FiberChildren<'a, E> {
    type Item = FiberId;
    fn next(&mut self) -> Option<FiberId> {
        let id = self.next?;
        self.next = self.tree.get(id).and_then(|fiber| fiber.next_sibling);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestElement;
    use crate::view::Text;
    use cgmath::Point2;

    fn fiber(text: &str) -> Fiber<TestElement> {
        Fiber::new(
            Arc::new(Text::new(text)),
            None,
            None,
            &EnvironmentValues::new(),
        )
    }

    #[test]
    fn links_children_in_order() {
        let mut tree = FiberTree::new();
        let root = tree.insert(fiber("root"));
        let a = tree.insert(fiber("a"));
        let b = tree.insert(fiber("b"));
        tree.set_children(None, &[root]);
        tree.set_children(Some(root), &[a, b]);

        assert_eq!(tree.root(), Some(root));
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(tree.parent(b), Some(root));
        assert_eq!(tree.len(), 3);

        tree.set_children(Some(root), &[b]);
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn stale_handles_fail_lookups() {
        let mut tree = FiberTree::new();
        let a = tree.insert(fiber("a"));
        assert!(tree.remove(a).is_some());
        assert!(!tree.is_alive(a));

        let b = tree.insert(fiber("b"));
        assert_eq!(tree.slots.len(), 1, "slot should be recycled");
        assert!(tree.get(a).is_none());
        assert!(tree.is_alive(b));
        assert!(tree.remove(a).is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn matching_requires_type_and_key() {
        let f = fiber("a");
        assert!(f.matches(&Text::new("other text")));
        assert!(!f.matches(&()));

        let mut keyed = fiber("a");
        keyed.key = Some(1);
        assert!(!keyed.matches(&Text::new("a")));
    }

    #[test]
    fn host_elements_flatten_composite_fibers() {
        let mut tree: FiberTree<TestElement> = FiberTree::new();
        let env = EnvironmentValues::new();
        let element = |name: &str| {
            let handle = ElementHandle::<TestElement>::new(name.to_string());
            Some((handle, name.to_string()))
        };
        let composite = tree.insert(Fiber::new(Arc::new(()), None, None, &env));
        let a = tree.insert(Fiber::new(Arc::new(Text::new("a")), None, element("a"), &env));
        let inner = tree.insert(Fiber::new(Arc::new(()), None, None, &env));
        let b = tree.insert(Fiber::new(Arc::new(Text::new("b")), None, element("b"), &env));
        tree.set_children(Some(composite), &[a, inner]);
        tree.set_children(Some(inner), &[b]);

        let elements = tree.host_elements(composite);
        assert_eq!(elements.len(), 2);
        assert!(elements[0].ptr_eq(tree[a].element().unwrap()));
        assert!(elements[1].ptr_eq(tree[b].element().unwrap()));
    }

    #[test]
    fn rollback_restores_the_tree_from_before_the_journal() {
        let mut tree = FiberTree::new();
        let root = tree.insert(fiber("root"));
        let a = tree.insert(fiber("a"));
        let b = tree.insert(fiber("b"));
        tree.set_children(None, &[root]);
        tree.set_children(Some(root), &[a, b]);

        tree.begin_journal();
        tree.remove(a);
        let c = tree.insert(fiber("c"));
        let d = tree.insert(fiber("d"));
        tree.set_children(Some(root), &[b, c, d]);
        tree.get_mut(b).unwrap().stale = false;
        assert!(tree.rollback());

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.slots.len(), 3);
        assert!(tree.is_alive(a));
        assert!(!tree.is_alive(c));
        assert!(!tree.is_alive(d));
        assert!(tree[b].stale);
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![a, b]);
        assert!(!tree.rollback(), "journal is consumed");
    }

    #[test]
    fn journal_only_saves_touched_slots() {
        let mut tree = FiberTree::new();
        let root = tree.insert(fiber("root"));
        let a = tree.insert(fiber("a"));
        tree.insert(fiber("b"));
        tree.set_children(None, &[root]);

        tree.begin_journal();
        assert_eq!(tree.journaled_slots(), 0);
        assert!(tree.get(a).is_some());
        tree.get_mut(a).unwrap().stale = false;
        assert_eq!(tree.journaled_slots(), 1);
        tree.finish_journal();
        assert!(!tree.rollback());
        assert!(!tree[a].stale);
    }

    #[test]
    fn absolute_frames_accumulate_ancestor_origins() {
        let mut tree = FiberTree::new();
        let root = tree.insert(fiber("root"));
        let a = tree.insert(fiber("a"));
        let b = tree.insert(fiber("b"));
        tree.set_children(None, &[root]);
        tree.set_children(Some(root), &[a]);
        tree.set_children(Some(a), &[b]);
        tree.get_mut(a).unwrap().frame = Rect::new(Point2::new(10., 10.), Vector2::new(80., 80.));
        tree.get_mut(b).unwrap().frame = Rect::new(Point2::new(5., 0.), Vector2::new(20., 20.));

        assert_eq!(
            tree.absolute_frame(b),
            Some(Rect::new(Point2::new(15., 10.), Vector2::new(20., 20.)))
        );
        assert_eq!(tree.absolute_frame(root), Some(Rect::zero()));
    }
}
