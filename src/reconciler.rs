use crate::config::ReconcilerConfig;
use crate::environment::EnvironmentValues;
use crate::error::RenderError;
use crate::fiber::{Fiber, FiberId, FiberTree};
use crate::geometry::{sanitize_size, ProposedSize, Rect, Size};
use crate::layout::{LayoutChild, LayoutComputer, LayoutContext, ProposalLayout};
use crate::mutation::{ElementHandle, Mutation, MutationLog};
use crate::renderer::Renderer;
use crate::view::{view_type, AnyView, View, ViewInputs};
use cgmath::Point2;
use core::any::TypeId;
use core::fmt;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, trace_span};

type Handle<R> = ElementHandle<<R as Renderer>::Element>;

/// Keeps a fiber tree in sync with successive view trees and drives a renderer.
///
/// Only one render pass runs on a tree at a time: the tree sits behind a mutex that is held from
/// the start of a pass until its mutations have been committed or discarded.
pub struct Reconciler<R: Renderer> {
    renderer: R,
    config: ReconcilerConfig,
    /// Seeds the root fiber; kept so unchanged trees can be recognised by reference.
    environment: EnvironmentValues,
    tree: Mutex<FiberTree<R::Element>>,
}

impl<R: Renderer> Reconciler<R> {
    /// Creates a reconciler and renders the root view for the first time.
    pub fn new(renderer: R, root: AnyView) -> Reconciler<R> {
        Reconciler::with_config(renderer, root, ReconcilerConfig::default())
    }

    pub fn with_config(renderer: R, root: AnyView, config: ReconcilerConfig) -> Reconciler<R> {
        let environment = renderer.default_environment();
        let reconciler = Reconciler {
            renderer,
            config,
            environment,
            tree: Mutex::new(FiberTree::new()),
        };
        reconciler.render(root);
        reconciler
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn config(&self) -> ReconcilerConfig {
        self.config
    }

    /// Locks the fiber tree for inspection.
    ///
    /// Render passes block while the guard is alive.
    pub fn tree(&self) -> MutexGuard<'_, FiberTree<R::Element>> {
        self.tree.lock()
    }

    /// Reconciles a new root view and commits the result, waiting for any pass in flight.
    pub fn render(&self, root: AnyView) {
        self.prepare(root).commit();
    }

    /// Like [`render`](Self::render), but fails instead of waiting for a pass in flight.
    pub fn try_render(&self, root: AnyView) -> Result<(), RenderError> {
        self.try_prepare(root)?.commit();
        Ok(())
    }

    /// Computes a render pass without applying it.
    pub fn prepare(&self, root: AnyView) -> PreparedRender<'_, R> {
        let guard = self.tree.lock();
        self.prepare_locked(guard, root)
    }

    /// Like [`prepare`](Self::prepare), but fails instead of waiting for a pass in flight.
    pub fn try_prepare(&self, root: AnyView) -> Result<PreparedRender<'_, R>, RenderError> {
        let guard = self.tree.try_lock().ok_or(RenderError::Busy)?;
        Ok(self.prepare_locked(guard, root))
    }

    fn prepare_locked<'a>(
        &'a self,
        mut guard: MutexGuard<'a, FiberTree<R::Element>>,
        root: AnyView,
    ) -> PreparedRender<'a, R> {
        let _span = trace_span!("render_pass", root = root.type_name()).entered();

        // edits are journaled so an abandoned pass can be undone
        guard.begin_journal();
        let mut pass = Pass {
            renderer: &self.renderer,
            tree: &mut guard,
            log: MutationLog::new(),
            window: self.config.lookahead_window,
        };
        pass.run(root, &self.environment, self.renderer.root_proposal());
        let log = pass.log;

        let (inserts, removes, replaces, updates) = log.counts();
        debug!(
            inserts,
            removes,
            replaces,
            updates,
            fibers = guard.len(),
            "render pass complete"
        );

        PreparedRender {
            reconciler: self,
            guard,
            log,
        }
    }
}

impl<R: Renderer + fmt::Debug> fmt::Debug for Reconciler<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("renderer", &self.renderer)
            .field("config", &self.config)
            .finish()
    }
}

/// A finished render pass that has not been applied yet.
///
/// Holds the tree’s exclusive lock. Committing keeps the updated fiber tree and hands the
/// mutation log to the renderer; dropping it rolls the tree back without touching the backend.
pub struct PreparedRender<'a, R: Renderer> {
    reconciler: &'a Reconciler<R>,
    guard: MutexGuard<'a, FiberTree<R::Element>>,
    log: MutationLog<R::Element>,
}

impl<'a, R: Renderer> PreparedRender<'a, R> {
    pub fn mutations(&self) -> &MutationLog<R::Element> {
        &self.log
    }

    /// The fiber tree as it will be after committing.
    pub fn tree(&self) -> &FiberTree<R::Element> {
        &self.guard
    }

    pub fn commit(mut self) {
        self.guard.finish_journal();
        let log = core::mem::take(&mut self.log);
        self.reconciler.renderer.commit(log);
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl<'a, R: Renderer> Drop for PreparedRender<'a, R> {
    fn drop(&mut self) {
        if self.guard.rollback() {
            trace!(mutations = self.log.len(), "render pass discarded");
        }
    }
}

/// Identity used to tell whether a later sibling view still wants an old fiber.
type Identity = (TypeId, Option<u64>);

fn identity(view: &dyn View) -> Identity {
    (view_type(view), view.key())
}

/// State of one reconciliation pass.
struct Pass<'a, R: Renderer> {
    renderer: &'a R,
    tree: &'a mut FiberTree<R::Element>,
    log: MutationLog<R::Element>,
    window: usize,
}

impl<'a, R: Renderer> Pass<'a, R> {
    fn run(&mut self, root: AnyView, environment: &EnvironmentValues, proposal: ProposedSize) {
        let host = self.renderer.root_element();
        let mut context = LayoutContext::new(proposal.sanitized());
        self.reconcile_children(
            None,
            &host,
            0,
            vec![root],
            &ProposalLayout,
            &mut context,
            environment,
        );
    }

    /// Evaluates a fiber’s view and reconciles its subtree.
    ///
    /// - `host`: element of the nearest primitive ancestor
    /// - `offset`: where this fiber’s elements start among `host`’s children
    ///
    /// Returns the number of elements the fiber contributes to `host`, and its requested size.
    fn evaluate(
        &mut self,
        id: FiberId,
        host: &Handle<R>,
        offset: usize,
        proposed: ProposedSize,
        environment: &EnvironmentValues,
    ) -> (usize, Size) {
        let proposed = proposed.sanitized();
        let fiber = &self.tree[id];
        if !fiber.stale
            && fiber.proposed_size == proposed
            && fiber.input_environment.ptr_eq(environment)
        {
            // same view, same inputs: the subtree cannot have changed
            return (fiber.span, fiber.requested_size);
        }

        let view = Arc::clone(&fiber.view);
        let element = fiber.element.clone();
        let outputs = view.make_view(&ViewInputs {
            proposed_size: proposed,
            environment: environment.clone(),
        });
        let layout: Arc<dyn LayoutComputer> = outputs
            .layout
            .clone()
            .unwrap_or_else(|| Arc::new(ProposalLayout));

        // primitive fibers host their own children; composite ones pass their host through
        let (children_host, base) = match &element {
            Some(element) => (element.clone(), 0),
            None => (host.clone(), offset),
        };

        let views: Vec<AnyView> = view.children().collect();
        let mut context = LayoutContext::new(proposed);
        let (children, children_span) = self.reconcile_children(
            Some(id),
            &children_host,
            base,
            views,
            &*layout,
            &mut context,
            &outputs.environment,
        );
        context.size = sanitize_size(layout.request_size(&context));

        let mut preferences = outputs.preferences.clone();
        for (child, placed) in children.iter().zip(&context.children) {
            let origin = layout.position(placed, &context);
            let origin = Point2::new(finite_or_zero(origin.x), finite_or_zero(origin.y));
            if let Some(fiber) = self.tree.get_mut(*child) {
                fiber.frame = Rect::new(origin, placed.dimensions);
                preferences.merge(&fiber.preferences);
            }
        }

        let span = if element.is_some() { 1 } else { children_span };
        if let Some(fiber) = self.tree.get_mut(id) {
            fiber.layout = layout;
            fiber.input_environment = environment.clone();
            fiber.environment = outputs.environment;
            fiber.preferences = preferences;
            fiber.proposed_size = proposed;
            fiber.requested_size = context.size;
            fiber.frame.size = context.size;
            fiber.span = span;
            fiber.stale = false;
        }
        (span, context.size)
    }

    /// Diffs one sibling group against its new views, descending into each placed fiber.
    ///
    /// Returns the placed fibers in order and the number of elements they contribute to `host`.
    #[allow(clippy::too_many_arguments)]
    fn reconcile_children(
        &mut self,
        parent: Option<FiberId>,
        host: &Handle<R>,
        base: usize,
        views: Vec<AnyView>,
        layout: &dyn LayoutComputer,
        context: &mut LayoutContext,
        environment: &EnvironmentValues,
    ) -> (Vec<FiberId>, usize) {
        let mut old: Vec<Option<FiberId>> = match parent {
            Some(parent) => self.tree.children(parent).map(Some).collect(),
            None => self.tree.root().into_iter().map(Some).collect(),
        };

        let mut remaining: HashMap<Identity, usize> = HashMap::new();
        for view in &views {
            *remaining.entry(identity(&**view)).or_insert(0) += 1;
        }

        let mut head = 0;
        let mut cursor = base;
        let mut placed = Vec::with_capacity(views.len());

        for (index, view) in views.into_iter().enumerate() {
            if let Some(count) = remaining.get_mut(&identity(&*view)) {
                *count -= 1;
            }
            while head < old.len() && old[head].is_none() {
                head += 1;
            }

            let id = self.place(parent, host, cursor, &mut old, head, &view, &remaining, environment);

            let proposal = layout.propose_size(&*view, index, context).sanitized();
            let (span, size) = self.evaluate(id, host, cursor, proposal, environment);
            cursor += span;
            context.children.push(LayoutChild {
                index,
                dimensions: sanitize_size(size),
            });
            placed.push(id);
        }

        for id in old.into_iter().flatten() {
            self.teardown(id, host);
        }

        self.tree.set_children(parent, &placed);
        (placed, cursor - base)
    }

    /// Finds or creates the fiber for the next view in a sibling group.
    ///
    /// `old[head]` is the first old sibling that has not been consumed yet. Its elements (and
    /// those of every unconsumed sibling after it) currently sit at `cursor` in `host`.
    #[allow(clippy::too_many_arguments)]
    fn place(
        &mut self,
        parent: Option<FiberId>,
        host: &Handle<R>,
        cursor: usize,
        old: &mut [Option<FiberId>],
        head: usize,
        view: &AnyView,
        remaining: &HashMap<Identity, usize>,
        environment: &EnvironmentValues,
    ) -> FiberId {
        // same position
        if let Some(id) = old.get(head).copied().flatten() {
            if self.tree[id].matches(&**view) {
                old[head] = None;
                trace!(?id, "reusing fiber");
                self.reuse(id, view);
                return id;
            }
        }

        // bounded lookahead for a fiber that moved
        let end = old.len().min(head + 1 + self.window);
        let found = (head + 1..end)
            .find(|&k| old[k].map_or(false, |id| self.tree[id].matches(&**view)));
        if let Some(k) = found {
            if let Some(id) = old[k].take() {
                for slot in &mut old[head..k] {
                    if let Some(skipped) = *slot {
                        if !self.is_wanted(skipped, remaining) {
                            *slot = None;
                            self.teardown(skipped, host);
                        }
                    }
                }
                if old[head..k].iter().all(Option::is_none) {
                    trace!(?id, "reusing fiber after removing skipped siblings");
                } else {
                    self.move_to(id, host, cursor);
                }
                self.reuse(id, view);
                return id;
            }
        }

        // new fiber; the old one at this position goes unless a later view wants it
        let previous = old
            .get(head)
            .copied()
            .flatten()
            .filter(|&previous| !self.is_wanted(previous, remaining));
        if previous.is_some() {
            old[head] = None;
        }

        let primitive = self.renderer.is_primitive(&**view);
        let replace = primitive && previous.map_or(false, |previous| self.tree[previous].is_primitive());
        let id = self.create(parent, host, cursor, view, primitive, !replace, environment);

        if let Some(previous) = previous {
            if replace {
                self.replace(previous, id, host);
            } else {
                self.teardown(previous, host);
            }
        }
        id
    }

    fn is_wanted(&self, id: FiberId, remaining: &HashMap<Identity, usize>) -> bool {
        let fiber = &self.tree[id];
        remaining
            .get(&(fiber.view_type, fiber.key))
            .map_or(false, |count| *count > 0)
    }

    /// Points a matched fiber at its new view, emitting an update if the element’s content changed.
    fn reuse(&mut self, id: FiberId, view: &AnyView) {
        let renderer = self.renderer;
        if View::eq(&*self.tree[id].view, &**view) {
            return;
        }
        if let Some(fiber) = self.tree.get_mut(id) {
            fiber.view = Arc::clone(view);
            fiber.key = view.key();
            fiber.stale = true;

            if let Some(element) = &fiber.element {
                let content = renderer.element_content(&**view);
                if fiber.content.as_ref() != Some(&content) {
                    self.log.push(Mutation::Update {
                        element: element.clone(),
                        content: content.clone(),
                    });
                    fiber.content = Some(content);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn create(
        &mut self,
        parent: Option<FiberId>,
        host: &Handle<R>,
        cursor: usize,
        view: &AnyView,
        primitive: bool,
        insert: bool,
        environment: &EnvironmentValues,
    ) -> FiberId {
        let element = if primitive {
            let content = self.renderer.element_content(&**view);
            let element = ElementHandle::<R::Element>::new(content.clone());
            if insert {
                self.log.push(Mutation::Insert {
                    element: element.clone(),
                    parent: host.clone(),
                    index: cursor,
                });
            }
            Some((element, content))
        } else {
            None
        };
        let id = self
            .tree
            .insert(Fiber::new(Arc::clone(view), parent, element, environment));
        trace!(?id, view = view.type_name(), primitive, "created fiber");
        id
    }

    /// Moves a fiber’s elements to `cursor`. There is no native move, so this removes and
    /// re-inserts them.
    fn move_to(&mut self, id: FiberId, host: &Handle<R>, cursor: usize) {
        let elements = self.tree.host_elements(id);
        trace!(?id, to = cursor, elements = elements.len(), "moving fiber");
        for element in &elements {
            self.log.push(Mutation::Remove {
                element: element.clone(),
                parent: Some(host.clone()),
            });
        }
        for (i, element) in elements.into_iter().enumerate() {
            self.log.push(Mutation::Insert {
                element,
                parent: host.clone(),
                index: cursor + i,
            });
        }
    }

    /// Swaps a primitive fiber’s element for a freshly created one at the same position.
    fn replace(&mut self, previous: FiberId, id: FiberId, host: &Handle<R>) {
        let old_element = self.tree.get(previous).and_then(|f| f.element.clone());
        let new_element = self.tree.get(id).and_then(|f| f.element.clone());
        match (old_element, new_element) {
            (Some(old_element), Some(new_element)) => {
                trace!(?previous, ?id, "replacing fiber");
                self.teardown_children(previous, &old_element);
                self.log.push(Mutation::Replace {
                    parent: host.clone(),
                    previous: old_element,
                    replacement: new_element,
                });
                self.tree.remove(previous);
            }
            _ => self.teardown(previous, host),
        }
    }

    /// Destroys a fiber and its subtree, children first.
    fn teardown(&mut self, id: FiberId, host: &Handle<R>) {
        let element = self.tree.get(id).and_then(|f| f.element.clone());
        self.teardown_children(id, element.as_ref().unwrap_or(host));
        if let Some(element) = element {
            self.log.push(Mutation::Remove {
                element,
                parent: Some(host.clone()),
            });
        }
        self.tree.remove(id);
        trace!(?id, "tore down fiber");
    }

    fn teardown_children(&mut self, id: FiberId, host: &Handle<R>) {
        let children: Vec<FiberId> = self.tree.children(id).collect();
        for child in children {
            self.teardown(child, host);
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{ColorScheme, ColorSchemeKey};
    use crate::modifier::ViewExt;
    use crate::preference::{combine, PreferenceKey};
    use crate::testing::{TestElement, TestRenderer};
    use crate::view::{Fragment, Stack, Text};
    use cgmath::Vector2;
    use proptest::prelude::*;

    fn keyed(items: &[(u64, &str)]) -> AnyView {
        Arc::new(Stack::vertical(
            items
                .iter()
                .map(|(key, text)| Text::new(*text).id(*key).erase())
                .collect(),
        ))
    }

    fn texts(items: &[&str]) -> AnyView {
        Arc::new(Stack::vertical(
            items.iter().map(|text| Text::new(*text).erase()).collect(),
        ))
    }

    fn stack_element(reconciler: &Reconciler<TestRenderer>) -> ElementHandle<TestElement> {
        reconciler.renderer().root.children()[0].clone()
    }

    fn root_fiber(reconciler: &Reconciler<TestRenderer>) -> FiberId {
        reconciler.tree().root().unwrap()
    }

    #[test]
    fn first_render_mounts_the_tree() {
        let reconciler = TestRenderer::new().render(texts(&["a", "b"]));
        let renderer = reconciler.renderer();
        assert_eq!(renderer.root.child_contents(), vec!["stack"]);
        assert_eq!(stack_element(&reconciler).child_contents(), vec!["a", "b"]);
        assert_eq!(renderer.commits(), 1);
        assert_eq!(reconciler.tree().len(), 3);
    }

    #[test]
    fn rerendering_an_equal_tree_is_a_no_op() {
        let reconciler = TestRenderer::new().render(keyed(&[(1, "a"), (2, "b")]));
        let prepared = reconciler.prepare(keyed(&[(1, "a"), (2, "b")]));
        assert!(prepared.mutations().is_empty());
        assert_eq!(prepared.tree().journaled_slots(), 0);
        prepared.commit();
        assert_eq!(reconciler.renderer().commits(), 2);
        assert_eq!(reconciler.renderer().applied().len(), 3);
    }

    #[test]
    fn unchanged_positions_keep_their_elements() {
        let reconciler = TestRenderer::new().render(texts(&["a", "b", "c"]));
        let before = stack_element(&reconciler).children();
        reconciler.render(texts(&["a", "b2", "c"]));
        let after = stack_element(&reconciler).children();
        assert_eq!(before, after);
        assert_eq!(stack_element(&reconciler).child_contents(), vec!["a", "b2", "c"]);
    }

    #[test]
    fn changed_content_is_updated_in_place() {
        let reconciler = TestRenderer::new().render(texts(&["a", "b"]));
        let prepared = reconciler.prepare(texts(&["a", "c"]));
        let mutations: Vec<_> = prepared.mutations().iter().cloned().collect();
        prepared.commit();

        assert_eq!(mutations.len(), 1);
        let b = stack_element(&reconciler).children()[1].clone();
        assert!(matches!(
            &mutations[0],
            Mutation::Update { element, content } if element.ptr_eq(&b) && content == "c"
        ));
    }

    #[test]
    fn inserting_a_sibling_emits_one_insert() {
        let reconciler = TestRenderer::new().render(keyed(&[(1, "a"), (2, "b")]));
        let stack = stack_element(&reconciler);
        let prepared = reconciler.prepare(keyed(&[(1, "a"), (3, "x"), (2, "b")]));
        let mutations: Vec<_> = prepared.mutations().iter().cloned().collect();
        prepared.commit();

        assert_eq!(mutations.len(), 1);
        match &mutations[0] {
            Mutation::Insert {
                element,
                parent,
                index,
            } => {
                assert_eq!(element.content(), "x");
                assert!(parent.ptr_eq(&stack));
                assert_eq!(*index, 1);
            }
            other => panic!("expected an insert, got {:?}", other),
        }
        assert_eq!(stack.child_contents(), vec!["a", "x", "b"]);
    }

    #[test]
    fn removing_a_sibling_emits_one_remove() {
        let reconciler = TestRenderer::new().render(keyed(&[(1, "a"), (2, "b"), (3, "c")]));
        let stack = stack_element(&reconciler);
        let b = stack.children()[1].clone();
        let prepared = reconciler.prepare(keyed(&[(1, "a"), (3, "c")]));
        let mutations: Vec<_> = prepared.mutations().iter().cloned().collect();
        prepared.commit();

        assert_eq!(mutations.len(), 1);
        assert!(matches!(
            &mutations[0],
            Mutation::Remove { element, parent: Some(parent) } if element.ptr_eq(&b) && parent.ptr_eq(&stack)
        ));
        assert_eq!(stack.child_contents(), vec!["a", "c"]);
        assert_eq!(reconciler.tree().len(), 5);
    }

    #[test]
    fn keyed_reorder_moves_elements() {
        let reconciler = TestRenderer::new().render(keyed(&[(1, "a"), (2, "b"), (3, "c")]));
        let stack = stack_element(&reconciler);
        let before = stack.children();

        let prepared = reconciler.prepare(keyed(&[(3, "c"), (1, "a"), (2, "b")]));
        assert_eq!(prepared.mutations().counts(), (1, 1, 0, 0));
        prepared.commit();

        let after = stack.children();
        assert_eq!(stack.child_contents(), vec!["c", "a", "b"]);
        assert!(after[0].ptr_eq(&before[2]));
        assert!(after[1].ptr_eq(&before[0]));
        assert!(after[2].ptr_eq(&before[1]));
    }

    #[test]
    fn swapped_keys_keep_both_elements() {
        let reconciler = TestRenderer::new().render(keyed(&[(1, "a"), (2, "b")]));
        let stack = stack_element(&reconciler);
        let before = stack.children();

        reconciler.render(keyed(&[(2, "b"), (1, "a")]));
        let after = stack.children();
        assert_eq!(stack.child_contents(), vec!["b", "a"]);
        assert!(after[0].ptr_eq(&before[1]));
        assert!(after[1].ptr_eq(&before[0]));
    }

    #[test]
    fn moves_beyond_the_lookahead_window_recreate() {
        let config = ReconcilerConfig::default().lookahead_window(0);
        let reconciler =
            Reconciler::with_config(TestRenderer::new(), keyed(&[(1, "a"), (2, "b")]), config);
        let stack = stack_element(&reconciler);
        let before = stack.children();

        reconciler.render(keyed(&[(2, "b"), (1, "a")]));
        let after = stack.children();
        assert_eq!(stack.child_contents(), vec!["b", "a"]);
        assert!(after[1].ptr_eq(&before[0]));
        assert!(!after[0].ptr_eq(&before[1]));
    }

    #[test]
    fn type_change_replaces_the_element() {
        let reconciler = TestRenderer::new().render(texts(&["a"]));
        let stack = stack_element(&reconciler);
        let old = stack.children()[0].clone();

        let next: AnyView = Arc::new(Stack::vertical(vec![Stack::horizontal(vec![]).erase()]));
        let prepared = reconciler.prepare(next);
        let mutations: Vec<_> = prepared.mutations().iter().cloned().collect();
        prepared.commit();

        assert_eq!(mutations.len(), 1);
        assert!(matches!(
            &mutations[0],
            Mutation::Replace { previous, parent, .. } if previous.ptr_eq(&old) && parent.ptr_eq(&stack)
        ));
        assert_eq!(stack.child_contents(), vec!["stack"]);
    }

    #[test]
    fn teardown_removes_descendants_first() {
        let inner = Stack::vertical(vec![Text::new("a").erase(), Text::new("b").erase()]);
        let reconciler =
            TestRenderer::new().render(Arc::new(Stack::vertical(vec![inner.erase()])));
        let outer = stack_element(&reconciler);
        let inner = outer.children()[0].clone();
        let leaves = inner.children();

        let prepared = reconciler.prepare(Arc::new(Stack::vertical(vec![])));
        let removed: Vec<_> = prepared
            .mutations()
            .iter()
            .map(|mutation| match mutation {
                Mutation::Remove {
                    element,
                    parent: Some(parent),
                } => (element.clone(), parent.clone()),
                other => panic!("expected only removes, got {:?}", other),
            })
            .collect();
        prepared.commit();

        assert_eq!(removed.len(), 3);
        assert!(removed[0].0.ptr_eq(&leaves[0]) && removed[0].1.ptr_eq(&inner));
        assert!(removed[1].0.ptr_eq(&leaves[1]) && removed[1].1.ptr_eq(&inner));
        assert!(removed[2].0.ptr_eq(&inner) && removed[2].1.ptr_eq(&outer));
        assert_eq!(reconciler.tree().len(), 1);
    }

    #[test]
    fn composite_children_are_flattened_into_the_host() {
        let fragment = |items: &[&str]| -> AnyView {
            Arc::new(
                items
                    .iter()
                    .map(|text| Text::new(*text).erase())
                    .collect::<Fragment>(),
            )
        };
        let tree = |middle: &[&str]| -> AnyView {
            Arc::new(Stack::vertical(vec![
                Text::new("a").erase(),
                fragment(middle),
                Text::new("d").erase(),
            ]))
        };

        let reconciler = TestRenderer::new().render(tree(&["b", "c"]));
        let stack = stack_element(&reconciler);
        assert_eq!(stack.child_contents(), vec!["a", "b", "c", "d"]);

        let prepared = reconciler.prepare(tree(&["b", "c", "x"]));
        let mutations: Vec<_> = prepared.mutations().iter().cloned().collect();
        prepared.commit();
        assert_eq!(mutations.len(), 1);
        assert!(matches!(&mutations[0], Mutation::Insert { index: 3, .. }));
        assert_eq!(stack.child_contents(), vec!["a", "b", "c", "x", "d"]);

        reconciler.render(tree(&[]));
        assert_eq!(stack.child_contents(), vec!["a", "d"]);
    }

    #[test]
    fn padding_shrinks_the_proposal_and_offsets_the_child() {
        let reconciler = TestRenderer::with_proposal(ProposedSize::new(100., 100.))
            .render(Text::new("x").padding().erase());
        let tree = reconciler.tree();
        let root = tree.root().unwrap();
        let text = tree.children(root).next().unwrap();

        assert_eq!(tree[root].proposed_size(), ProposedSize::new(100., 100.));
        assert_eq!(tree[text].proposed_size(), ProposedSize::new(80., 80.));
        assert_eq!(tree[text].frame().origin, Point2::new(10., 10.));
        assert_eq!(tree[text].frame().size, Vector2::new(80., 80.));
        assert_eq!(tree[root].requested_size(), Vector2::new(100., 100.));
    }

    #[test]
    fn degenerate_proposals_are_clamped() {
        let reconciler = TestRenderer::with_proposal(ProposedSize::new(-5., f64::NAN))
            .render(Text::new("x").erase());
        let root = root_fiber(&reconciler);
        let tree = reconciler.tree();
        assert_eq!(tree[root].proposed_size(), ProposedSize::new(0., 0.));
        assert_eq!(tree[root].requested_size(), Vector2::new(0., 0.));
    }

    #[test]
    fn stacks_place_children_along_their_axis() {
        let view = Stack::vertical(vec![
            Text::new("a").frame(Some(20.), Some(10.)).erase(),
            Text::new("b").frame(Some(30.), Some(15.)).erase(),
        ])
        .spacing(5.);
        let reconciler = TestRenderer::new().render(view.erase());
        let root = root_fiber(&reconciler);
        let tree = reconciler.tree();
        let children: Vec<_> = tree.children(root).collect();

        assert_eq!(tree[children[0]].frame().origin, Point2::new(0., 0.));
        assert_eq!(tree[children[1]].frame().origin, Point2::new(0., 15.));
        assert_eq!(tree[root].requested_size(), Vector2::new(30., 30.));
    }

    #[test]
    fn environment_snapshots_are_shared_until_written() {
        let view = Stack::vertical(vec![
            Text::new("a").erase(),
            Text::new("b")
                .environment::<ColorSchemeKey>(ColorScheme::Dark)
                .erase(),
        ]);
        let reconciler = TestRenderer::new().render(view.erase());
        let root = root_fiber(&reconciler);
        let tree = reconciler.tree();
        let children: Vec<_> = tree.children(root).collect();
        let writer_child = tree.children(children[1]).next().unwrap();

        assert!(tree[children[0]].environment().ptr_eq(tree[root].environment()));
        assert!(!tree[children[1]].environment().ptr_eq(tree[root].environment()));
        assert_eq!(tree[children[1]].environment().get::<ColorSchemeKey>(), ColorScheme::Dark);
        assert_eq!(tree[writer_child].environment().get::<ColorSchemeKey>(), ColorScheme::Dark);
        assert_eq!(tree[children[0]].environment().get::<ColorSchemeKey>(), ColorScheme::Light);
    }

    #[derive(Debug)]
    struct Badges;
    impl PreferenceKey for Badges {
        type Value = u32;
        fn default_value() -> u32 {
            0
        }
        fn reduce(value: &mut u32, next: u32) {
            combine(value, next, |a, b| a + b)
        }
    }

    #[test]
    fn preferences_bubble_to_ancestors() {
        let view = |b: u32| {
            Stack::vertical(vec![
                Text::new("a").preference::<Badges>(2).erase(),
                Text::new("b").preference::<Badges>(b).erase(),
                Text::new("c").erase(),
            ])
            .erase()
        };
        let reconciler = TestRenderer::new().render(view(3));
        let root = root_fiber(&reconciler);
        assert_eq!(reconciler.tree()[root].preferences().value::<Badges>(), 5);

        reconciler.render(view(10));
        assert_eq!(reconciler.tree()[root].preferences().value::<Badges>(), 12);
    }

    #[test]
    fn concurrent_passes_are_rejected() {
        let reconciler = TestRenderer::new().render(texts(&["a"]));
        let prepared = reconciler.prepare(texts(&["b"]));
        assert_eq!(reconciler.try_render(texts(&["c"])), Err(RenderError::Busy));
        assert!(matches!(
            reconciler.try_prepare(texts(&["c"])),
            Err(RenderError::Busy)
        ));
        prepared.commit();
        assert_eq!(reconciler.try_render(texts(&["c"])), Ok(()));
        assert_eq!(stack_element(&reconciler).child_contents(), vec!["c"]);
    }

    #[test]
    fn discarded_passes_leave_everything_untouched() {
        let reconciler = TestRenderer::new().render(texts(&["a"]));
        let len = reconciler.tree().len();

        let prepared = reconciler.prepare(texts(&["a", "b", "c"]));
        assert_eq!(prepared.mutations().len(), 2);
        assert_eq!(prepared.tree().len(), len + 2);
        prepared.cancel();

        assert_eq!(reconciler.renderer().commits(), 1);
        assert_eq!(stack_element(&reconciler).child_contents(), vec!["a"]);
        assert_eq!(reconciler.tree().len(), len);

        let prepared = reconciler.prepare(texts(&["a", "b", "c"]));
        assert_eq!(prepared.mutations().len(), 2);
        prepared.commit();
        assert_eq!(stack_element(&reconciler).child_contents(), vec!["a", "b", "c"]);
    }

    #[test]
    fn discarded_passes_restore_recycled_slots() {
        let reconciler = TestRenderer::new().render(keyed(&[(1, "a"), (2, "b"), (3, "c")]));
        let stack = stack_element(&reconciler);
        let before = stack.children();

        let prepared = reconciler.prepare(keyed(&[(4, "d"), (5, "e")]));
        assert_eq!(prepared.mutations().counts(), (2, 3, 0, 0));
        drop(prepared);

        let prepared = reconciler.prepare(keyed(&[(1, "a"), (2, "b"), (3, "c"), (5, "e")]));
        assert_eq!(prepared.mutations().counts(), (1, 0, 0, 0));
        prepared.commit();
        let after = stack.children();
        assert_eq!(stack.child_contents(), vec!["a", "b", "c", "e"]);
        for (old, new) in before.iter().zip(&after) {
            assert!(old.ptr_eq(new));
        }
    }

    #[test]
    fn absolute_frames_compose_nested_offsets() {
        let view = Text::new("x")
            .frame(Some(40.), Some(40.))
            .padding()
            .padding();
        let reconciler =
            TestRenderer::with_proposal(ProposedSize::new(100., 100.)).render(view.erase());
        let tree = reconciler.tree();
        let mut id = tree.root().unwrap();
        while let Some(child) = tree.children(id).next() {
            id = child;
        }
        assert_eq!(
            tree.absolute_frame(id),
            Some(Rect::new(Point2::new(20., 20.), Vector2::new(40., 40.)))
        );
    }

    fn distinct_keys() -> impl Strategy<Value = Vec<u64>> {
        proptest::collection::hash_set(0u64..24, 0..12)
            .prop_map(|keys| keys.into_iter().collect::<Vec<_>>())
            .prop_shuffle()
    }

    fn keyed_view(keys: &[u64]) -> AnyView {
        let texts: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
        let items: Vec<(u64, &str)> = keys
            .iter()
            .zip(&texts)
            .map(|(key, text)| (*key, text.as_str()))
            .collect();
        keyed(&items)
    }

    proptest! {
        #[test]
        fn any_keyed_edit_converges(before in distinct_keys(), after in distinct_keys()) {
            let reconciler = TestRenderer::new().render(keyed_view(&before));
            let stack = stack_element(&reconciler);
            let old: HashMap<String, ElementHandle<TestElement>> = stack
                .children()
                .into_iter()
                .map(|element| (element.content(), element))
                .collect();

            reconciler.render(keyed_view(&after));
            let expected: Vec<String> = after.iter().map(|key| key.to_string()).collect();
            prop_assert_eq!(stack.child_contents(), expected);

            for element in stack.children() {
                if let Some(previous) = old.get(&element.content()) {
                    prop_assert!(previous.ptr_eq(&element));
                }
            }

            let prepared = reconciler.prepare(keyed_view(&after));
            prop_assert!(prepared.mutations().is_empty());
        }
    }
}
