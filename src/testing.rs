//! A recording in-memory renderer for unit tests.

use crate::geometry::ProposedSize;
use crate::mutation::{Element, ElementHandle, Mutation, MutationLog};
use crate::renderer::Renderer;
use crate::view::{Primitive, View};
use parking_lot::Mutex;

#[derive(Debug)]
pub(crate) struct TestElement {
    content: Mutex<String>,
    children: Mutex<Vec<ElementHandle<TestElement>>>,
}

impl Element for TestElement {
    type Content = String;

    fn new(content: String) -> TestElement {
        TestElement {
            content: Mutex::new(content),
            children: Mutex::new(Vec::new()),
        }
    }

    fn update(&self, content: String) {
        *self.content.lock() = content;
    }
}

impl TestElement {
    pub(crate) fn content(&self) -> String {
        self.content.lock().clone()
    }

    pub(crate) fn children(&self) -> Vec<ElementHandle<TestElement>> {
        self.children.lock().clone()
    }

    /// Contents of the children, in order.
    pub(crate) fn child_contents(&self) -> Vec<String> {
        self.children.lock().iter().map(|c| c.content()).collect()
    }
}

/// Maps `Text` to its string and stacks to `"stack"`, and applies every commit to an element
/// tree under `root`.
#[derive(Debug)]
pub(crate) struct TestRenderer {
    pub(crate) root: ElementHandle<TestElement>,
    pub(crate) proposal: ProposedSize,
    /// Every mutation applied so far, in order.
    pub(crate) applied: Mutex<Vec<Mutation<TestElement>>>,
    pub(crate) commits: Mutex<usize>,
}

impl TestRenderer {
    pub(crate) fn new() -> TestRenderer {
        TestRenderer::with_proposal(ProposedSize::UNSPECIFIED)
    }

    pub(crate) fn with_proposal(proposal: ProposedSize) -> TestRenderer {
        TestRenderer {
            root: ElementHandle::new("root".to_string()),
            proposal,
            applied: Mutex::new(Vec::new()),
            commits: Mutex::new(0),
        }
    }

    pub(crate) fn applied(&self) -> Vec<Mutation<TestElement>> {
        self.applied.lock().clone()
    }

    pub(crate) fn commits(&self) -> usize {
        *self.commits.lock()
    }
}

impl Renderer for TestRenderer {
    type Element = TestElement;

    fn is_primitive(&self, view: &dyn View) -> bool {
        view.primitive().is_some()
    }

    fn element_content(&self, view: &dyn View) -> String {
        match view.primitive() {
            Some(Primitive::Text(text)) => text.to_string(),
            Some(Primitive::Stack { .. }) => "stack".to_string(),
            None => panic!("{} is not primitive", view.type_name()),
        }
    }

    fn commit(&self, mutations: MutationLog<TestElement>) {
        *self.commits.lock() += 1;
        for mutation in mutations {
            match &mutation {
                Mutation::Insert {
                    element,
                    parent,
                    index,
                } => {
                    let mut children = parent.children.lock();
                    let index = (*index).min(children.len());
                    children.insert(index, element.clone());
                }
                Mutation::Remove { element, parent } => {
                    if let Some(parent) = parent {
                        parent.children.lock().retain(|c| !c.ptr_eq(element));
                    }
                }
                Mutation::Replace {
                    parent,
                    previous,
                    replacement,
                } => {
                    let mut children = parent.children.lock();
                    if let Some(slot) = children.iter_mut().find(|c| c.ptr_eq(previous)) {
                        *slot = replacement.clone();
                    }
                }
                Mutation::Update { element, content } => element.update(content.clone()),
            }
            self.applied.lock().push(mutation);
        }
    }

    fn root_element(&self) -> ElementHandle<TestElement> {
        self.root.clone()
    }

    fn root_proposal(&self) -> ProposedSize {
        self.proposal
    }
}

#[test]
fn commit_applies_mutations_in_order() {
    let renderer = TestRenderer::new();
    let first = ElementHandle::<TestElement>::new("first".to_string());
    let second = ElementHandle::<TestElement>::new("second".to_string());
    renderer.commit(MutationLog::from(vec![Mutation::Insert {
        element: first.clone(),
        parent: renderer.root.clone(),
        index: 0,
    }]));

    renderer.commit(MutationLog::from(vec![
        Mutation::Remove {
            element: first.clone(),
            parent: Some(renderer.root.clone()),
        },
        Mutation::Insert {
            element: second.clone(),
            parent: renderer.root.clone(),
            index: 0,
        },
    ]));

    let applied = renderer.applied();
    assert_eq!(applied.len(), 3);
    assert!(matches!(&applied[1], Mutation::Remove { element, .. } if element.ptr_eq(&first)));
    assert!(matches!(&applied[2], Mutation::Insert { element, index: 0, .. } if element.ptr_eq(&second)));
    assert_eq!(renderer.root.child_contents(), vec!["second".to_string()]);
    assert_eq!(renderer.commits(), 2);
}

#[test]
fn removing_without_a_parent_is_a_no_op() {
    let renderer = TestRenderer::new();
    let first = ElementHandle::<TestElement>::new("first".to_string());
    let second = ElementHandle::<TestElement>::new("second".to_string());
    renderer.commit(MutationLog::from(vec![
        Mutation::Insert {
            element: first.clone(),
            parent: renderer.root.clone(),
            index: 0,
        },
        Mutation::Remove {
            element: first.clone(),
            parent: None,
        },
        Mutation::Insert {
            element: second,
            parent: renderer.root.clone(),
            index: 1,
        },
    ]));

    assert_eq!(renderer.applied().len(), 3);
    assert_eq!(
        renderer.root.child_contents(),
        vec!["first".to_string(), "second".to_string()]
    );
}
