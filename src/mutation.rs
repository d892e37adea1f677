//! Backend-agnostic tree edits.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Deref;
use std::sync::Arc;

/// A backend-native node.
///
/// Elements are shared through [`ElementHandle`]s and updated in place, so implementations use
/// interior mutability for their content.
pub trait Element: fmt::Debug + Send + Sync + 'static {
    /// Observable content of an element, derived from a primitive view.
    type Content: Clone + fmt::Debug + PartialEq + Send + Sync + 'static;

    fn new(content: Self::Content) -> Self;

    /// Overwrites the content, keeping the element’s identity.
    fn update(&self, content: Self::Content);
}

/// A referentially compared handle to an element.
pub struct ElementHandle<E>(Arc<E>);

impl<E: Element> ElementHandle<E> {
    /// Creates an element that is not attached anywhere yet.
    pub fn new(content: E::Content) -> ElementHandle<E> {
        ElementHandle(Arc::new(E::new(content)))
    }
}

impl<E> ElementHandle<E> {
    /// Returns true if both handles refer to the same element.
    pub fn ptr_eq(&self, other: &ElementHandle<E>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<E> Clone for ElementHandle<E> {
    fn clone(&self) -> Self {
        ElementHandle(Arc::clone(&self.0))
    }
}

impl<E> PartialEq for ElementHandle<E> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<E> Eq for ElementHandle<E> {}

impl<E> Hash for ElementHandle<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state)
    }
}

impl<E> Deref for ElementHandle<E> {
    type Target = E;
    fn deref(&self) -> &E {
        &self.0
    }
}

impl<E: fmt::Debug> fmt::Debug for ElementHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ElementHandle({:p}, {:?})", Arc::as_ptr(&self.0), self.0)
    }
}

/// One atomic edit of the backend’s element tree.
pub enum Mutation<E: Element> {
    /// Inserts `element` into `parent`’s children at `index`.
    Insert {
        element: ElementHandle<E>,
        parent: ElementHandle<E>,
        index: usize,
    },
    /// Detaches `element` from `parent`.
    Remove {
        element: ElementHandle<E>,
        parent: Option<ElementHandle<E>>,
    },
    /// Swaps `previous` for `replacement` in `parent`’s children.
    Replace {
        parent: ElementHandle<E>,
        previous: ElementHandle<E>,
        replacement: ElementHandle<E>,
    },
    /// Overwrites the content of `element` in place.
    Update {
        element: ElementHandle<E>,
        content: E::Content,
    },
}

impl<E: Element> Clone for Mutation<E> {
    fn clone(&self) -> Self {
        match self {
            Mutation::Insert {
                element,
                parent,
                index,
            } => Mutation::Insert {
                element: element.clone(),
                parent: parent.clone(),
                index: *index,
            },
            Mutation::Remove { element, parent } => Mutation::Remove {
                element: element.clone(),
                parent: parent.clone(),
            },
            Mutation::Replace {
                parent,
                previous,
                replacement,
            } => Mutation::Replace {
                parent: parent.clone(),
                previous: previous.clone(),
                replacement: replacement.clone(),
            },
            Mutation::Update { element, content } => Mutation::Update {
                element: element.clone(),
                content: content.clone(),
            },
        }
    }
}

impl<E: Element> fmt::Debug for Mutation<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Mutation::Insert {
                element,
                parent,
                index,
            } => write!(
                f,
                "Insert({:p} into {:p} at {})",
                &**element, &**parent, index
            ),
            Mutation::Remove { element, parent } => match parent {
                Some(parent) => write!(f, "Remove({:p} from {:p})", &**element, &**parent),
                None => write!(f, "Remove({:p})", &**element),
            },
            Mutation::Replace {
                parent,
                previous,
                replacement,
            } => write!(
                f,
                "Replace({:p} with {:p} in {:p})",
                &**previous, &**replacement, &**parent
            ),
            Mutation::Update { element, content } => {
                write!(f, "Update({:p}, {:?})", &**element, content)
            }
        }
    }
}

/// The ordered edits produced by one reconciliation pass.
///
/// Mutations must be applied in order. A log is handed to the renderer whole, once the pass that
/// produced it has completed.
pub struct MutationLog<E: Element> {
    mutations: Vec<Mutation<E>>,
}

impl<E: Element> MutationLog<E> {
    pub fn new() -> MutationLog<E> {
        MutationLog {
            mutations: Vec::new(),
        }
    }

    pub fn push(&mut self, mutation: Mutation<E>) {
        self.mutations.push(mutation);
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Mutation<E>> {
        self.mutations.iter()
    }

    /// Counts (inserts, removes, replaces, updates).
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        self.mutations
            .iter()
            .fold((0, 0, 0, 0), |(i, r, p, u), mutation| match mutation {
                Mutation::Insert { .. } => (i + 1, r, p, u),
                Mutation::Remove { .. } => (i, r + 1, p, u),
                Mutation::Replace { .. } => (i, r, p + 1, u),
                Mutation::Update { .. } => (i, r, p, u + 1),
            })
    }
}

impl<E: Element> Default for MutationLog<E> {
    fn default() -> Self {
        MutationLog::new()
    }
}

impl<E: Element> Clone for MutationLog<E> {
    fn clone(&self) -> Self {
        MutationLog {
            mutations: self.mutations.clone(),
        }
    }
}

impl<E: Element> fmt::Debug for MutationLog<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(&self.mutations).finish()
    }
}

impl<E: Element> From<Vec<Mutation<E>>> for MutationLog<E> {
    fn from(mutations: Vec<Mutation<E>>) -> MutationLog<E> {
        MutationLog { mutations }
    }
}

impl<E: Element> IntoIterator for MutationLog<E> {
    type Item = Mutation<E>;
    type IntoIter = std::vec::IntoIter<Mutation<E>>;
    fn into_iter(self) -> Self::IntoIter {
        self.mutations.into_iter()
    }
}

impl<'a, E: Element> IntoIterator for &'a MutationLog<E> {
    type Item = &'a Mutation<E>;
    type IntoIter = core::slice::Iter<'a, Mutation<E>>;
    fn into_iter(self) -> Self::IntoIter {
        self.mutations.iter()
    }
}
