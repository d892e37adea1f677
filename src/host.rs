//! Drives a reconciler from a queue of scheduled root views.

use crate::error::RenderError;
use crate::reconciler::Reconciler;
use crate::renderer::Renderer;
use crate::view::AnyView;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use tracing::trace;

/// Connects a view source to a renderer.
///
/// Views may be scheduled from any thread through a [`RenderHandle`]; they are rendered when the
/// owner calls [`poll`](Host::poll).
pub struct Host<R: Renderer> {
    reconciler: Reconciler<R>,
    sender: Sender<AnyView>,
    queue: Receiver<AnyView>,
}

impl<R: Renderer> Host<R> {
    /// Creates a new Host.
    ///
    /// The root view is rendered immediately.
    pub fn new(renderer: R, root: AnyView) -> Host<R> {
        Host::from_reconciler(Reconciler::new(renderer, root))
    }

    pub fn from_reconciler(reconciler: Reconciler<R>) -> Host<R> {
        let (sender, queue) = channel::unbounded();
        Host {
            reconciler,
            sender,
            queue,
        }
    }

    pub fn reconciler(&self) -> &Reconciler<R> {
        &self.reconciler
    }

    /// Returns a handle for scheduling renders on this host.
    pub fn handle(&self) -> RenderHandle {
        RenderHandle {
            sender: self.sender.clone(),
        }
    }

    /// Renders the most recently scheduled view, dropping any older ones.
    ///
    /// Returns whether anything was rendered.
    pub fn poll(&self) -> bool {
        let mut latest = None;
        let mut superseded = 0;
        loop {
            match self.queue.try_recv() {
                Ok(view) => {
                    if latest.replace(view).is_some() {
                        superseded += 1;
                    }
                }
                // the host holds a sender, so the queue cannot disconnect while it is alive
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        match latest {
            Some(view) => {
                if superseded > 0 {
                    trace!(superseded, "coalesced scheduled renders");
                }
                self.reconciler.render(view);
                true
            }
            None => false,
        }
    }
}

/// Schedules renders on a [`Host`]. Cheap to clone and safe to send across threads.
#[derive(Debug, Clone)]
pub struct RenderHandle {
    sender: Sender<AnyView>,
}

impl RenderHandle {
    /// Queues a new root view.
    ///
    /// Fails once the host has been dropped.
    pub fn schedule(&self, root: AnyView) -> Result<(), RenderError> {
        self.sender
            .send(root)
            .map_err(|_| RenderError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRenderer;
    use crate::view::{Stack, Text};
    use crate::ViewExt;
    use std::sync::Arc;
    use std::thread;

    fn texts(items: &[&str]) -> AnyView {
        Arc::new(Stack::vertical(
            items.iter().map(|text| Text::new(*text).erase()).collect(),
        ))
    }

    #[test]
    fn last_scheduled_view_wins() {
        let host = Host::new(TestRenderer::new(), texts(&["a"]));
        assert!(!host.poll());

        let handle = host.handle();
        handle.schedule(texts(&["b"])).unwrap();
        handle.schedule(texts(&["c", "d"])).unwrap();
        assert!(host.poll());
        assert!(!host.poll());

        let renderer = host.reconciler().renderer();
        assert_eq!(renderer.commits(), 2);
        let stack = renderer.root.children()[0].clone();
        assert_eq!(stack.child_contents(), vec!["c", "d"]);
    }

    #[test]
    fn handles_work_across_threads() {
        let host = Host::new(TestRenderer::new(), texts(&[]));
        let handle = host.handle();
        thread::spawn(move || handle.schedule(texts(&["x"])).unwrap())
            .join()
            .unwrap();
        assert!(host.poll());
        let stack = host.reconciler().renderer().root.children()[0].clone();
        assert_eq!(stack.child_contents(), vec!["x"]);
    }

    #[test]
    fn scheduling_fails_after_the_host_is_gone() {
        let host = Host::new(TestRenderer::new(), texts(&[]));
        let handle = host.handle();
        drop(host);
        assert_eq!(
            handle.schedule(texts(&["x"])),
            Err(RenderError::Disconnected)
        );
    }
}
