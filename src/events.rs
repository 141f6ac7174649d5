//! Render event bus
//!
//! Auxiliary renderers (outlines, debug drawing, text) register for a
//! [`RenderEventKind`] and draw into the frame after the main composite.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{FramebufferHandle, GpuContext};
use crate::error::RenderResult;
use crate::scene::{Camera, RenderScene};
use crate::target::Gbuffer;
use crate::viewport::Extent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderEventKind {
    RenderOutlines,
    RenderOverlays,
}

/// Frame data published by the deferred renderer
#[derive(Clone, Copy)]
pub struct ShadedFrame<'a> {
    pub camera: &'a Camera,
    pub gbuffer: &'a Gbuffer,
    pub scene: &'a dyn RenderScene,
}

/// Which renderer produced the event
#[derive(Clone, Copy)]
pub enum EventSource<'a> {
    Shaded(ShadedFrame<'a>),
    /// A renderer without a gbuffer or scene
    Unshaded { camera: &'a Camera },
}

impl<'a> EventSource<'a> {
    pub fn camera(&self) -> &'a Camera {
        match self {
            EventSource::Shaded(frame) => frame.camera,
            EventSource::Unshaded { camera } => camera,
        }
    }
}

#[derive(Clone, Copy)]
pub struct RenderEvent<'a> {
    pub kind: RenderEventKind,
    /// Framebuffer holding the composited frame
    pub target: FramebufferHandle,
    pub viewport: Extent,
    pub source: EventSource<'a>,
}

pub trait RenderEventListener: Send {
    fn on_event(&mut self, ctx: &mut dyn GpuContext, event: &RenderEvent<'_>) -> RenderResult<()>;
}

pub type SharedListener = Arc<Mutex<dyn RenderEventListener>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct RenderEventBus {
    listeners: HashMap<RenderEventKind, Vec<(ListenerId, SharedListener)>>,
    next_id: u64,
}

impl RenderEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: RenderEventKind, listener: SharedListener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.entry(kind).or_default().push((id, listener));
        id
    }

    /// Returns false if `id` was not registered
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let mut removed = false;
        for listeners in self.listeners.values_mut() {
            let before = listeners.len();
            listeners.retain(|(listener_id, _)| *listener_id != id);
            removed |= listeners.len() != before;
        }
        removed
    }

    pub fn listener_count(&self, kind: RenderEventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener of its kind in registration order
    ///
    /// A failing listener is logged and skipped; returns how many succeeded.
    pub fn dispatch(&self, ctx: &mut dyn GpuContext, event: &RenderEvent<'_>) -> usize {
        let Some(listeners) = self.listeners.get(&event.kind) else {
            return 0;
        };
        let mut delivered = 0;
        for (id, listener) in listeners {
            match listener.lock().on_event(ctx, event) {
                Ok(()) => delivered += 1,
                Err(err) => log::warn!("Listener {:?} failed on {:?}: {}", id, event.kind, err),
            }
        }
        delivered
    }
}

impl std::fmt::Debug for RenderEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<_, _> = self.listeners.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("RenderEventBus").field("listeners", &counts).finish()
    }
}
