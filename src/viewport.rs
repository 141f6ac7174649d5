//! Viewport size tracking and resize notifications

use std::sync::Arc;

use parking_lot::Mutex;
use winit::{dpi::PhysicalSize, event::WindowEvent};

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Scale both sides, never going below one pixel
    pub fn scaled(&self, scale: f32) -> Self {
        Self {
            width: ((self.width as f32 * scale) as u32).max(1),
            height: ((self.height as f32 * scale) as u32).max(1),
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

impl From<PhysicalSize<u32>> for Extent {
    fn from(size: PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

/// Handle held by a resize listener
///
/// The viewport writes the latest extent into every live subscription; the owner
/// applies it with [`ResizeSubscription::take_pending`] at a point of its choosing.
#[derive(Debug, Clone)]
pub struct ResizeSubscription {
    pending: Arc<Mutex<Option<Extent>>>,
}

impl ResizeSubscription {
    /// Latest extent delivered since the last call, if any
    pub fn take_pending(&self) -> Option<Extent> {
        self.pending.lock().take()
    }
}

/// Current window dimensions plus resize subscriptions
#[derive(Debug)]
pub struct Viewport {
    extent: Extent,
    listeners: Vec<Arc<Mutex<Option<Extent>>>>,
}

impl Viewport {
    pub fn new(extent: Extent) -> Self {
        Self {
            extent: clamp(extent),
            listeners: Vec::new(),
        }
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Track window resizes; every other event is ignored
    pub fn handle_event(&mut self, event: &WindowEvent) {
        if let WindowEvent::Resized(size) = event {
            self.resize((*size).into());
        }
    }

    /// Set a new size and notify every subscription
    pub fn resize(&mut self, extent: Extent) {
        let extent = clamp(extent);
        if extent == self.extent {
            return;
        }
        log::info!(
            "Viewport resized {}x{} -> {}x{}",
            self.extent.width,
            self.extent.height,
            extent.width,
            extent.height
        );
        self.extent = extent;
        for listener in &self.listeners {
            *listener.lock() = Some(extent);
        }
    }

    pub fn subscribe(&mut self) -> ResizeSubscription {
        let pending = Arc::new(Mutex::new(None));
        self.listeners.push(Arc::clone(&pending));
        ResizeSubscription { pending }
    }

    /// Remove a subscription; returns false if it was not registered
    pub fn unsubscribe(&mut self, subscription: &ResizeSubscription) -> bool {
        let before = self.listeners.len();
        self.listeners
            .retain(|l| !Arc::ptr_eq(l, &subscription.pending));
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

fn clamp(extent: Extent) -> Extent {
    Extent::new(extent.width.max(1), extent.height.max(1))
}
