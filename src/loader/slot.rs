//! Display slots: reusable positions whose desired key can change while a
//! fetch for an older key is still running.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::trace;

use crate::imaging::DecodedImage;

/// Where a resolved image ends up (a list row, a detail view).
///
/// Called only on the UI context.
pub trait DisplaySurface: Send + Sync {
    fn show_image(&self, image: DecodedImage);
}

struct SlotState {
    desired_key: RwLock<Option<Arc<str>>>,
    surface: Weak<dyn DisplaySurface>,
}

/// A non-owning handle to a surface plus the key it currently wants.
///
/// The slot never keeps its surface alive; once the surface is dropped,
/// deliveries are skipped.
#[derive(Clone)]
pub struct Slot {
    state: Arc<SlotState>,
}

impl Slot {
    pub fn new<S>(surface: &Arc<S>) -> Self
    where
        S: DisplaySurface + 'static,
    {
        let surface: Arc<dyn DisplaySurface> = surface.clone();
        Self {
            state: Arc::new(SlotState {
                desired_key: RwLock::new(None),
                surface: Arc::downgrade(&surface),
            }),
        }
    }

    /// The most recently requested key.
    pub fn desired_key(&self) -> Option<Arc<str>> {
        self.state.desired_key.read().clone()
    }

    pub(crate) fn set_desired_key(&self, key: &str) {
        *self.state.desired_key.write() = Some(Arc::from(key));
    }

    /// True if `key` is still what this slot wants.
    pub fn wants(&self, key: &str) -> bool {
        self.state.desired_key.read().as_deref() == Some(key)
    }

    pub fn is_alive(&self) -> bool {
        self.state.surface.strong_count() > 0
    }

    /// Hands `image` to the surface. Returns false if the surface is gone.
    pub(crate) fn show(&self, image: DecodedImage) -> bool {
        match self.state.surface.upgrade() {
            Some(surface) => {
                surface.show_image(image);
                true
            }
            None => {
                trace!("surface dropped, delivery skipped");
                false
            }
        }
    }
}
