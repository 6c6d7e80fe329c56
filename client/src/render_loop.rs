use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;

/// Throttles work to `requestAnimationFrame`.
///
/// `request()` cancels any pending frame before scheduling a new one, so at most
/// one callback runs per vsync no matter how many view events arrive in between.
/// When the frame function returns `true` another frame is scheduled (animations).
pub struct FrameScheduler {
    inner: Rc<Inner>,
}

struct Inner {
    window: Option<web_sys::Window>,
    raf_id: Cell<Option<i32>>,
    callback: RefCell<Option<Closure<dyn FnMut(f64)>>>,
}

impl Inner {
    fn cancel(&self) {
        if let Some(raf_id) = self.raf_id.replace(None)
            && let Some(window) = self.window.as_ref()
        {
            let _ = window.cancel_animation_frame(raf_id);
        }
    }

    fn schedule(&self) {
        self.cancel();
        let cb_ref = self.callback.borrow();
        let (Some(cb), Some(window)) = (cb_ref.as_ref(), self.window.as_ref()) else {
            return;
        };
        if let Ok(id) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
            self.raf_id.set(Some(id));
        }
    }
}

impl FrameScheduler {
    /// `frame_fn` receives the rAF timestamp in milliseconds.
    pub fn new(frame_fn: impl Fn(f64) -> bool + 'static) -> Self {
        let inner = Rc::new(Inner {
            window: web_sys::window(),
            raf_id: Cell::new(None),
            callback: RefCell::new(None),
        });

        let inner_cb = inner.clone();
        let cb = Closure::<dyn FnMut(f64)>::new(move |timestamp: f64| {
            inner_cb.raf_id.set(None);
            if frame_fn(timestamp) {
                inner_cb.schedule();
            }
        });
        *inner.callback.borrow_mut() = Some(cb);

        Self { inner }
    }

    pub fn request(&self) {
        self.inner.schedule();
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.inner.raf_id.get().is_some()
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.inner.cancel();
        // Break the callback->inner reference cycle on teardown.
        self.inner.callback.borrow_mut().take();
    }
}
