use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use wgpu::Device;

/// Scoped wrapper around wgpu's validation error scope. Pipeline and shader
/// creation inside the scope surfaces validation failures through [`end`](Self::end)
/// instead of the global uncaptured-error handler.
#[must_use = "All error scopes must end in a call to `end`"]
pub struct ValidationErrorScope<'a> {
    device: &'a Device,
}

impl<'a> ValidationErrorScope<'a> {
    pub fn new(device: &'a Device) -> Self {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        Self { device }
    }

    pub fn end(self) -> Result<(), wgpu::Error> {
        let device = self.device;
        std::mem::forget(self);

        let mut future = device.pop_error_scope();
        let pin = Pin::new(&mut future);
        match pin.poll(&mut Context::from_waker(&noop_waker::noop_waker())) {
            // We got an error, so return an error.
            Poll::Ready(Some(error)) => Err(error),
            // We got no error, so return nothing.
            Poll::Ready(None) => Ok(()),
            // We're on webgpu, pretend everything always works.
            Poll::Pending => Ok(()),
        }
    }
}

impl<'a> Drop for ValidationErrorScope<'a> {
    fn drop(&mut self) {
        log::error!("ValidationErrorScope dropped without calling `end`");
    }
}
