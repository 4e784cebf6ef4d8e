use crate::util::typedefs::SsoString;
use std::ops::Deref;
use wgpu::{Buffer, BufferAddress, BufferDescriptor, BufferUsages, Device, Queue};

/// Buffer whose size is always a power of two, growing (and shrinking) as needed.
pub struct WrappedPotBuffer {
    inner: Buffer,
    size: BufferAddress,
    /// This field is assumed to be a power of 2.
    minimum: BufferAddress,
    usage: BufferUsages,
    label: Option<SsoString>,
}

impl WrappedPotBuffer {
    pub fn new(device: &Device, minimum: BufferAddress, usage: BufferUsages, label: Option<&str>) -> Self {
        let minimum_pot = minimum.next_power_of_two().max(16);

        Self {
            inner: device.create_buffer(&BufferDescriptor {
                label,
                size: minimum_pot,
                usage,
                mapped_at_creation: false,
            }),
            size: minimum_pot,
            minimum: minimum_pot,
            usage,
            label: label.map(SsoString::from),
        }
    }

    /// Determines if the buffer will resize given the desired size.
    pub fn will_resize(&self, desired: BufferAddress) -> Option<BufferAddress> {
        will_resize_inner(self.size, desired, self.minimum)
    }

    /// Writes `data` to the start of the buffer, reallocating first if it does
    /// not fit. Returns true when the underlying buffer was replaced, which
    /// invalidates any bind group referencing it.
    pub fn write_to_buffer(&mut self, device: &Device, queue: &Queue, data: &[u8]) -> bool {
        let resize = self.will_resize(data.len() as BufferAddress);
        if let Some(size) = resize {
            self.size = size;
            self.inner = device.create_buffer(&BufferDescriptor {
                label: self.label.as_deref(),
                size,
                usage: self.usage,
                mapped_at_creation: false,
            });
        }

        queue.write_buffer(&self.inner, 0, data);

        resize.is_some()
    }
}

impl Deref for WrappedPotBuffer {
    type Target = Buffer;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

fn will_resize_inner(current: BufferAddress, desired: BufferAddress, minimum: BufferAddress) -> Option<BufferAddress> {
    assert!(current.is_power_of_two());
    if current == minimum && desired <= minimum {
        return None;
    }
    let lower_bound = current / 4;
    if desired <= lower_bound || current < desired {
        Some((desired + 1).next_power_of_two().max(minimum))
    } else {
        None
    }
}
