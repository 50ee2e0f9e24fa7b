//! Opaque backend object handles.
//!
//! Backends hand out plain integer handles and keep the API objects in their own
//! tables. Handles are `Copy` so frame code can hold "current frame" references
//! without borrowing the owning ring buffer.

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// The null handle. Never returned by a backend.
            pub const NULL: Self = Self(0);

            /// Wrap a raw backend value.
            #[inline]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw backend value.
            #[inline]
            pub const fn raw(self) -> u64 {
                self.0
            }

            /// Check whether this is the null handle.
            #[inline]
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }
        }
    };
}

define_handle!(
    /// Handle to a GPU buffer.
    GpuBufferHandle
);
define_handle!(
    /// Handle to a GPU texture (image + default view).
    GpuTextureHandle
);
define_handle!(
    /// Handle to a backend descriptor-set layout.
    LayoutHandle
);
define_handle!(
    /// Handle to a backend descriptor set.
    DescriptorSetHandle
);
define_handle!(
    /// Handle to a command buffer being recorded or in flight.
    CommandBufferHandle
);
define_handle!(
    /// Handle to an externally created pipeline (compute or graphics).
    PipelineHandle
);

/// A GPU object whose lifetime is tracked by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuObject {
    /// A buffer.
    Buffer(GpuBufferHandle),
    /// A sampled or storage texture.
    Texture(GpuTextureHandle),
    /// A texture used as a color or depth attachment.
    RenderTarget(GpuTextureHandle),
    /// A command buffer.
    CommandBuffer(CommandBufferHandle),
    /// A compute or graphics pipeline.
    Pipeline(PipelineHandle),
    /// A descriptor-set layout.
    DescriptorLayout(LayoutHandle),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle() {
        assert!(GpuBufferHandle::NULL.is_null());
        assert!(!GpuBufferHandle::from_raw(3).is_null());
        assert_eq!(PipelineHandle::from_raw(42).raw(), 42);
    }
}
