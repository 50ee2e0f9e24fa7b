//! Graphics error types.

use thiserror::Error;

/// Errors that can occur in the frame graphics core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphicsError {
    /// Failed to initialize the graphics system.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// Failed to create a GPU resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// The fixed-size descriptor pool has no free sets left.
    #[error("descriptor pool exhausted (capacity {capacity})")]
    DescriptorPoolExhausted {
        /// Pool capacity configured at startup.
        capacity: u32,
    },
    /// A layout index that was never created.
    #[error("unknown resource layout {0}")]
    UnknownLayout(u32),
    /// A resource set index that was never allocated.
    #[error("unknown resource set {0}")]
    UnknownResourceSet(u32),
    /// A texture set held by a guard was released by hand.
    #[error("texture set {0} is held by a guard")]
    TextureSetGuarded(u32),
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// A frame lifecycle call was made in the wrong order.
    #[error("{operation} is not allowed while the frame is {state}")]
    InvalidFrameState {
        /// The lifecycle call that was rejected.
        operation: &'static str,
        /// The state the frame was in.
        state: &'static str,
    },
    /// A ring buffer was acquired twice within the same frame.
    #[error("ring buffer '{label}' already acquired in frame {frame}")]
    RingBufferReacquired {
        /// Debug label of the ring buffer.
        label: String,
        /// Frame number of the duplicate acquisition.
        frame: u64,
    },
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GraphicsError::InitializationFailed("no GPU found".to_string());
        assert_eq!(err.to_string(), "initialization failed: no GPU found");
    }

    #[test]
    fn test_frame_state_display() {
        let err = GraphicsError::InvalidFrameState {
            operation: "end_scene",
            state: "idle",
        };
        assert_eq!(
            err.to_string(),
            "end_scene is not allowed while the frame is idle"
        );
    }

    #[test]
    fn test_reacquire_display() {
        let err = GraphicsError::RingBufferReacquired {
            label: "camera".to_string(),
            frame: 7,
        };
        assert_eq!(
            err.to_string(),
            "ring buffer 'camera' already acquired in frame 7"
        );
    }
}
