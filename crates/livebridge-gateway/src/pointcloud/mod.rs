//! Point-cloud frame reassembly and delivery.

pub mod frame;
pub mod reassembler;
pub mod sink;
pub mod window;

pub use frame::{AssetFrame, FragmentSlot};
pub use reassembler::{FrameReassembler, PointCloudHandler};
pub use sink::{ChannelFrameSink, FrameSink, LogFrameSink, ReadyFrame};
pub use window::FrameWindow;
