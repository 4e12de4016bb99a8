/// Error taxonomy shared by every stage.
pub mod error;
/// RGBA8 pixel buffers.
pub mod grid;
pub(crate) mod math;
