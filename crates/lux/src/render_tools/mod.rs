mod shading;

pub use shading::{GBufferInput, ShadingPass, SHADING_OUTPUT_FORMAT};
