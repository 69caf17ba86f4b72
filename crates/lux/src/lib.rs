mod camera;
mod light;
mod quad;
mod texture;

pub mod render_graph;
pub mod render_tools;
pub mod vulkan;

pub use camera::Camera;
pub use light::Light;
pub use quad::{FullscreenQuad, QuadVertex, QUAD_VERTICES};
pub use texture::Texture;
