pub use crate::bsdf::{BsdfEnum, BsdfQuery, BsdfSample};
pub use crate::camera::{Camera, RenderContext};
pub use crate::color::{DoubleRgb, RGBColor};
pub use crate::film::{Frame, FrameMetadata, Vec2D};
pub use crate::geometry::{BoundingSphere, Edge, Ray, SurfacePoint};
pub use crate::math::*;
pub use crate::scene::{cornell_box, AreaLights, LightSample, LsdfQuery, Scene};
pub use crate::technique::{render_frame, Beta, FixedBeta, Technique, VariableBeta};
pub use crate::{technique_from_name, TechniqueSettings};
