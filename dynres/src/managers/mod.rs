mod target;

pub use target::{ColorPassTarget, CompositeArgs, RenderTargetManager, ShadowPassArgs};
