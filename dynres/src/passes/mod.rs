mod composite;
mod shadow_cast;

pub(crate) use composite::{CompositeBlitArgs, CompositePass, CompositePassNewArgs};
pub(crate) use shadow_cast::ShadowCastPass;
