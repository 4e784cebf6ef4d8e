use thiserror::Error;

/// Reason why [`RenderTargetManager::new`](crate::RenderTargetManager::new) failed.
///
/// A broken composite or shadow shader means no useful rendering is possible,
/// so callers are expected to treat this as fatal rather than degrade.
#[derive(Error, Debug)]
pub enum TargetInitializationError {
    #[error("validation failed while creating the {label} shader module")]
    ShaderCreation {
        label: &'static str,
        #[source]
        source: wgpu::Error,
    },
    #[error("validation failed while creating the {label} pipeline")]
    PipelineCreation {
        label: &'static str,
        #[source]
        source: wgpu::Error,
    },
}
