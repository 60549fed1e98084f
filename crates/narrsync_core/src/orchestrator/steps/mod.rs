//! Pipeline step implementations.
//!
//! Each step handles one phase of the two-pass job.

mod assemble;
mod mux;
mod pad;
mod reconcile;
mod render;
mod rerender;
mod synthesize;

pub use assemble::AssembleStep;
pub use mux::MuxStep;
pub use pad::PadStep;
pub use reconcile::ReconcileStep;
pub use render::RenderStep;
pub use rerender::RerenderStep;
pub use synthesize::SynthesizeStep;
