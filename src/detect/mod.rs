mod backend;
mod backends;
mod result;

pub use backend::MarkerDetector;
pub use backends::{QrBackend, ScriptedBackend};
pub use result::{Detection, Symbology};
