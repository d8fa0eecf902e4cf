//! Provider-facing seam: the trait concrete integrations implement, and the
//! model-listing trait the refresh coordinator polls.

mod adapter;
mod traits;

pub use adapter::{ChatOps, EmbedOps, ImageEditOps, ImageGenerateOps, SpeechOps, TranscribeOps};
pub use traits::{ModelSource, Provider, PROBED_CAPABILITIES};
