mod descriptor;
mod digest;
mod error;
mod manifest;
mod reference;

pub use descriptor::Descriptor;
pub use digest::Digest;
pub use error::Error;
pub use manifest::{Manifest, ReferrerList};
pub use reference::ImageReference;
