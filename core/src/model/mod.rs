mod asset;
mod id_types;
mod session;

pub use asset::*;
pub use id_types::*;
pub use session::*;
