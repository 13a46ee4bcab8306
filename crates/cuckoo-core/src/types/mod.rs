mod request;
mod signature;
mod stream;
mod task;

pub use request::*;
pub use signature::*;
pub use stream::*;
pub use task::*;
