pub mod inputs;
pub mod learning;
pub mod personality;
pub mod signals;

pub use inputs::*;
pub use learning::*;
pub use personality::*;
pub use signals::*;
