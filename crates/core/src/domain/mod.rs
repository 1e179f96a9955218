mod pose;
mod robot;
mod status;
mod task;

pub use pose::*;
pub use robot::*;
pub use status::*;
pub use task::*;
