pub mod condition;
pub mod consoleapplication;
pub mod openshift;

pub use condition::*;
pub use consoleapplication::*;
pub use openshift::*;
