mod activity;
mod chat;
mod workflow;

pub use activity::*;
pub use chat::*;
pub use workflow::*;
