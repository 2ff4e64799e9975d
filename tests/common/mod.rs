pub mod apis;

pub use apis::*;
