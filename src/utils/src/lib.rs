mod range;

pub use range::*;
