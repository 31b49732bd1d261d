mod subscription;
mod token;

pub use subscription::*;
pub use token::*;
