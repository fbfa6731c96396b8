pub use base::*;
pub use bounded::*;
pub use ring::*;
pub use slot::*;

mod base;
mod bounded;
mod ring;
mod slot;
