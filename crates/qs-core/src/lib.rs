pub mod codec;
pub mod compare;
pub mod error;
pub mod value;

pub use codec::*;
pub use compare::*;
pub use error::*;
pub use value::*;
