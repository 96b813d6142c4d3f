pub mod mathscript;
pub mod rhai;

mod bridge;
mod functions;
