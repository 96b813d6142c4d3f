pub mod backends;
pub mod interpreter;
pub mod path;
pub mod registry;
pub mod summary;

pub use backends::mathscript::MathScriptBackend;
pub use backends::rhai::{ExecutionLimits, RhaiBackend};
pub use interpreter::Interpreter;
pub use path::{parse_path, render_path_key, PathError};
pub use registry::LanguageRegistry;
pub use summary::{summarize_environment, FunctionStubber};
