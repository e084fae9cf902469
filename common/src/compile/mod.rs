mod engine;

pub use engine::{CompileOutcome, TexCompiler};
