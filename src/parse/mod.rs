pub mod context;
pub mod render;
pub mod subst;
pub mod syntax;
pub mod tokenize;
pub mod types;

pub use context::{copy_argument, remove_escapes, strip_escapes_in_place};
pub use render::Rendered;
pub use subst::{SubstitutionEntry, SubstitutionSet};
pub use syntax::{BreakOperator, DEFAULT_ESCAPE_CHAR, Syntax, is_program_separator};
pub use types::{Argument, CmdContext};
