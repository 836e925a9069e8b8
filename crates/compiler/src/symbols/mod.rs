mod arrays;
mod assembly;
mod handle;
mod swizzle;
mod table;

pub use arrays::ArrayManager;
pub use assembly::{core_assembly, populate_primitives, Assembly, ScalarKind};
pub use handle::SymbolHandle;
pub use swizzle::SwizzleManager;
pub use table::{AccessModifier, SymbolKind, SymbolMetadata, SymbolTable};
