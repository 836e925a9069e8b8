//! Core micro-containers and process-wide primitives shared by the HXSL
//! compiler: source management, string interning, a slab allocator, the
//! `Number` tagged union, byte streams, and the diagnostics logger.

pub mod arena;
pub mod diagnostics;
pub mod number;
pub mod pool;
pub mod source;
pub mod stream;

pub use arena::{SlabAllocator, SlabIndex};
pub use diagnostics::{codes, DiagnosticCode, LocaleTable, LogMessage, Logger, Severity};
pub use number::{BinOp, Number, UNKNOWN_NUMBER};
pub use pool::StringPool;
pub use source::{SourceFile, SourceId, SourceLocation, SourceManager, TextSpan};
pub use stream::{ByteStream, FileStream, MemoryStream, SeekOrigin};
