//! # chainwatch-abi
//!
//! Contract ABIs for the block watcher: the JSON ABI document model, a
//! binary → JSON payload deserializer driven by it, and an in-memory registry
//! implementing [`chainwatch_core::AbiProvider`].
//!
//! ```rust,no_run
//! use chainwatch_abi::MemoryAbiRegistry;
//! use std::path::Path;
//!
//! let registry = MemoryAbiRegistry::new();
//! let loaded = registry.load_directory(Path::new("./abis")).unwrap();
//! println!("loaded {loaded} ABIs");
//! ```

pub mod abi;
pub mod error;
pub mod reader;
pub mod registry;
pub mod serializer;

pub use abi::{AbiDef, ActionDef, FieldDef, StructDef, TypeDef, VariantDef};
pub use error::AbiError;
pub use registry::MemoryAbiRegistry;
pub use serializer::AbiSerializer;
