/// Function extraction: the shared registry and the runtime module bundler

mod bundler;
mod registry;

pub use bundler::{BundleStrategy, COMMON_CHUNK, RUNTIME_DIR, bundle, is_reserved_id};
pub use registry::FunctionRegistry;
