pub mod config;
pub mod engine;
pub mod error;
pub mod types;

pub use config::EngineConfig;
pub use engine::Engine;
pub use engine::builtins::typedarray::{ArrayLike, Comparator, Mapper, SetSource};
pub use engine::codec::{ContentType, ElementKind};
pub use engine::species::{BufferConstructor, ConstructArgs, DefaultConstructor, Object, ViewConstructor};
pub use engine::store::{ApiScope, ByteStore, NativeBudget, Residency, ScopeMode, Sharing};
pub use engine::view::TypedView;
pub use error::{Error, Result};
pub use types::{JsBigInt, JsString, JsValue, Numeric};
