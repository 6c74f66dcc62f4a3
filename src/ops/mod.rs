//! Operation registry and dispatcher.

pub mod dispatch;
pub mod registry;

pub use dispatch::{Dispatcher, ResponseEnvelope};
pub use registry::{
    Field, FieldKind, HandlerFuture, InputShape, JsonObject, OperationDescriptor,
    OperationInfo, Registry, RegistryError, boxed,
};
