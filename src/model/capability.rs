/// Model operations callers may probe before use.
///
/// Unsupported ones answer with [`crate::error::DataAccessError::NotImplemented`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    BindTree,
    CreateBindingContext,
    DestroyBindingContext,
    GetProperty,
    /// `request_object` for a path without a meta part
    RequestDataObject,
}

impl Capability {
    pub fn method_name(&self) -> &'static str {
        match self {
            Capability::BindTree => "bindTree",
            Capability::CreateBindingContext => "createBindingContext",
            Capability::DestroyBindingContext => "destroyBindingContext",
            Capability::GetProperty => "getProperty",
            Capability::RequestDataObject => "requestObject",
        }
    }

    pub fn is_supported(&self) -> bool {
        match self {
            Capability::BindTree
            | Capability::CreateBindingContext
            | Capability::DestroyBindingContext
            | Capability::GetProperty
            | Capability::RequestDataObject => false,
        }
    }
}
