//! Internal macros for the API crate.

/// Implement `axum::extract::FromRef<AppState>` for a state field.
///
/// # Example
/// ```ignore
/// impl_from_ref!(LineageSchema, schema);
/// // Expands to:
/// impl axum::extract::FromRef<AppState> for LineageSchema {
///     fn from_ref(state: &AppState) -> Self {
///         state.schema.clone()
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
