mod saga_data;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(SagaData)] derive macro
// ============================================================================

/// Derive macro for the `SagaData` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, SagaData)]
/// #[saga(name = "Shop.OrderSagaData")]
/// struct OrderSagaData {
///     #[saga(id)]
///     pub saga_id: Uuid,
///     pub order_id: String,
/// }
/// ```
///
/// - `#[saga(name = "...")]` sets the saga type name used in uniqueness keys
///   and collection lookup. If omitted, defaults to the struct name.
/// - `#[saga(id)]` marks the `Uuid` field holding the saga instance id.
///   If omitted, defaults to a field named `id`.
#[proc_macro_derive(SagaData, attributes(saga))]
pub fn derive_saga_data(input: TokenStream) -> TokenStream {
    saga_data::derive_saga_data(input)
}
