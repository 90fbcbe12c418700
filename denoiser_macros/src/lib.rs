extern crate proc_macro;
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemStruct};

/// Registers a `Denoiser` implementation in the global `DenoiserRegistry` at program start.
///
/// The struct must implement `Denoiser::new()` so that a default-configured prototype can
/// be stored under the name returned by its `config()`.
#[proc_macro_attribute]
pub fn register_denoiser(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemStruct);
    let struct_name = &input.ident;

    // GaussianDenoiser -> register_denoiser_gaussian_denoiser
    let fn_name_str = heck::ToSnakeCase::to_snake_case(struct_name.to_string().as_str());
    let fn_name = syn::Ident::new(
        &format!("register_denoiser_{}", fn_name_str),
        struct_name.span(),
    );

    let expanded = quote! {
        #input

        #[ctor::ctor]
        fn #fn_name() {
            crate::denoisers::denoiser::DenoiserRegistry::register_denoiser::<#struct_name>();
        }
    };

    TokenStream::from(expanded)
}
