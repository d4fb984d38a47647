//! Procedural macros for compose-dispatch

use darling::{FromDeriveInput, FromVariant};
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

/// Container-level attributes for #[derive(Action)]
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(action), supports(enum_any))]
struct ActionOpts {
    ident: syn::Ident,
    generics: syn::Generics,
    data: darling::ast::Data<ActionVariant, ()>,
}

/// Variant-level attributes
#[derive(Debug, FromVariant)]
#[darling(attributes(action))]
struct ActionVariant {
    ident: syn::Ident,
    fields: darling::ast::Fields<()>,

    /// Override the name reported by `Action::name`
    #[darling(default)]
    rename: Option<String>,
}

/// Derive the `Action` trait for an action enum.
///
/// Generates `name()` returning the variant name, used for logging and
/// filtering. Variants wrapping child actions report their own name, not
/// the child's; rename a variant's reported name with
/// `#[action(rename = "...")]`.
///
/// # Example
///
/// ```ignore
/// #[derive(Action, Clone, Debug)]
/// enum AppAction {
///     IncrementButtonTapped,
///     FactResponse(Result<String, FactError>),
///     #[action(rename = "Counter")]
///     Child(CounterAction),
/// }
/// ```
#[proc_macro_derive(Action, attributes(action))]
pub fn derive_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let opts = match ActionOpts::from_derive_input(&input) {
        Ok(opts) => opts,
        Err(e) => return e.write_errors().into(),
    };

    let name = &opts.ident;
    let (impl_generics, ty_generics, where_clause) = opts.generics.split_for_impl();

    let variants = match &opts.data {
        darling::ast::Data::Enum(variants) => variants,
        _ => {
            return syn::Error::new_spanned(&input, "Action can only be derived for enums")
                .to_compile_error()
                .into();
        }
    };

    let name_arms = variants.iter().map(|v| {
        let variant_name = &v.ident;
        let variant_str = v
            .rename
            .clone()
            .unwrap_or_else(|| variant_name.to_string());

        match &v.fields.style {
            darling::ast::Style::Unit => quote! {
                #name::#variant_name => #variant_str
            },
            darling::ast::Style::Tuple => quote! {
                #name::#variant_name(..) => #variant_str
            },
            darling::ast::Style::Struct => quote! {
                #name::#variant_name { .. } => #variant_str
            },
        }
    });

    let expanded = quote! {
        impl #impl_generics compose_dispatch::Action for #name #ty_generics #where_clause {
            fn name(&self) -> &'static str {
                match self {
                    #(#name_arms),*
                }
            }
        }
    };

    expanded.into()
}
