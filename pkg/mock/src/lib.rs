//! Procedural macros for generating mock implementations.
//!
//! # async_client
//!
//! Generates a mock implementation for an async collaborator trait, e.g. the
//! key set fetcher or the authenticator used by the HTTP middleware.
//!
//! Use `#[cfg_attr(test, mock::async_client)]` before `#[async_trait]` to generate
//! the mock only during test compilation:
//!
//! ```ignore
//! use tonic::async_trait;
//!
//! #[cfg_attr(test, mock::async_client)]
//! #[async_trait]
//! pub trait KeySetFetcher: Send + Sync + 'static {
//!     async fn fetch_key_set(&self) -> Result<KeySet, FetchError>;
//! }
//!
//! // Generates:
//! // pub struct MockKeySetFetcher {
//! //     pub fetch_key_set: Mutex<VecDeque<Result<KeySet, FetchError>>>,
//! //     pub fetch_key_set_call_count: AtomicUsize,
//! // }
//! // impl Default for MockKeySetFetcher { ... }
//! // impl MockKeySetFetcher { fn with_fetch_key_set(..) -> Self; fn fetch_key_set_calls(&self) -> usize }
//! // #[async_trait] impl KeySetFetcher for MockKeySetFetcher { ... }
//! ```
//!
//! ## Queueing responses
//!
//! Every call pops the next queued response. A call without a queued response
//! panics, which fails the test that made the unexpected call.
//!
//! ```ignore
//! let fetcher = MockKeySetFetcher::default()
//!     .with_fetch_key_set(Ok(key_set.clone()))
//!     .with_fetch_key_set(Err(FetchError::Timeout));
//!
//! assert_eq!(fetcher.fetch_key_set_calls(), 0);
//! ```

use proc_macro::TokenStream;
use quote::ToTokens;
use quote::{format_ident, quote};
use syn::{FnArg, ItemTrait, ReturnType, TraitItem, parse_macro_input};

/// Generates a mock implementation for an async trait.
#[proc_macro_attribute]
pub fn async_client(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemTrait);
    let trait_name = &input.ident;
    let mock_name = format_ident!("Mock{}", trait_name);
    let vis = &input.vis;

    let mut field_definitions = Vec::new();
    let mut default_fields = Vec::new();
    let mut impl_methods = Vec::new();
    let mut helper_methods = Vec::new();

    for item in &input.items {
        let TraitItem::Fn(method) = item else {
            continue;
        };
        let method_name = &method.sig.ident;
        let method_label = method_name.to_string();
        let call_count_field = format_ident!("{}_call_count", method_name);
        let call_count_method = format_ident!("{}_calls", method_name);
        let queue_method = format_ident!("with_{}", method_name);

        let return_type = match &method.sig.output {
            ReturnType::Default => quote! { () },
            ReturnType::Type(_, ty) => quote! { #ty },
        };

        field_definitions.push(quote! {
            pub #method_name: ::std::sync::Mutex<::std::collections::VecDeque<#return_type>>
        });

        field_definitions.push(quote! {
            pub #call_count_field: ::std::sync::atomic::AtomicUsize
        });

        default_fields.push(quote! {
            #method_name: ::std::sync::Mutex::new(::std::collections::VecDeque::new())
        });

        default_fields.push(quote! {
            #call_count_field: ::std::sync::atomic::AtomicUsize::new(0)
        });

        helper_methods.push(quote! {
            /// Queues a response for the next call.
            pub fn #queue_method(self, response: #return_type) -> Self {
                self.#method_name.lock().unwrap().push_back(response);
                self
            }

            pub fn #call_count_method(&self) -> usize {
                self.#call_count_field.load(::std::sync::atomic::Ordering::SeqCst)
            }
        });

        let params: Vec<_> = method
            .sig
            .inputs
            .iter()
            .filter_map(|arg| {
                if let FnArg::Typed(pat_type) = arg {
                    let ty = &pat_type.ty;
                    let pat_str = pat_type.pat.to_token_stream().to_string();
                    let prefixed_name = format_ident!("_{}", pat_str);
                    Some(quote! { #prefixed_name: #ty })
                } else {
                    None
                }
            })
            .collect();

        impl_methods.push(quote! {
            async fn #method_name(&self, #(#params),*) -> #return_type {
                self.#call_count_field.fetch_add(1, ::std::sync::atomic::Ordering::SeqCst);
                let response = self.#method_name.lock().unwrap().pop_front();
                response.unwrap_or_else(|| panic!("no response queued for `{}`", #method_label))
            }
        });
    }

    let expanded = quote! {
        #input

        #vis struct #mock_name {
            #(#field_definitions),*
        }

        impl ::std::default::Default for #mock_name {
            fn default() -> Self {
                Self {
                    #(#default_fields),*
                }
            }
        }

        impl #mock_name {
            #(#helper_methods)*
        }

        #[::tonic::async_trait]
        impl #trait_name for #mock_name {
            #(#impl_methods)*
        }
    };

    TokenStream::from(expanded)
}
