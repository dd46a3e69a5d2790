//! `#[derive(Differentiable)]` for ndgraph models.
//!
//! Every field is bound, unbound and visited through its own
//! `Differentiable` impl, in declaration order, with errors prefixed by the
//! field name. Two field attributes change that:
//!
//! - `#[bind(skip)]` clones the field unchanged and hides it from parameter
//!   visits.
//! - `#[bind(graph)]` marks an `Option<Graph>` field that receives the graph
//!   on bind and is cleared on unbind.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Data, DeriveInput, Field, Fields, Index, Member, Result as SynResult, Type, WherePredicate,
    parse_macro_input, parse_quote, spanned::Spanned,
};

#[proc_macro_derive(Differentiable, attributes(bind))]
pub fn derive_differentiable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_differentiable(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FieldMode {
    Bind,
    Skip,
    Graph,
}

struct FieldInfo {
    member: Member,
    label: String,
    ty: Type,
    mode: FieldMode,
}

fn field_mode(field: &Field) -> SynResult<FieldMode> {
    let mut mode = FieldMode::Bind;
    for attr in &field.attrs {
        if !attr.path().is_ident("bind") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let next = if meta.path.is_ident("skip") {
                FieldMode::Skip
            } else if meta.path.is_ident("graph") {
                FieldMode::Graph
            } else {
                return Err(meta.error("unknown bind attribute, expected `skip` or `graph`"));
            };
            if mode != FieldMode::Bind && mode != next {
                return Err(meta.error("`skip` and `graph` cannot be combined"));
            }
            mode = next;
            Ok(())
        })?;
    }
    Ok(mode)
}

fn collect_fields(fields: &Fields) -> SynResult<Vec<FieldInfo>> {
    fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let (member, label) = match &field.ident {
                Some(ident) => (Member::Named(ident.clone()), ident.to_string()),
                None => (Member::Unnamed(Index::from(i)), i.to_string()),
            };
            Ok(FieldInfo {
                member,
                label,
                ty: field.ty.clone(),
                mode: field_mode(field)?,
            })
        })
        .collect()
}

/// Build `Self { .. }`, `Self(..)` or `Self` from one expression per field.
fn construct(fields: &Fields, values: Vec<TokenStream2>) -> TokenStream2 {
    match fields {
        Fields::Named(named) => {
            let names = named.named.iter().map(|f| &f.ident);
            quote! { Self { #(#names: #values),* } }
        }
        Fields::Unnamed(_) => quote! { Self(#(#values),*) },
        Fields::Unit => quote! { Self },
    }
}

fn expand_differentiable(input: DeriveInput) -> SynResult<TokenStream2> {
    let data = match &input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "Differentiable can only be derived for structs",
            ));
        }
    };
    let fields = collect_fields(&data.fields)?;

    let mut generics = input.generics.clone();
    if generics.type_params().next().is_some() {
        let where_clause = generics.make_where_clause();
        for field in &fields {
            let ty = &field.ty;
            let predicate: WherePredicate = match field.mode {
                FieldMode::Bind => parse_quote!(#ty: ::ndgraph::reify::Differentiable),
                FieldMode::Skip => parse_quote!(#ty: ::core::clone::Clone),
                FieldMode::Graph => continue,
            };
            where_clause.predicates.push(predicate);
        }
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let name = &input.ident;

    let bind_values = fields
        .iter()
        .map(|field| {
            let member = &field.member;
            let label = &field.label;
            match field.mode {
                FieldMode::Bind => quote! {
                    ::ndgraph::reify::Differentiable::bind(&self.#member, graph)
                        .map_err(|err| err.within(#label))?
                },
                FieldMode::Skip => quote! { ::core::clone::Clone::clone(&self.#member) },
                FieldMode::Graph => {
                    quote! { ::core::option::Option::Some(::core::clone::Clone::clone(graph)) }
                }
            }
        })
        .collect();
    let unbind_values = fields
        .iter()
        .map(|field| {
            let member = &field.member;
            let label = &field.label;
            match field.mode {
                FieldMode::Bind => quote! {
                    ::ndgraph::reify::Differentiable::unbind(&self.#member)
                        .map_err(|err| err.within(#label))?
                },
                FieldMode::Skip => quote! { ::core::clone::Clone::clone(&self.#member) },
                FieldMode::Graph => quote! { ::core::option::Option::None },
            }
        })
        .collect();
    let visits = fields
        .iter()
        .filter(|field| field.mode == FieldMode::Bind)
        .map(|field| {
            let member = &field.member;
            let label = &field.label;
            quote! {
                visitor.scoped(#label, |visitor| {
                    ::ndgraph::reify::Differentiable::visit_params(&self.#member, visitor)
                });
            }
        });

    let bound = construct(&data.fields, bind_values);
    let unbound = construct(&data.fields, unbind_values);

    Ok(quote! {
        impl #impl_generics ::ndgraph::reify::Differentiable for #name #ty_generics #where_clause {
            fn bind(
                &self,
                graph: &::ndgraph::Graph,
            ) -> ::core::result::Result<Self, ::ndgraph::BindError> {
                let _ = graph;
                ::core::result::Result::Ok(#bound)
            }

            fn unbind(&self) -> ::core::result::Result<Self, ::ndgraph::BindError> {
                ::core::result::Result::Ok(#unbound)
            }

            fn visit_params(&self, visitor: &mut ::ndgraph::reify::ParamVisitor<'_>) {
                let _ = visitor;
                #(#visits)*
            }
        }
    })
}
