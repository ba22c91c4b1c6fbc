use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, parse_quote, Data, DeriveInput, Fields, Path};

/// Derive macro implementing `strata::element::Element` for a struct.
///
/// # Attributes
/// - `#[element(family = path::ToFamily)]` on the struct - links a generic element to an
///   open element family so a single family renderer handles every parametrization.
///   The struct must also implement `strata::element::Member<Family>`.
/// - `#[element(style)]` on an `Option<StyleDescriptor>` field - exposes it as the
///   element's style.
/// - `#[element(children)]` on a `Vec<AnyElement>` field - exposes the ordered children.
///
/// # Example
/// ```ignore
/// #[derive(Element)]
/// pub struct Label {
///     text: String,
///     #[element(style)]
///     style: Option<StyleDescriptor>,
/// }
///
/// #[derive(Element)]
/// #[element(family = FieldFamily)]
/// pub struct Field<T> {
///     value: T,
/// }
/// ```
#[proc_macro_derive(Element, attributes(element))]
pub fn derive_element(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(mut input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = input.ident.clone();

    let mut family: Option<Path> = None;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("element")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("family") {
                family = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `family = Path`"))
            }
        })?;
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields.named.iter().collect::<Vec<_>>(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    &name,
                    "Element can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &name,
                "Element can only be derived for structs",
            ))
        }
    };

    let mut style_field = None;
    let mut children_field = None;
    for field in fields {
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("element")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("style") {
                    style_field = field.ident.clone();
                    Ok(())
                } else if meta.path.is_ident("children") {
                    children_field = field.ident.clone();
                    Ok(())
                } else {
                    Err(meta.error("expected `style` or `children`"))
                }
            })?;
        }
    }

    // Element requires Any, so every type parameter must outlive 'static.
    for param in input.generics.type_params_mut() {
        param.bounds.push(parse_quote!('static));
    }
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let style_fn = style_field.map(|field| {
        quote! {
            fn style(&self) -> Option<&::strata::style::StyleDescriptor> {
                self.#field.as_ref()
            }
        }
    });

    let children_fn = children_field.map(|field| {
        quote! {
            fn children(&self) -> &[::strata::element::AnyElement] {
                &self.#field
            }
        }
    });

    let family_fn = family.map(|family| {
        quote! {
            fn family(&self) -> Option<::strata::element::FamilyLink> {
                Some(::strata::element::FamilyLink::of::<#family, Self>())
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::strata::element::Element for #name #ty_generics #where_clause {
            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            #style_fn

            #children_fn

            #family_fn
        }
    })
}
