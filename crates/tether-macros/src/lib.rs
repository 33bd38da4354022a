use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident, LitStr};

/// Derive `tether_core::Props` for a struct with named fields.
///
/// Generates a field tag enum (`<Struct>Field` unless renamed with
/// `#[props(field_enum = "Name")]`) with one CamelCase variant per field, and a
/// shallow per-field change test. Fields compare with `!=` unless marked
/// `#[props(ptr_eq)]`, which compares `Rc` fields by pointer. Fields marked
/// `#[props(skip)]` are never reported as changed.
#[proc_macro_derive(Props, attributes(props))]
pub fn derive_props(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_props(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct FieldInfo {
    ident: Ident,
    variant: Ident,
    name: String,
    ptr_eq: bool,
}

fn expand_props(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Props can only be derived for structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Props requires named fields",
        ));
    };

    let mut enum_ident = format_ident!("{}Field", input.ident);
    for attr in &input.attrs {
        if !attr.path().is_ident("props") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("field_enum") {
                let lit: LitStr = meta.value()?.parse()?;
                enum_ident = Ident::new(&lit.value(), lit.span());
                Ok(())
            } else {
                Err(meta.error("unsupported props attribute"))
            }
        })?;
    }

    let mut tracked = Vec::new();
    for field in &named.named {
        let Some(ident) = &field.ident else {
            continue;
        };
        let mut skip = false;
        let mut ptr_eq = false;
        for attr in &field.attrs {
            if !attr.path().is_ident("props") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    skip = true;
                    Ok(())
                } else if meta.path.is_ident("ptr_eq") {
                    ptr_eq = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `skip` or `ptr_eq`"))
                }
            })?;
        }
        if skip {
            continue;
        }
        let name = ident.to_string().trim_start_matches("r#").to_string();
        tracked.push(FieldInfo {
            ident: ident.clone(),
            variant: Ident::new(&camel_case(&name), ident.span()),
            name,
            ptr_eq,
        });
    }

    let struct_ident = &input.ident;
    let vis = &input.vis;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let variants: Vec<&Ident> = tracked.iter().map(|info| &info.variant).collect();
    let names: Vec<&str> = tracked.iter().map(|info| info.name.as_str()).collect();
    let comparisons = tracked.iter().map(|info| {
        let ident = &info.ident;
        let variant = &info.variant;
        if info.ptr_eq {
            quote! { #enum_ident::#variant => !::std::rc::Rc::ptr_eq(&self.#ident, &next.#ident) }
        } else {
            quote! { #enum_ident::#variant => self.#ident != next.#ident }
        }
    });
    let enum_doc = format!("Field tags of [`{struct_ident}`].");

    Ok(quote! {
        #[doc = #enum_doc]
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        #vis enum #enum_ident {
            #(#variants,)*
        }

        impl ::tether_core::Field for #enum_ident {
            fn name(self) -> &'static str {
                match self {
                    #(#enum_ident::#variants => #names,)*
                }
            }
        }

        impl #impl_generics ::tether_core::Props for #struct_ident #ty_generics #where_clause {
            type Field = #enum_ident;

            const FIELDS: &'static [#enum_ident] = &[#(#enum_ident::#variants,)*];

            fn field_changed(&self, next: &Self, field: Self::Field) -> bool {
                match field {
                    #(#comparisons,)*
                }
            }
        }
    })
}

fn camel_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::camel_case;

    #[test]
    fn camel_case_joins_snake_segments() {
        assert_eq!(camel_case("data"), "Data");
        assert_eq!(camel_case("bubbling_mouse_events"), "BubblingMouseEvents");
        assert_eq!(camel_case("_private"), "Private");
    }
}
