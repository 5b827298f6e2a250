use proc_macro::TokenStream;
use syn::spanned::Spanned;

fn named_fields(item: &syn::ItemStruct) -> syn::Result<Vec<&syn::Field>> {
    match &item.fields {
        syn::Fields::Named(named) => Ok(named.named.iter().collect()),
        _ => Err(syn::Error::new(
            item.span(),
            "only structs with named fields are supported",
        )),
    }
}

fn fixed_string_len(field: &syn::Field) -> syn::Result<Option<usize>> {
    for attr in &field.attrs {
        if !attr.path().is_ident("fstring") {
            continue;
        }
        let nv = attr.meta.require_name_value()?;
        return match &nv.value {
            syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Int(s),
                ..
            }) => Ok(Some(s.base10_parse()?)),
            other => Err(syn::Error::new(
                other.span(),
                "fstring expects an integer length",
            )),
        };
    }
    Ok(None)
}

#[proc_macro]
pub fn struct_unpack_impl_for_num(item: TokenStream) -> TokenStream {
    let i = syn::parse_macro_input!(item as syn::Ident);
    let output = quote::quote! {
        impl StructUnpack for #i {
            fn unpack<R: ::std::io::Read + ::std::io::Seek>(mut reader: R) -> ::anyhow::Result<Self> {
                let mut buf = [0u8; std::mem::size_of::<#i>()];
                reader.read_exact(&mut buf)?;
                Ok(#i::from_le_bytes(buf))
            }
        }

        impl StructPack for #i {
            fn pack<W: ::std::io::Write>(&self, writer: &mut W) -> ::anyhow::Result<()> {
                writer.write_all(&self.to_le_bytes())?;
                Ok(())
            }
        }
    };
    output.into()
}

/// Macro to derive `StructPack` for structs with named fields.
///
/// Fields are written in declaration order, little endian. The using module
/// needs `crate::utils::struct_pack::*` in scope.
///
/// * `fstring = <len>` attribute writes a `String` field as exactly `len` bytes,
///   one byte per character, null padded. Longer or non-ASCII strings are an error.
#[proc_macro_derive(StructPack, attributes(fstring))]
pub fn struct_pack_derive(input: TokenStream) -> TokenStream {
    let item = syn::parse_macro_input!(input as syn::ItemStruct);
    match expand_pack(&item) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_pack(item: &syn::ItemStruct) -> syn::Result<proc_macro2::TokenStream> {
    let name = &item.ident;
    let mut stmts = Vec::new();
    for field in named_fields(item)? {
        let field_name = &field.ident;
        match fixed_string_len(field)? {
            Some(len) => stmts.push(quote::quote! {
                crate::ext::io::WriteExt::write_fstring(&mut *writer, &self.#field_name, #len)
                    .map_err(|e| ::anyhow::anyhow!("Failed to write field '{}': {}", stringify!(#field_name), e))?;
            }),
            None => stmts.push(quote::quote! {
                self.#field_name.pack(writer)?;
            }),
        }
    }
    Ok(quote::quote! {
        impl StructPack for #name {
            fn pack<W: ::std::io::Write>(&self, writer: &mut W) -> ::anyhow::Result<()> {
                #(#stmts)*
                Ok(())
            }
        }
    })
}

/// Macro to derive `StructUnpack` for structs with named fields.
///
/// Fields are read in declaration order, little endian. The using module
/// needs `crate::utils::struct_pack::*` in scope.
#[proc_macro_derive(StructUnpack)]
pub fn struct_unpack_derive(input: TokenStream) -> TokenStream {
    let item = syn::parse_macro_input!(input as syn::ItemStruct);
    match expand_unpack(&item) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_unpack(item: &syn::ItemStruct) -> syn::Result<proc_macro2::TokenStream> {
    let name = &item.ident;
    let mut idents = Vec::new();
    let mut stmts = Vec::new();
    for field in named_fields(item)? {
        let field_name = &field.ident;
        let field_type = &field.ty;
        idents.push(quote::quote! { #field_name });
        stmts.push(quote::quote! {
            let #field_name = <#field_type as StructUnpack>::unpack(&mut reader)?;
        });
    }
    Ok(quote::quote! {
        impl StructUnpack for #name {
            fn unpack<R: ::std::io::Read + ::std::io::Seek>(mut reader: R) -> ::anyhow::Result<Self> {
                #(#stmts)*
                Ok(Self { #(#idents),* })
            }
        }
    })
}
