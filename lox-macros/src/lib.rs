use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident, Type};

extern crate proc_macro;

type Variant<'a> = (&'a Ident, Vec<&'a Type>);

/// Derives `ByteCodeEncodeDecode` for an instruction enum.
///
/// Each variant becomes one opcode, numbered by declaration order. Tuple fields are
/// operands and are written with `to_ne_bytes` right after the opcode byte. The traits
/// `ByteCodeEncodeDecode` and `Decode` must be in scope where the derive is used.
#[proc_macro_derive(ByteCodeEncodeDecode)]
pub fn byte_code_encode_decode(item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as DeriveInput);
    impl_byte_code_encode_decode(&ast)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn impl_byte_code_encode_decode(ast: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let ident = &ast.ident;

    let data_enum = match &ast.data {
        Data::Enum(data_enum) => data_enum,
        _ => {
            return Err(syn::Error::new_spanned(
                ident,
                "ByteCodeEncodeDecode can only be derived for enums",
            ))
        }
    };

    if data_enum.variants.is_empty() || data_enum.variants.len() > u8::MAX as usize + 1 {
        return Err(syn::Error::new_spanned(
            ident,
            "an instruction enum needs between 1 and 256 variants",
        ));
    }

    let variants = data_enum
        .variants
        .iter()
        .map(|variant| {
            let fields = match &variant.fields {
                Fields::Unit => vec![],
                Fields::Unnamed(unnamed) => unnamed.unnamed.iter().map(|field| &field.ty).collect(),
                Fields::Named(_) => {
                    return Err(syn::Error::new_spanned(
                        variant,
                        "instruction operands must be tuple fields",
                    ))
                }
            };

            Ok((&variant.ident, fields))
        })
        .collect::<syn::Result<Vec<Variant>>>()?;

    let encode = gen_encode(ident, &variants);
    let decode = gen_decode(ident, &variants);
    let mnemonic = gen_mnemonic(ident, &variants);

    Ok(quote! {
        impl ByteCodeEncodeDecode for #ident {
            #encode
            #decode
            #mnemonic
        }
    })
}

fn operand_ids(fields: &[&Type]) -> Vec<Ident> {
    (0..fields.len()).map(|a| format_ident!("a{}", a)).collect()
}

fn tuple_pattern(field_ids: &[Ident]) -> proc_macro2::TokenStream {
    if field_ids.is_empty() {
        quote! {}
    } else {
        quote! { (#(#field_ids),*) }
    }
}

fn gen_encode(enum_: &Ident, variants: &[Variant]) -> proc_macro2::TokenStream {
    let match_arms: Vec<_> = variants
        .iter()
        .enumerate()
        .map(|(i, (ident, fields))| {
            let opcode = i as u8;
            let field_ids = operand_ids(fields);
            let operand_pushes = field_ids.iter().map(
                |tup_field_id| quote! { dest.extend_from_slice(&#tup_field_id.to_ne_bytes()[..]); },
            );
            let enum_args = tuple_pattern(&field_ids);

            quote! {
                #enum_::#ident #enum_args => {
                    dest.push(#opcode);
                    #(#operand_pushes)*
                }
            }
        })
        .collect();

    quote! {
        fn encode(&self, dest: &mut Vec<u8>) {
            match self {
                #(#match_arms),*
            };
        }
    }
}

fn gen_decode(enum_: &Ident, variants: &[Variant]) -> proc_macro2::TokenStream {
    let match_arms: Vec<_> = variants
        .iter()
        .enumerate()
        .map(|(i, (ident, fields))| {
            let opcode = i as u8;
            let field_ids = operand_ids(fields);
            let field_setters = field_ids.iter().zip(fields.iter()).map(|(var, type_)| {
                quote! {
                    let #var = <#type_ as Decode>::decode(&mut slice_ptr)?;
                }
            });
            let enum_args = tuple_pattern(&field_ids);

            quote! {
                #opcode => {
                    #(#field_setters)*
                    #enum_::#ident #enum_args
                }
            }
        })
        .collect();

    quote! {
        fn decode(src: &mut &[u8]) -> Option<Self> {
            let bytes: &[u8] = *src;
            let (opcode, operands) = bytes.split_first()?;
            #[allow(unused_mut)]
            let mut slice_ptr: &[u8] = operands;

            let instr = match *opcode {
                #(#match_arms),*,
                _ => return None,
            };

            *src = slice_ptr;
            Some(instr)
        }
    }
}

fn gen_mnemonic(enum_: &Ident, variants: &[Variant]) -> proc_macro2::TokenStream {
    let match_arms = variants.iter().map(|(ident, fields)| {
        let name = screaming_snake(&ident.to_string());
        let wildcard = if fields.is_empty() {
            quote! {}
        } else {
            quote! { (..) }
        };

        quote! { #enum_::#ident #wildcard => #name }
    });

    quote! {
        fn mnemonic(&self) -> &'static str {
            match self {
                #(#match_arms),*
            }
        }
    }
}

fn screaming_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.extend(c.to_uppercase());
    }
    out
}
