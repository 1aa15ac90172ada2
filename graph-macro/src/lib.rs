use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr, Type, Visibility};

/// Derive the `Reflect` trait, declaring a type's serialization schema at
/// compile time.
///
/// # Structs
///
/// ```ignore
/// #[derive(Reflect)]
/// #[reflect(module = "game", base = Item)]
/// struct Sword {
///     pub damage: f64,
///     #[reflect(include)]
///     durability: f64,
///     #[reflect(ignore)]
///     pub cached_dps: f64,
///     #[reflect(kind = "enum")]
///     pub rarity: Rarity,
/// }
/// ```
///
/// Struct attributes: `name = "..."`, `module = "..."` (defaults to the
/// crate's root module), `base = Type`, `properties`, `no_default`.
///
/// Field attributes: `include`, `ignore`, `obsolete`, `non_serialized`,
/// `read_only`, `write_only`, `kind = "bool" | "int" | "uint" | "float" |
/// "char" | "text" | "enum" | "reference"`.
///
/// # Enums
///
/// Fieldless enums get an enum schema with variants in declaration order,
/// plus a `From<Enum> for Value` conversion that records the discriminant.
#[proc_macro_derive(Reflect, attributes(reflect))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct TypeAttrs {
    name: Option<String>,
    module: Option<String>,
    base: Option<Type>,
    properties: bool,
    no_default: bool,
}

#[derive(Default)]
struct FieldAttrs {
    include: bool,
    ignore: bool,
    obsolete: bool,
    non_serialized: bool,
    read_only: bool,
    write_only: bool,
    kind: Option<LitStr>,
}

fn parse_type_attrs(input: &DeriveInput) -> syn::Result<TypeAttrs> {
    let mut attrs = TypeAttrs::default();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("reflect")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                attrs.name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("module") {
                attrs.module = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("base") {
                attrs.base = Some(meta.value()?.parse::<Type>()?);
            } else if meta.path.is_ident("properties") {
                attrs.properties = true;
            } else if meta.path.is_ident("no_default") {
                attrs.no_default = true;
            } else {
                return Err(meta.error("unknown reflect attribute"));
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}

fn parse_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("reflect")) {
        attr.parse_nested_meta(|meta| {
            let flag = match meta.path.get_ident().map(|i| i.to_string()).as_deref() {
                Some("include") => &mut attrs.include,
                Some("ignore") => &mut attrs.ignore,
                Some("obsolete") => &mut attrs.obsolete,
                Some("non_serialized") => &mut attrs.non_serialized,
                Some("read_only") => &mut attrs.read_only,
                Some("write_only") => &mut attrs.write_only,
                Some("kind") => {
                    attrs.kind = Some(meta.value()?.parse::<LitStr>()?);
                    return Ok(());
                }
                _ => return Err(meta.error("unknown reflect field attribute")),
            };
            *flag = true;
            Ok(())
        })?;
    }
    Ok(attrs)
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let ident = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Reflect cannot be derived for generic types; register a generic definition instead",
        ));
    }
    let attrs = parse_type_attrs(input)?;
    let type_name = attrs.name.clone().unwrap_or_else(|| ident.to_string());
    let module = match &attrs.module {
        Some(module) => quote! { #module },
        None => quote! {
            ::core::module_path!().split("::").next().unwrap_or_default()
        },
    };
    let descriptor = quote! {
        fn descriptor() -> redlilium_graph::TypeDescriptor {
            redlilium_graph::TypeDescriptor::new(#type_name, #module)
        }
    };

    match &input.data {
        Data::Struct(data) => expand_struct(ident, &attrs, descriptor, &data.fields),
        Data::Enum(data) => {
            if attrs.base.is_some() || attrs.properties || attrs.no_default {
                return Err(syn::Error::new_spanned(
                    ident,
                    "enum schemas accept only `name` and `module`",
                ));
            }
            let mut variants = Vec::new();
            for variant in &data.variants {
                if !matches!(variant.fields, Fields::Unit) {
                    return Err(syn::Error::new_spanned(
                        variant,
                        "Reflect can only be derived for fieldless enums",
                    ));
                }
                variants.push(variant.ident.to_string());
            }
            Ok(quote! {
                impl redlilium_graph::Reflect for #ident {
                    #descriptor

                    fn schema() -> redlilium_graph::TypeSchema {
                        redlilium_graph::TypeSchema::enumeration(
                            <Self as redlilium_graph::Reflect>::descriptor(),
                            ::std::vec![#(::std::string::String::from(#variants)),*],
                        )
                    }
                }

                impl ::core::convert::From<#ident> for redlilium_graph::Value {
                    fn from(value: #ident) -> Self {
                        redlilium_graph::Value::Enum {
                            ty: <#ident as redlilium_graph::Reflect>::descriptor(),
                            ordinal: value as i64,
                        }
                    }
                }
            })
        }
        Data::Union(_) => Err(syn::Error::new_spanned(
            ident,
            "Reflect can only be derived for structs and enums",
        )),
    }
}

fn expand_struct(
    ident: &syn::Ident,
    attrs: &TypeAttrs,
    descriptor: proc_macro2::TokenStream,
    fields: &Fields,
) -> syn::Result<proc_macro2::TokenStream> {
    let mut members = Vec::new();
    for (index, field) in fields.iter().enumerate() {
        let name = match &field.ident {
            Some(ident) => ident.to_string(),
            None => index.to_string(),
        };
        let field_attrs = parse_field_attrs(field)?;
        let kind = match &field_attrs.kind {
            Some(kind) => explicit_field_kind(kind, &field.ty)?,
            None => infer_field_kind(&field.ty),
        };
        let constructor = if matches!(field.vis, Visibility::Public(_)) {
            quote! { public }
        } else {
            quote! { private }
        };
        let mut member = quote! {
            redlilium_graph::MemberDecl::#constructor(#name, #kind)
        };
        for (set, builder) in [
            (field_attrs.include, quote! { include }),
            (field_attrs.ignore, quote! { ignore }),
            (field_attrs.obsolete, quote! { obsolete }),
            (field_attrs.non_serialized, quote! { non_serialized }),
            (field_attrs.read_only, quote! { read_only }),
            (field_attrs.write_only, quote! { write_only }),
        ] {
            if set {
                member = quote! { #member.#builder() };
            }
        }
        members.push(member);
    }

    let mut schema = quote! {
        redlilium_graph::TypeSchema::record(<Self as redlilium_graph::Reflect>::descriptor())
    };
    let mut dependencies = quote! {};
    if let Some(base) = &attrs.base {
        schema = quote! {
            #schema.with_base(<#base as redlilium_graph::Reflect>::descriptor())
        };
        dependencies = quote! {
            fn register_dependencies(registry: &redlilium_graph::TypeRegistry) {
                registry.register_type::<#base>();
            }
        };
    }
    if attrs.properties {
        schema = quote! { #schema.properties() };
    }
    if attrs.no_default {
        schema = quote! { #schema.abstract_type() };
    }

    Ok(quote! {
        impl redlilium_graph::Reflect for #ident {
            #descriptor

            fn schema() -> redlilium_graph::TypeSchema {
                #schema #(.with_member(#members))*
            }

            #dependencies
        }
    })
}

/// Resolve a `kind = "..."` override.
fn explicit_field_kind(kind: &LitStr, ty: &Type) -> syn::Result<proc_macro2::TokenStream> {
    Ok(match kind.value().as_str() {
        "bool" => quote! { redlilium_graph::FieldKind::Bool },
        "int" => quote! { redlilium_graph::FieldKind::Int },
        "uint" => quote! { redlilium_graph::FieldKind::UInt },
        "float" => quote! { redlilium_graph::FieldKind::Float },
        "char" => quote! { redlilium_graph::FieldKind::Char },
        "text" => quote! { redlilium_graph::FieldKind::Text },
        "reference" => quote! { redlilium_graph::FieldKind::Reference },
        "enum" => quote! {
            redlilium_graph::FieldKind::Enum(<#ty as redlilium_graph::Reflect>::descriptor())
        },
        other => {
            return Err(syn::Error::new_spanned(
                kind,
                format!("unknown field kind `{other}`"),
            ))
        }
    })
}

/// Infer `FieldKind` from a type by matching the last path segment.
/// Anything that is not a scalar or a string is a reference.
fn infer_field_kind(ty: &Type) -> proc_macro2::TokenStream {
    let type_name = extract_last_segment(ty);
    match type_name.as_str() {
        "bool" => quote! { redlilium_graph::FieldKind::Bool },
        "i8" | "i16" | "i32" | "i64" | "isize" => quote! { redlilium_graph::FieldKind::Int },
        "u8" | "u16" | "u32" | "u64" | "usize" => quote! { redlilium_graph::FieldKind::UInt },
        "f32" | "f64" => quote! { redlilium_graph::FieldKind::Float },
        "char" => quote! { redlilium_graph::FieldKind::Char },
        "String" | "str" => quote! { redlilium_graph::FieldKind::Text },
        _ => quote! { redlilium_graph::FieldKind::Reference },
    }
}

/// Extract the last segment name from a type path (e.g. `std::string::String` → `"String"`).
fn extract_last_segment(ty: &Type) -> String {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string())
            .unwrap_or_default(),
        Type::Reference(reference) => extract_last_segment(&reference.elem),
        _ => String::new(),
    }
}
