use proc_macro::TokenStream;
use proc_macro_crate::{FoundCrate, crate_name};
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Error, Fields, GenericArgument, Ident, PathArguments, ReturnType,
    Type, TypePath, parse_macro_input, spanned::Spanned,
};

/// Derive macro for relay's `Exchange` trait.
///
/// `Exchange` marks payload types that the SPSC primitives may move across
/// the producer/consumer boundary with a plain byte copy. The macro verifies
/// the parts of that contract that are visible in the type definition.
///
/// # Compile-Time Checks
///
/// 1. **Stable layout**: the type must carry `#[repr(C)]`,
///    `#[repr(transparent)]`, or a primitive repr for enums. A byte copy of
///    the slot must mean the same thing to both roles, which rules out the
///    unspecified default layout.
///
/// 2. **No indirection**: fields cannot contain pointer-carrying types. A
///    snapshot is complete only if the slot bytes are the whole value.
///    Forbidden types include:
///    - Heap handles: `Vec`, `Box`, `String`, `PathBuf`, `OsString`, `CString`
///    - Reference counting: `Rc`, `Arc`
///    - References and raw pointers: `&T`, `&mut T`, `*const T`, `*mut T`
///    - Shared-mutation cells and locks: `Cell`, `RefCell`, `UnsafeCell`,
///      `Mutex`, `RwLock`, `Condvar`, `Barrier`
///
/// 3. **Recursive safety**: every field must itself implement `Exchange`,
///    enforced through generated `where` clauses.
///
/// # Safety
///
/// The macro emits an `unsafe impl` because part of the contract stays with
/// the author: the checks above catch layout and indirection mistakes, but
/// they cannot prove that a hand-rolled field type is free of interior
/// mutability hidden behind a path the macro does not recognize.
///
/// # Example
///
/// ```
/// use relay::Exchange;
///
/// #[derive(Exchange, Clone, Copy)]
/// #[repr(C)]
/// struct Sample {
///     sequence: u32,
///     channels: [f32; 8],
/// }
/// ```
///
/// # Compile Errors
///
/// ```compile_fail
/// # use relay::Exchange;
/// #[derive(Exchange, Clone, Copy)]
/// struct MissingRepr { // error: requires #[repr(C)]
///     x: u32,
/// }
/// ```
///
/// ```compile_fail
/// # use relay::Exchange;
/// #[derive(Exchange, Clone)]
/// #[repr(C)]
/// struct HasHeapData {
///     data: Vec<u8>, // error: Vec is a heap handle
/// }
/// ```
#[proc_macro_derive(Exchange)]
pub fn derive_exchange(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_exchange_impl(input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error().into(),
    }
}

fn get_crate_path() -> proc_macro2::TokenStream {
    match crate_name("relay") {
        Ok(FoundCrate::Itself) => quote!(::relay),
        Ok(FoundCrate::Name(name)) => {
            let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
            quote!(::#ident)
        }
        Err(_) => quote!(::relay),
    }
}

fn derive_exchange_impl(input: DeriveInput) -> syn::Result<TokenStream> {
    check_repr(&input)?;

    let field_types = get_field_types(&input.data)?;
    field_types.iter().try_for_each(check_types)?;

    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let crate_path = get_crate_path();

    let mut where_predicates = where_clause
        .map(|w| w.predicates.iter().cloned().collect::<Vec<_>>())
        .unwrap_or_default();

    for ty in &field_types {
        where_predicates.push(syn::parse_quote! {
            #ty: #crate_path::__ExchangePrivate
        });
    }

    let expanded = if where_predicates.is_empty() {
        quote! {
            unsafe impl #impl_generics #crate_path::__ExchangePrivate for #name #ty_generics #where_clause {}
        }
    } else {
        quote! {
            unsafe impl #impl_generics #crate_path::__ExchangePrivate for #name #ty_generics
            where
                #(#where_predicates),*
            {}
        }
    };

    Ok(expanded.into())
}

fn is_valid_repr_ident(ident: &syn::Ident) -> bool {
    ident == "C"
        || ident == "transparent"
        || ident == "u8"
        || ident == "u16"
        || ident == "u32"
        || ident == "u64"
        || ident == "u128"
        || ident == "usize"
        || ident == "i8"
        || ident == "i16"
        || ident == "i32"
        || ident == "i64"
        || ident == "i128"
        || ident == "isize"
}

fn has_valid_repr(attr: &Attribute) -> syn::Result<bool> {
    if !attr.path().is_ident("repr") {
        return Ok(false);
    }

    let mut valid = false;

    attr.parse_nested_meta(|meta| {
        if let Some(ident) = meta.path.get_ident()
            && is_valid_repr_ident(ident)
        {
            valid = true;
        }
        Ok(())
    })?;

    Ok(valid)
}

fn check_repr(input: &DeriveInput) -> syn::Result<()> {
    let has_valid =
        input.attrs.iter().try_fold(
            false,
            |acc, attr| {
                if acc { Ok(true) } else { has_valid_repr(attr) }
            },
        )?;

    if !has_valid {
        let help_msg = if matches!(input.data, Data::Enum(_)) {
            "Exchange requires #[repr(C)], #[repr(transparent)], \
             or #[repr(u8/i8/etc)] for enums\n\
             help: add #[repr(C)] or #[repr(u8)] above this item"
        } else {
            "Exchange requires #[repr(C)] or #[repr(transparent)]\n\
             help: add #[repr(C)] above this item"
        };
        return Err(Error::new(input.span(), help_msg));
    }
    Ok(())
}

fn get_field_types(data: &Data) -> syn::Result<Vec<Type>> {
    fn extract_field_types(fields: &Fields) -> Vec<Type> {
        match fields {
            Fields::Named(fields) => fields.named.iter().map(|f| f.ty.clone()).collect(),
            Fields::Unnamed(fields) => fields.unnamed.iter().map(|f| f.ty.clone()).collect(),
            Fields::Unit => Vec::new(),
        }
    }

    match data {
        Data::Struct(data_struct) => Ok(extract_field_types(&data_struct.fields)),

        Data::Enum(data_enum) => Ok(data_enum
            .variants
            .iter()
            .flat_map(|variant| extract_field_types(&variant.fields))
            .collect()),

        Data::Union(u) => Err(Error::new(
            u.union_token.span,
            "Exchange cannot be derived for unions",
        )),
    }
}

fn check_types(field_ty: &Type) -> syn::Result<()> {
    // Inner recursive walker that has access to the original field type.
    fn walk(ty: &Type, field_ty: &Type) -> syn::Result<()> {
        match ty {
            Type::Path(TypePath { path, .. }) => {
                for segment in &path.segments {
                    check_forbidden_type(&segment.ident, field_ty, segment.ident.span())?;

                    match &segment.arguments {
                        PathArguments::AngleBracketed(args) => {
                            for arg in &args.args {
                                if let GenericArgument::Type(inner_ty) = arg {
                                    walk(inner_ty, field_ty)?;
                                }
                            }
                        }
                        PathArguments::Parenthesized(args) => {
                            for input in &args.inputs {
                                walk(input, field_ty)?;
                            }
                            if let ReturnType::Type(_, ret_ty) = &args.output {
                                walk(ret_ty, field_ty)?;
                            }
                        }
                        PathArguments::None => {}
                    }
                }
            }

            Type::Reference(type_ref) => {
                return Err(Error::new(
                    type_ref.span(),
                    format!(
                        "Field type `{}` contains a reference (`&` or `&mut`).\n\
                         A byte copy of a reference duplicates the pointer, not the value,\n\
                         and ties the snapshot to memory the consumer does not own.\n\
                         help: store the value inline instead",
                        quote!(#field_ty),
                    ),
                ));
            }

            Type::Ptr(type_ptr) => {
                return Err(Error::new(
                    type_ptr.span(),
                    format!(
                        "Field type `{}` contains a raw pointer (`*const` or `*mut`).\n\
                         A byte copy of a pointer duplicates the address, not the value.\n\
                         help: store the value inline instead",
                        quote!(#field_ty),
                    ),
                ));
            }

            Type::Tuple(tuple) => {
                for elem in &tuple.elems {
                    walk(elem, field_ty)?;
                }
            }

            Type::Array(array) => {
                walk(&array.elem, field_ty)?;
            }

            Type::Slice(slice) => {
                walk(&slice.elem, field_ty)?;
            }

            Type::Group(group) => {
                walk(&group.elem, field_ty)?;
            }

            Type::Paren(paren) => {
                walk(&paren.elem, field_ty)?;
            }

            // Other variants (Never, Infer, Macro, TraitObject, ImplTrait, Verbatim, etc.)
            // either can't appear as struct fields or don't contain type parameters we care about.
            _ => {}
        }

        Ok(())
    }

    walk(field_ty, field_ty)
}

fn check_forbidden_type(
    ident: &Ident,
    field_ty: &Type,
    span: proc_macro2::Span,
) -> syn::Result<()> {
    enum ForbiddenType {
        Heap,
        RefCounted,
        SharedMutation,
    }

    fn classify_forbidden(ident: &Ident) -> Option<ForbiddenType> {
        const HEAP_TYPES: &[&str] = &["Vec", "Box", "String", "PathBuf", "OsString", "CString"];
        const RC_TYPES: &[&str] = &["Rc", "Arc"];
        const SHARED_MUTATION_TYPES: &[&str] = &[
            "Cell", "RefCell", "UnsafeCell", "Mutex", "RwLock", "Condvar", "Barrier",
        ];

        if HEAP_TYPES.iter().any(|&name| ident == name) {
            Some(ForbiddenType::Heap)
        } else if RC_TYPES.iter().any(|&name| ident == name) {
            Some(ForbiddenType::RefCounted)
        } else if SHARED_MUTATION_TYPES.iter().any(|&name| ident == name) {
            Some(ForbiddenType::SharedMutation)
        } else {
            None
        }
    }

    if let Some(category) = classify_forbidden(ident) {
        let msg = match category {
            ForbiddenType::Heap => format!(
                "Field type `{}` contains `{}` which owns a heap allocation.\n\
                 Exchange payloads move by byte copy; a copied heap handle would be\n\
                 double-owned.\n\
                 help: use inline data like `[T; N]` instead",
                quote!(#field_ty),
                ident,
            ),
            ForbiddenType::RefCounted => format!(
                "Field type `{}` contains `{}` which uses reference counting.\n\
                 A byte copy bypasses the reference count.\n\
                 help: use inline data instead",
                quote!(#field_ty),
                ident,
            ),
            ForbiddenType::SharedMutation => format!(
                "Field type `{}` contains `{}` which permits mutation behind a\n\
                 shared reference. Exchange payloads must be value-stable: the bytes\n\
                 observed under the publication protocol are the whole story.\n\
                 help: keep payloads to plain data and leave synchronization to the\n\
                 primitive",
                quote!(#field_ty),
                ident,
            ),
        };

        return Err(Error::new(span, msg));
    }

    Ok(())
}
