use std::collections::HashMap;

use oxc_ast::ast::*;

use ts2c_codegen::types::CType;

use super::context::LowerCtx;
use super::utils::{ir_span, property_key_name, ts_type_name_string};

// ---------------------------------------------------------------------------
// Type lowering: TS type annotations -> CType
// ---------------------------------------------------------------------------

/// Lower a TS type annotation to the C type the translator works with.
///
/// Every numeric flavour collapses to `Number`; `T[]` and `Array<T>` are
/// heap arrays; `Record<string, T>` and `{ [key: string]: T }` are dicts;
/// any other named type is a struct unless it names a known alias.
pub(crate) fn lower_ts_type(ts_type: &TSType<'_>, ctx: &LowerCtx) -> CType {
    match ts_type {
        TSType::TSNumberKeyword(_) => CType::Number,
        TSType::TSBooleanKeyword(_) => CType::Boolean,
        TSType::TSStringKeyword(_) => CType::String,
        TSType::TSVoidKeyword(_) | TSType::TSUndefinedKeyword(_) => CType::Void,
        TSType::TSArrayType(arr) => CType::dynamic_array(lower_ts_type(&arr.element_type, ctx)),
        TSType::TSParenthesizedType(paren) => lower_ts_type(&paren.type_annotation, ctx),
        TSType::TSTypeLiteral(lit) => index_signature(&lit.members, ctx)
            .map(CType::dict)
            .unwrap_or(CType::Unknown),
        TSType::TSTypeReference(ref_type) => {
            let name = ts_type_name_string(&ref_type.type_name);
            let mut args = ref_type
                .type_arguments
                .as_ref()
                .map(|a| a.params.iter().map(|t| lower_ts_type(t, ctx)))
                .into_iter()
                .flatten();
            match name.as_str() {
                "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64" | "int" => CType::Number,
                "Array" => CType::dynamic_array(args.next().unwrap_or(CType::Number)),
                "Record" => {
                    let _key = args.next();
                    CType::dict(args.next().unwrap_or(CType::Number))
                }
                _ => match ctx.type_aliases.get(&name) {
                    Some(alias) => alias.clone(),
                    None => CType::Struct { name },
                },
            }
        }
        _ => CType::Unknown,
    }
}

/// Value type of a `[key: string]: T` member, if the literal has one.
fn index_signature(members: &[TSSignature<'_>], ctx: &LowerCtx) -> Option<CType> {
    members.iter().find_map(|member| match member {
        TSSignature::TSIndexSignature(sig) => {
            Some(lower_ts_type(&sig.type_annotation.type_annotation, ctx))
        }
        _ => None,
    })
}

/// Field types of an object-shaped type literal.
fn property_fields(
    members: &[TSSignature<'_>],
    ctx: &LowerCtx,
) -> HashMap<String, CType> {
    let mut fields = HashMap::new();
    for member in members {
        if let TSSignature::TSPropertySignature(prop) = member {
            let Ok(name) = property_key_name(&prop.key, ir_span(prop.span)) else {
                continue;
            };
            let ty = prop
                .type_annotation
                .as_ref()
                .map(|ann| lower_ts_type(&ann.type_annotation, ctx))
                .unwrap_or(CType::Unknown);
            fields.insert(name, ty);
        }
    }
    fields
}

/// Register an `interface` as a struct shape.
pub(crate) fn collect_interface(iface: &TSInterfaceDeclaration<'_>, ctx: &mut LowerCtx) {
    let fields = property_fields(&iface.body.body, ctx);
    ctx.struct_defs.insert(iface.id.name.to_string(), fields);
}

/// Register a `type` alias: object literals become struct shapes, anything
/// else is remembered as an alias for later annotations.
pub(crate) fn collect_type_alias(alias: &TSTypeAliasDeclaration<'_>, ctx: &mut LowerCtx) {
    let name = alias.id.name.to_string();
    if let TSType::TSTypeLiteral(lit) = &alias.type_annotation {
        if index_signature(&lit.members, ctx).is_none() {
            let fields = property_fields(&lit.members, ctx);
            ctx.struct_defs.insert(name, fields);
            return;
        }
    }
    let ty = lower_ts_type(&alias.type_annotation, ctx);
    ctx.type_aliases.insert(name, ty);
}

/// Register a function's declared return type so call sites can be typed.
pub(crate) fn collect_fn_sig(func: &Function<'_>, ctx: &mut LowerCtx) {
    if let Some(id) = &func.id {
        let ret_type = func
            .return_type
            .as_ref()
            .map(|r| lower_ts_type(&r.type_annotation, ctx))
            .unwrap_or(CType::Void);
        ctx.fn_ret_types.insert(id.name.to_string(), ret_type);
    }
}
