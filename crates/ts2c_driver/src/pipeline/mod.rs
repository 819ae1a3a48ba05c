use log::debug;
use oxc_ast::ast::*;

use ts2c_codegen::types::CType;
use ts2c_codegen::{Function as IrFunction, Module, Param};

mod compile;
mod context;
mod exprs;
mod stmts;
mod types;
mod utils;
pub use compile::{compile_file, compile_source, output_path, CompileError, CompileOptions};
pub(crate) use context::*;
pub(crate) use stmts::*;
pub(crate) use types::*;
pub(crate) use utils::*;

// ---------------------------------------------------------------------------
// AST -> Module lowering
// ---------------------------------------------------------------------------

/// Lower a program into one translation unit.
///
/// Top-level functions become C functions; every other top-level statement
/// runs in the synthesized `main`, in source order.
pub(crate) fn lower_program(program: &Program<'_>, ctx: &mut LowerCtx) -> LowerResult<Module> {
    // First pass: declared shapes and function signatures, so bodies and
    // call sites can be typed regardless of declaration order.
    for stmt in &program.body {
        match stmt {
            Statement::TSInterfaceDeclaration(iface) => collect_interface(iface, ctx),
            Statement::TSTypeAliasDeclaration(alias) => collect_type_alias(alias, ctx),
            Statement::FunctionDeclaration(func) => collect_fn_sig(func, ctx),
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(Declaration::TSInterfaceDeclaration(iface)) => collect_interface(iface, ctx),
                Some(Declaration::TSTypeAliasDeclaration(alias)) => collect_type_alias(alias, ctx),
                Some(Declaration::FunctionDeclaration(func)) => collect_fn_sig(func, ctx),
                _ => {}
            },
            _ => {}
        }
    }

    // Second pass: functions and top-level statements.
    let mut module = Module::default();
    for stmt in &program.body {
        match stmt {
            Statement::FunctionDeclaration(func) => {
                if let Some(function) = lower_function(func, ctx)? {
                    module.functions.push(function);
                }
            }
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(Declaration::FunctionDeclaration(func)) => {
                    if let Some(function) = lower_function(func, ctx)? {
                        module.functions.push(function);
                    }
                }
                Some(Declaration::VariableDeclaration(decl)) => {
                    let declarators = lower_declarators(decl, ctx)?;
                    module.top_level.push(ts2c_codegen::Stmt {
                        id: ctx.next_id(),
                        span: ir_span(export.span),
                        kind: ts2c_codegen::StmtKind::VarDecl(declarators),
                    });
                }
                Some(Declaration::TSInterfaceDeclaration(_))
                | Some(Declaration::TSTypeAliasDeclaration(_)) => {}
                _ => {
                    return Err(LowerError::new(
                        ir_span(export.span),
                        "only exported functions and variables are supported",
                    ));
                }
            },
            other if is_type_only(other) => {}
            other => module.top_level.push(lower_stmt(other, ctx)?),
        }
    }
    debug!(
        "lowered {} functions and {} top-level statements",
        module.functions.len(),
        module.top_level.len()
    );
    Ok(module)
}

/// Lower one function declaration. Ambient declarations (no body) only
/// contribute their signature and produce nothing.
fn lower_function(func: &Function<'_>, ctx: &mut LowerCtx) -> LowerResult<Option<IrFunction>> {
    let span = ir_span(func.span);
    let Some(id) = &func.id else {
        return Err(LowerError::new(span, "anonymous functions are not supported"));
    };
    let name = id.name.to_string();
    ctx.mention(&name);
    let Some(body) = &func.body else {
        return Ok(None);
    };
    if func.r#async || func.generator {
        return Err(LowerError::new(span, "async and generator functions are not supported"));
    }
    if func.params.rest.is_some() {
        return Err(LowerError::new(span, "rest parameters are not supported"));
    }

    // Functions see their parameters only; top-level variables live in `main`.
    let saved = ctx.save_scope();
    ctx.var_bindings.clear();

    let mut params = Vec::with_capacity(func.params.items.len());
    for p in &func.params.items {
        let pname = binding_name(&p.pattern, ir_span(p.span))?;
        let pty = p
            .type_annotation
            .as_ref()
            .map(|ann| lower_ts_type(&ann.type_annotation, ctx))
            .unwrap_or(CType::Number);
        let pid = ctx.next_id();
        ctx.declare(&pname, pty.clone(), pid);
        params.push(Param {
            id: pid,
            name: pname,
            ty: pty,
        });
    }
    let ret_type = ctx.fn_ret_types.get(&name).cloned().unwrap_or(CType::Void);
    let body = lower_stmts(&body.statements, ctx);
    ctx.restore_scope(saved);

    debug!("lowered function `{name}`");
    Ok(Some(IrFunction {
        id: ctx.next_id(),
        span,
        name,
        params,
        ret_type,
        body: body?,
    }))
}
