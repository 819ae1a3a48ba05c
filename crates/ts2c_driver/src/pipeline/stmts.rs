use oxc_ast::ast::*;
use oxc_span::GetSpan;

use ts2c_codegen::types::CType;
use ts2c_codegen::{ForBinding, ForInit, Span, Stmt, StmtKind, SwitchClause, VarDeclarator};

use super::context::{LowerCtx, LowerError, LowerResult};
use super::exprs::{lower_expr, lower_simple_target};
use super::types::lower_ts_type;
use super::utils::{binding_name, ir_span};

/// Interfaces and type aliases only feed type resolution.
pub(crate) fn is_type_only(stmt: &Statement<'_>) -> bool {
    matches!(
        stmt,
        Statement::TSInterfaceDeclaration(_) | Statement::TSTypeAliasDeclaration(_)
    )
}

pub(crate) fn lower_stmts(stmts: &[Statement<'_>], ctx: &mut LowerCtx) -> LowerResult<Vec<Stmt>> {
    stmts
        .iter()
        .filter(|stmt| !is_type_only(stmt))
        .map(|stmt| lower_stmt(stmt, ctx))
        .collect()
}

fn make_stmt(ctx: &mut LowerCtx, span: Span, kind: StmtKind) -> Stmt {
    Stmt {
        id: ctx.next_id(),
        span,
        kind,
    }
}

/// Lower a statement in its own lexical scope.
fn lower_scoped(stmt: &Statement<'_>, ctx: &mut LowerCtx) -> LowerResult<Stmt> {
    let saved = ctx.save_scope();
    let lowered = lower_stmt(stmt, ctx);
    ctx.restore_scope(saved);
    lowered
}

pub(crate) fn lower_stmt(stmt: &Statement<'_>, ctx: &mut LowerCtx) -> LowerResult<Stmt> {
    let span = ir_span(stmt.span());
    let kind = match stmt {
        Statement::VariableDeclaration(decl) => StmtKind::VarDecl(lower_declarators(decl, ctx)?),
        Statement::ExpressionStatement(expr_stmt) => {
            StmtKind::Expr(lower_expr(&expr_stmt.expression, ctx)?)
        }
        Statement::ReturnStatement(ret) => StmtKind::Return(
            ret.argument
                .as_ref()
                .map(|e| lower_expr(e, ctx))
                .transpose()?,
        ),
        Statement::IfStatement(if_stmt) => StmtKind::If {
            test: lower_expr(&if_stmt.test, ctx)?,
            consequent: Box::new(lower_scoped(&if_stmt.consequent, ctx)?),
            alternate: match &if_stmt.alternate {
                Some(alt) => Some(Box::new(lower_scoped(alt, ctx)?)),
                None => None,
            },
        },
        Statement::WhileStatement(while_stmt) => StmtKind::While {
            test: lower_expr(&while_stmt.test, ctx)?,
            body: Box::new(lower_scoped(&while_stmt.body, ctx)?),
        },
        Statement::DoWhileStatement(do_while) => StmtKind::DoWhile {
            body: Box::new(lower_scoped(&do_while.body, ctx)?),
            test: lower_expr(&do_while.test, ctx)?,
        },
        Statement::ForStatement(for_stmt) => {
            let saved = ctx.save_scope();
            let init = match &for_stmt.init {
                Some(ForStatementInit::VariableDeclaration(decl)) => {
                    Some(ForInit::VarDecl(lower_declarators(decl, ctx)?))
                }
                Some(other) => match other.as_expression() {
                    Some(expr) => Some(ForInit::Expr(lower_expr(expr, ctx)?)),
                    None => return Err(LowerError::new(span, "unsupported for-loop initializer")),
                },
                None => None,
            };
            let test = for_stmt.test.as_ref().map(|e| lower_expr(e, ctx)).transpose()?;
            let update = for_stmt.update.as_ref().map(|e| lower_expr(e, ctx)).transpose()?;
            let body = lower_scoped(&for_stmt.body, ctx)?;
            ctx.restore_scope(saved);
            StmtKind::For {
                init,
                test,
                update,
                body: Box::new(body),
            }
        }
        Statement::ForOfStatement(for_of) => {
            if for_of.r#await {
                return Err(LowerError::new(span, "`for await` is not supported"));
            }
            let saved = ctx.save_scope();
            let right = lower_expr(&for_of.right, ctx)?;
            let element_type = match ctx.type_of(right.id) {
                CType::Array(array) => array.element_type,
                _ => CType::Unknown,
            };
            let left = lower_for_binding(&for_of.left, element_type, ctx)?;
            let body = lower_scoped(&for_of.body, ctx)?;
            ctx.restore_scope(saved);
            StmtKind::ForOf {
                left,
                right,
                body: Box::new(body),
            }
        }
        Statement::ForInStatement(for_in) => {
            let saved = ctx.save_scope();
            let right = lower_expr(&for_in.right, ctx)?;
            let left = lower_for_binding(&for_in.left, CType::String, ctx)?;
            let body = lower_scoped(&for_in.body, ctx)?;
            ctx.restore_scope(saved);
            StmtKind::ForIn {
                left,
                right,
                body: Box::new(body),
            }
        }
        Statement::SwitchStatement(switch) => {
            let discriminant = lower_expr(&switch.discriminant, ctx)?;
            // The clauses of one switch share a block scope.
            let saved = ctx.save_scope();
            let mut clauses = Vec::with_capacity(switch.cases.len());
            for case in &switch.cases {
                let test = case.test.as_ref().map(|t| lower_expr(t, ctx)).transpose()?;
                clauses.push(SwitchClause {
                    span: ir_span(case.span),
                    test,
                    body: lower_stmts(&case.consequent, ctx)?,
                });
            }
            ctx.restore_scope(saved);
            StmtKind::Switch {
                discriminant,
                clauses,
            }
        }
        Statement::BreakStatement(brk) => {
            if brk.label.is_some() {
                return Err(LowerError::new(span, "labeled `break` is not supported"));
            }
            StmtKind::Break
        }
        Statement::ContinueStatement(cont) => {
            if cont.label.is_some() {
                return Err(LowerError::new(span, "labeled `continue` is not supported"));
            }
            StmtKind::Continue
        }
        Statement::EmptyStatement(_) => StmtKind::Empty,
        Statement::BlockStatement(block) => {
            let saved = ctx.save_scope();
            let body = lower_stmts(&block.body, ctx);
            ctx.restore_scope(saved);
            StmtKind::Block(body?)
        }
        Statement::ImportDeclaration(import) => {
            if let Some(specifiers) = &import.specifiers {
                for specifier in specifiers {
                    let local = match specifier {
                        ImportDeclarationSpecifier::ImportSpecifier(s) => &s.local,
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => &s.local,
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => &s.local,
                    };
                    ctx.mention(local.name.as_str());
                }
            }
            StmtKind::Import {
                source: import.source.value.to_string(),
            }
        }
        other => {
            return Err(LowerError::new(
                span,
                format!("{} is not supported", statement_name(other)),
            ));
        }
    };
    Ok(make_stmt(ctx, span, kind))
}

fn statement_name(stmt: &Statement<'_>) -> &'static str {
    match stmt {
        Statement::TryStatement(_) => "`try`",
        Statement::ThrowStatement(_) => "`throw`",
        Statement::LabeledStatement(_) => "a labeled statement",
        Statement::WithStatement(_) => "`with`",
        Statement::DebuggerStatement(_) => "`debugger`",
        Statement::ClassDeclaration(_) => "a class declaration",
        Statement::FunctionDeclaration(_) => "a nested function declaration",
        Statement::TSEnumDeclaration(_) => "an enum declaration",
        Statement::ExportDefaultDeclaration(_) | Statement::ExportAllDeclaration(_) => {
            "this export"
        }
        _ => "this statement",
    }
}

/// Lower the declarators of one `let` / `const` / `var` and bind their names.
///
/// A declarator's type is its annotation, else the type of its initializer.
pub(crate) fn lower_declarators(
    decl: &VariableDeclaration<'_>,
    ctx: &mut LowerCtx,
) -> LowerResult<Vec<VarDeclarator>> {
    let mut declarators = Vec::with_capacity(decl.declarations.len());
    for declarator in &decl.declarations {
        let span = ir_span(declarator.span);
        let name = binding_name(&declarator.id, span)?;
        let init = declarator.init.as_ref().map(|e| lower_expr(e, ctx)).transpose()?;
        let annotated = declarator
            .type_annotation
            .as_ref()
            .map(|ann| lower_ts_type(&ann.type_annotation, ctx))
            .filter(|ty| *ty != CType::Unknown);
        let ty = match (annotated, &init) {
            (Some(ty), _) => ty,
            (None, Some(init)) => ctx.type_of(init.id),
            (None, None) => CType::Unknown,
        };
        let id = ctx.next_id();
        ctx.declare(&name, ty, id);
        declarators.push(VarDeclarator {
            id,
            span,
            name,
            init,
        });
    }
    Ok(declarators)
}

/// Left side of `for..of` / `for..in`; a declaration takes `element_type`.
fn lower_for_binding(
    left: &ForStatementLeft<'_>,
    element_type: CType,
    ctx: &mut LowerCtx,
) -> LowerResult<ForBinding> {
    let span = ir_span(left.span());
    if let ForStatementLeft::VariableDeclaration(decl) = left {
        let [declarator] = &decl.declarations[..] else {
            return Err(LowerError::new(span, "expected a single loop variable"));
        };
        let name = binding_name(&declarator.id, span)?;
        let id = ctx.next_id();
        ctx.declare(&name, element_type, id);
        return Ok(ForBinding::Decl(VarDeclarator {
            id,
            span: ir_span(declarator.span),
            name,
            init: None,
        }));
    }
    let target = left
        .as_assignment_target()
        .and_then(|target| target.as_simple_assignment_target())
        .ok_or_else(|| LowerError::new(span, "destructuring loop targets are not supported"))?;
    Ok(ForBinding::Target(lower_simple_target(target, ctx)?))
}
