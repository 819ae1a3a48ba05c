use oxc_ast::ast::*;
use oxc_span::GetSpan;

use ts2c_codegen::types::CType;
use ts2c_codegen::{BinaryOp, Expr, ExprKind, LogicalOp, Span, UnaryOp, UpdateOp};

use super::context::{LowerCtx, LowerError, LowerResult};
use super::utils::{
    ir_span, lower_assignop, lower_binop, lower_unaryop, number_text, property_key_name,
};

/// Lower an expression and record its type under the new node's id.
pub(crate) fn lower_expr(expr: &Expression<'_>, ctx: &mut LowerCtx) -> LowerResult<Expr> {
    let span = ir_span(expr.span());
    let kind = match expr {
        Expression::NumericLiteral(num) => {
            ExprKind::Number(number_text(num.value, num.raw.as_ref().map(|r| r.as_str())))
        }
        Expression::StringLiteral(s) => ExprKind::Str(s.value.to_string()),
        Expression::BooleanLiteral(b) => ExprKind::Bool(b.value),
        Expression::NullLiteral(_) => ExprKind::Null,
        Expression::TemplateLiteral(tpl) => {
            if !tpl.expressions.is_empty() {
                return Err(LowerError::new(span, "template literal interpolation is not supported"));
            }
            ExprKind::Str(tpl.quasis.iter().map(|q| q.value.raw.as_str()).collect())
        }
        Expression::Identifier(id) if id.name.as_str() == "undefined" => ExprKind::Null,
        Expression::Identifier(id) => {
            let node = ctx.next_id();
            ctx.use_binding(id.name.as_str(), node);
            return Ok(Expr {
                id: node,
                span,
                kind: ExprKind::Ident(id.name.to_string()),
            });
        }
        Expression::ParenthesizedExpression(paren) => {
            let inner = lower_expr(&paren.expression, ctx)?;
            let node = ctx.next_id();
            ctx.alias_node(node, inner.id);
            return Ok(Expr {
                id: node,
                span,
                kind: ExprKind::Paren(Box::new(inner)),
            });
        }
        // Type-only wrappers vanish.
        Expression::TSAsExpression(e) => return lower_expr(&e.expression, ctx),
        Expression::TSSatisfiesExpression(e) => return lower_expr(&e.expression, ctx),
        Expression::TSNonNullExpression(e) => return lower_expr(&e.expression, ctx),
        Expression::ArrayExpression(arr) => {
            let mut elements = Vec::with_capacity(arr.elements.len());
            for element in &arr.elements {
                let Some(element) = element.as_expression() else {
                    return Err(LowerError::new(span, "spread and holes in array literals are not supported"));
                };
                elements.push(lower_expr(element, ctx)?);
            }
            ExprKind::Array(elements)
        }
        Expression::ObjectExpression(obj) => {
            let mut properties = Vec::with_capacity(obj.properties.len());
            for property in &obj.properties {
                let ObjectPropertyKind::ObjectProperty(p) = property else {
                    return Err(LowerError::new(span, "spread in object literals is not supported"));
                };
                if p.method || p.kind != PropertyKind::Init {
                    return Err(LowerError::new(
                        ir_span(p.span),
                        "methods and accessors in object literals are not supported",
                    ));
                }
                let key = property_key_name(&p.key, ir_span(p.span))?;
                properties.push((key, lower_expr(&p.value, ctx)?));
            }
            ExprKind::Object(properties)
        }
        Expression::StaticMemberExpression(member) => ExprKind::Member {
            object: Box::new(lower_expr(&member.object, ctx)?),
            property: member.property.name.to_string(),
        },
        Expression::ComputedMemberExpression(member) => ExprKind::Index {
            object: Box::new(lower_expr(&member.object, ctx)?),
            index: Box::new(lower_expr(&member.expression, ctx)?),
        },
        Expression::CallExpression(call) => {
            let callee = lower_expr(&call.callee, ctx)?;
            let mut args = Vec::with_capacity(call.arguments.len());
            for arg in &call.arguments {
                let Some(arg) = arg.as_expression() else {
                    return Err(LowerError::new(span, "spread arguments are not supported"));
                };
                args.push(lower_expr(arg, ctx)?);
            }
            note_array_growth(&callee, ctx);
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            }
        }
        Expression::UnaryExpression(un) => ExprKind::Unary {
            op: lower_unaryop(un.operator, span)?,
            arg: Box::new(lower_expr(&un.argument, ctx)?),
        },
        Expression::UpdateExpression(update) => ExprKind::Update {
            op: if update.operator == UpdateOperator::Increment {
                UpdateOp::Increment
            } else {
                UpdateOp::Decrement
            },
            prefix: update.prefix,
            arg: Box::new(lower_simple_target(&update.argument, ctx)?),
        },
        Expression::BinaryExpression(bin) => ExprKind::Binary {
            op: lower_binop(bin.operator, span)?,
            lhs: Box::new(lower_expr(&bin.left, ctx)?),
            rhs: Box::new(lower_expr(&bin.right, ctx)?),
        },
        Expression::LogicalExpression(log) => ExprKind::Logical {
            op: match log.operator {
                LogicalOperator::And => LogicalOp::And,
                LogicalOperator::Or => LogicalOp::Or,
                LogicalOperator::Coalesce => {
                    return Err(LowerError::new(span, "operator `??` is not supported"));
                }
            },
            lhs: Box::new(lower_expr(&log.left, ctx)?),
            rhs: Box::new(lower_expr(&log.right, ctx)?),
        },
        Expression::AssignmentExpression(assign) => {
            let op = lower_assignop(assign.operator, span)?;
            let Some(target) = assign.left.as_simple_assignment_target() else {
                return Err(LowerError::new(span, "destructuring assignment is not supported"));
            };
            ExprKind::Assign {
                op,
                target: Box::new(lower_simple_target(target, ctx)?),
                value: Box::new(lower_expr(&assign.right, ctx)?),
            }
        }
        Expression::ConditionalExpression(cond) => ExprKind::Conditional {
            test: Box::new(lower_expr(&cond.test, ctx)?),
            consequent: Box::new(lower_expr(&cond.consequent, ctx)?),
            alternate: Box::new(lower_expr(&cond.alternate, ctx)?),
        },
        Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_) => {
            return Err(LowerError::new(span, "function expressions are not supported"));
        }
        Expression::ChainExpression(_) => {
            return Err(LowerError::new(span, "optional chaining is not supported"));
        }
        Expression::NewExpression(_) => {
            return Err(LowerError::new(span, "`new` is not supported"));
        }
        _ => return Err(LowerError::new(span, "unsupported expression")),
    };
    Ok(finish_expr(kind, span, ctx))
}

/// Lower an assignment or update target.
pub(crate) fn lower_simple_target(
    target: &SimpleAssignmentTarget<'_>,
    ctx: &mut LowerCtx,
) -> LowerResult<Expr> {
    let span = ir_span(target.span());
    match target {
        SimpleAssignmentTarget::AssignmentTargetIdentifier(id) => {
            let node = ctx.next_id();
            ctx.use_binding(id.name.as_str(), node);
            Ok(Expr {
                id: node,
                span,
                kind: ExprKind::Ident(id.name.to_string()),
            })
        }
        SimpleAssignmentTarget::StaticMemberExpression(member) => {
            let kind = ExprKind::Member {
                object: Box::new(lower_expr(&member.object, ctx)?),
                property: member.property.name.to_string(),
            };
            Ok(finish_expr(kind, span, ctx))
        }
        SimpleAssignmentTarget::ComputedMemberExpression(member) => {
            let kind = ExprKind::Index {
                object: Box::new(lower_expr(&member.object, ctx)?),
                index: Box::new(lower_expr(&member.expression, ctx)?),
            };
            Ok(finish_expr(kind, span, ctx))
        }
        _ => Err(LowerError::new(span, "unsupported assignment target")),
    }
}

fn finish_expr(kind: ExprKind, span: Span, ctx: &mut LowerCtx) -> Expr {
    let ty = infer_type(&kind, ctx);
    let id = ctx.next_id();
    ctx.record(id, ty);
    Expr { id, span, kind }
}

/// `arr.push(..)` / `arr.pop()` on a local array makes that array growable.
fn note_array_growth(callee: &Expr, ctx: &mut LowerCtx) {
    let ExprKind::Member { object, property } = &callee.kind else {
        return;
    };
    if property != "push" && property != "pop" {
        return;
    }
    if let Some(binding) = ctx.binding_of(object.id) {
        ctx.mark_growable(binding);
    }
}

/// Type of an expression from its shape and the already-typed children.
fn infer_type(kind: &ExprKind, ctx: &LowerCtx) -> CType {
    match kind {
        ExprKind::Number(_) | ExprKind::Update { .. } => CType::Number,
        ExprKind::Str(_) => CType::String,
        ExprKind::Bool(_) | ExprKind::Logical { .. } => CType::Boolean,
        ExprKind::Null => CType::Unknown,
        ExprKind::Ident(_) => CType::Unknown,
        ExprKind::Paren(inner) => ctx.type_of(inner.id),
        ExprKind::Array(elements) => {
            let element_type = elements
                .first()
                .map(|e| ctx.type_of(e.id))
                .unwrap_or(CType::Number);
            CType::fixed_array(element_type, elements.len())
        }
        ExprKind::Object(properties) => {
            let element_type = properties
                .first()
                .map(|(_, value)| ctx.type_of(value.id))
                .unwrap_or(CType::Number);
            CType::dict(element_type)
        }
        ExprKind::Member { object, property } => match ctx.type_of(object.id) {
            CType::Array(_) | CType::String if property == "length" => CType::Number,
            CType::Dict(dict) => dict.element_type,
            CType::Struct { name } => ctx.lookup_field(&name, property),
            _ => CType::Unknown,
        },
        ExprKind::Index { object, index } => match ctx.type_of(object.id) {
            CType::Array(array) => array.element_type,
            CType::Dict(dict) => dict.element_type,
            CType::Struct { name } => match &index.kind {
                ExprKind::Str(field) => ctx.lookup_field(&name, field),
                _ => CType::Unknown,
            },
            _ => CType::Unknown,
        },
        ExprKind::Call { callee, .. } => match &callee.kind {
            ExprKind::Ident(name) => ctx.fn_ret_types.get(name).cloned().unwrap_or(CType::Unknown),
            ExprKind::Member { object, property } => {
                if object.as_ident() == Some("console") {
                    return CType::Void;
                }
                match (ctx.type_of(object.id), property.as_str()) {
                    (CType::Array(_), "push") => CType::Number,
                    (CType::Array(array), "pop") => array.element_type,
                    _ => CType::Unknown,
                }
            }
            _ => CType::Unknown,
        },
        ExprKind::Unary { op: UnaryOp::Not, .. } => CType::Boolean,
        ExprKind::Unary { .. } => CType::Number,
        ExprKind::Binary { op, lhs, rhs } => match op {
            BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::Eq
            | BinaryOp::Ne => CType::Boolean,
            BinaryOp::Add
                if ctx.type_of(lhs.id).is_string() || ctx.type_of(rhs.id).is_string() =>
            {
                CType::String
            }
            _ => CType::Number,
        },
        ExprKind::Assign { value, .. } => ctx.type_of(value.id),
        ExprKind::Conditional { consequent, .. } => ctx.type_of(consequent.id),
    }
}
