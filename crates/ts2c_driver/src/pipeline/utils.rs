use oxc_ast::ast::*;

use ts2c_codegen::{AssignOp, BinaryOp, Span, UnaryOp};

use super::context::{LowerError, LowerResult};

pub(crate) fn ir_span(span: oxc_span::Span) -> Span {
    Span::new(span.start, span.end)
}

pub(crate) fn binding_name(pattern: &BindingPattern<'_>, span: Span) -> LowerResult<String> {
    match pattern {
        BindingPattern::BindingIdentifier(id) => Ok(id.name.to_string()),
        _ => Err(LowerError::new(span, "destructuring patterns are not supported")),
    }
}

pub(crate) fn property_key_name(key: &PropertyKey<'_>, span: Span) -> LowerResult<String> {
    match key {
        PropertyKey::StaticIdentifier(id) => Ok(id.name.to_string()),
        PropertyKey::StringLiteral(s) => Ok(s.value.to_string()),
        _ => Err(LowerError::new(span, "computed property keys are not supported")),
    }
}

pub(crate) fn ts_type_name_string(name: &TSTypeName<'_>) -> String {
    match name {
        TSTypeName::IdentifierReference(id) => id.name.to_string(),
        TSTypeName::QualifiedName(q) => {
            let left = ts_type_name_string(&q.left);
            format!("{left}.{}", q.right.name)
        }
        TSTypeName::ThisExpression(_) => "this".to_string(),
    }
}

/// Numeric literal text as C will read it.
pub(crate) fn number_text(value: f64, raw: Option<&str>) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        raw.map(str::to_string).unwrap_or_else(|| value.to_string())
    }
}

pub(crate) fn lower_binop(op: BinaryOperator, span: Span) -> LowerResult<BinaryOp> {
    Ok(match op {
        BinaryOperator::Addition => BinaryOp::Add,
        BinaryOperator::Subtraction => BinaryOp::Sub,
        BinaryOperator::Multiplication => BinaryOp::Mul,
        BinaryOperator::Division => BinaryOp::Div,
        BinaryOperator::Remainder => BinaryOp::Rem,
        BinaryOperator::LessThan => BinaryOp::Lt,
        BinaryOperator::LessEqualThan => BinaryOp::Le,
        BinaryOperator::GreaterThan => BinaryOp::Gt,
        BinaryOperator::GreaterEqualThan => BinaryOp::Ge,
        BinaryOperator::Equality | BinaryOperator::StrictEquality => BinaryOp::Eq,
        BinaryOperator::Inequality | BinaryOperator::StrictInequality => BinaryOp::Ne,
        BinaryOperator::BitwiseAnd => BinaryOp::BitAnd,
        BinaryOperator::BitwiseOR => BinaryOp::BitOr,
        BinaryOperator::BitwiseXOR => BinaryOp::BitXor,
        BinaryOperator::ShiftLeft => BinaryOp::Shl,
        BinaryOperator::ShiftRight | BinaryOperator::ShiftRightZeroFill => BinaryOp::Shr,
        other => {
            return Err(LowerError::new(
                span,
                format!("operator `{}` is not supported", other.as_str()),
            ));
        }
    })
}

pub(crate) fn lower_unaryop(op: UnaryOperator, span: Span) -> LowerResult<UnaryOp> {
    Ok(match op {
        UnaryOperator::UnaryNegation => UnaryOp::Neg,
        UnaryOperator::UnaryPlus => UnaryOp::Plus,
        UnaryOperator::LogicalNot => UnaryOp::Not,
        UnaryOperator::BitwiseNot => UnaryOp::BitNot,
        other => {
            return Err(LowerError::new(
                span,
                format!("operator `{}` is not supported", other.as_str()),
            ));
        }
    })
}

pub(crate) fn lower_assignop(op: AssignmentOperator, span: Span) -> LowerResult<AssignOp> {
    let binary = match op {
        AssignmentOperator::Assign => return Ok(AssignOp::Assign),
        AssignmentOperator::Addition => BinaryOp::Add,
        AssignmentOperator::Subtraction => BinaryOp::Sub,
        AssignmentOperator::Multiplication => BinaryOp::Mul,
        AssignmentOperator::Division => BinaryOp::Div,
        AssignmentOperator::Remainder => BinaryOp::Rem,
        AssignmentOperator::ShiftLeft => BinaryOp::Shl,
        AssignmentOperator::ShiftRight | AssignmentOperator::ShiftRightZeroFill => BinaryOp::Shr,
        AssignmentOperator::BitwiseAnd => BinaryOp::BitAnd,
        AssignmentOperator::BitwiseOR => BinaryOp::BitOr,
        AssignmentOperator::BitwiseXOR => BinaryOp::BitXor,
        other => {
            return Err(LowerError::new(
                span,
                format!("operator `{}` is not supported", other.as_str()),
            ));
        }
    };
    Ok(AssignOp::Compound(binary))
}

/// 1-based line and column of a byte offset.
pub(crate) fn line_col(source: &str, offset: u32) -> (usize, usize) {
    let offset = (offset as usize).min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => before[newline + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, column)
}
