//! IR construction helpers for unit tests.

use std::cell::Cell;

use crate::{
    BinaryOp, Expr, ExprKind, ForBinding, NodeId, Span, Stmt, StmtKind, SwitchClause,
    VarDeclarator,
};

pub(crate) struct Builder {
    next: Cell<u32>,
}

impl Builder {
    pub fn new() -> Self {
        Self { next: Cell::new(1) }
    }

    fn id(&self) -> NodeId {
        let id = self.next.get();
        self.next.set(id + 1);
        NodeId(id)
    }

    pub fn expr(&self, kind: ExprKind) -> Expr {
        Expr {
            id: self.id(),
            span: Span::default(),
            kind,
        }
    }

    pub fn stmt(&self, kind: StmtKind) -> Stmt {
        Stmt {
            id: self.id(),
            span: Span::default(),
            kind,
        }
    }

    pub fn ident(&self, name: &str) -> Expr {
        self.expr(ExprKind::Ident(name.to_string()))
    }

    pub fn number(&self, text: &str) -> Expr {
        self.expr(ExprKind::Number(text.to_string()))
    }

    pub fn string(&self, text: &str) -> Expr {
        self.expr(ExprKind::Str(text.to_string()))
    }

    pub fn member(&self, object: Expr, property: &str) -> Expr {
        self.expr(ExprKind::Member {
            object: Box::new(object),
            property: property.to_string(),
        })
    }

    pub fn index(&self, object: Expr, index: Expr) -> Expr {
        self.expr(ExprKind::Index {
            object: Box::new(object),
            index: Box::new(index),
        })
    }

    pub fn call(&self, callee: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            callee: Box::new(callee),
            args,
        })
    }

    pub fn binary(&self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn assign(&self, target: Expr, value: Expr) -> Expr {
        self.expr(ExprKind::Assign {
            op: crate::AssignOp::Assign,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub fn array(&self, elements: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Array(elements))
    }

    pub fn object(&self, properties: Vec<(&str, Expr)>) -> Expr {
        self.expr(ExprKind::Object(
            properties
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        ))
    }

    pub fn declarator(&self, name: &str, init: Option<Expr>) -> VarDeclarator {
        VarDeclarator {
            id: self.id(),
            span: Span::default(),
            name: name.to_string(),
            init,
        }
    }

    pub fn expr_stmt(&self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expr(expr))
    }

    /// `name();`
    pub fn call_stmt(&self, name: &str) -> Stmt {
        self.expr_stmt(self.call(self.ident(name), vec![]))
    }

    pub fn block(&self, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::Block(body))
    }

    pub fn ret(&self, value: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Return(value))
    }

    pub fn var_decl(&self, declarators: Vec<VarDeclarator>) -> Stmt {
        self.stmt(StmtKind::VarDecl(declarators))
    }

    pub fn clause(&self, test: Option<Expr>, body: Vec<Stmt>) -> SwitchClause {
        SwitchClause {
            span: Span::default(),
            test,
            body,
        }
    }

    pub fn for_of(&self, left: ForBinding, right: Expr, body: Stmt) -> Stmt {
        self.stmt(StmtKind::ForOf {
            left,
            right,
            body: Box::new(body),
        })
    }

    pub fn for_in(&self, left: ForBinding, right: Expr, body: Stmt) -> Stmt {
        self.stmt(StmtKind::ForIn {
            left,
            right,
            body: Box::new(body),
        })
    }
}
