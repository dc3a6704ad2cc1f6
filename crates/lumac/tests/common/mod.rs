//! Shared helpers for the lumac integration tests.
//!
//! The parser is an external collaborator, so tests construct
//! `luma_ast` programs directly. These builders keep the individual
//! tests focused on the behavior under test.

#![allow(dead_code)]

use luma_ast::*;

pub fn use_mod(name: &str) -> Stmt {
    Stmt::Use(UseDecl {
        module: name.to_string(),
        alias: None,
    })
}

pub fn use_mod_as(name: &str, alias: &str) -> Stmt {
    Stmt::Use(UseDecl {
        module: name.to_string(),
        alias: Some(alias.to_string()),
    })
}

pub fn pub_fn(name: &str, params: Vec<(&str, TypeAnn)>, ret: TypeAnn, body: Vec<Stmt>) -> Stmt {
    Stmt::FnDecl(FnDecl {
        name: name.to_string(),
        params: params
            .into_iter()
            .map(|(pname, ty)| Param {
                name: pname.to_string(),
                ty,
            })
            .collect(),
        return_type: ret,
        body,
        is_public: true,
    })
}

pub fn private_fn(name: &str, ret: TypeAnn, body: Vec<Stmt>) -> Stmt {
    Stmt::FnDecl(FnDecl {
        name: name.to_string(),
        params: vec![],
        return_type: ret,
        body,
        is_public: false,
    })
}

/// `fn main() -> i32 { ... }`: the program entry point.
pub fn main_fn(body: Vec<Stmt>) -> Stmt {
    pub_fn("main", vec![], TypeAnn::I32, body)
}

pub fn ret(expr: Expr) -> Stmt {
    Stmt::Return(Some(expr))
}

pub fn int(value: i64) -> Expr {
    Expr::Int(value)
}

pub fn ident(name: &str) -> Expr {
    Expr::Ident(name.to_string())
}

pub fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        callee: Box::new(ident(name)),
        args,
    }
}

/// A qualified call: `module::symbol(args)`.
pub fn qualified_call(module: &str, symbol: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        callee: Box::new(qualified(module, symbol)),
        args,
    }
}

/// Compile-time member access: `module::symbol`.
pub fn qualified(module: &str, symbol: &str) -> Expr {
    Expr::Member {
        object: Box::new(ident(module)),
        member: symbol.to_string(),
        is_compiletime: true,
    }
}

/// Chained compile-time access: `module::ty::member`.
pub fn qualified_chain(module: &str, ty: &str, member: &str) -> Expr {
    Expr::Member {
        object: Box::new(qualified(module, ty)),
        member: member.to_string(),
        is_compiletime: true,
    }
}

pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

/// A module exporting `pub fn add(a: i32, b: i32) -> i32`.
pub fn util_module() -> Module {
    Module::new(
        "util",
        vec![pub_fn(
            "add",
            vec![("a", TypeAnn::I32), ("b", TypeAnn::I32)],
            TypeAnn::I32,
            vec![ret(binary(BinaryOp::Add, ident("a"), ident("b")))],
        )],
    )
}

/// A two-module program: `util` exporting `add`, `main` returning
/// `util::add(2, 3)`.
pub fn two_module_program() -> Program {
    Program::new(vec![
        util_module(),
        Module::new(
            "main",
            vec![
                use_mod("util"),
                main_fn(vec![ret(qualified_call(
                    "util",
                    "add",
                    vec![int(2), int(3)],
                ))]),
            ],
        ),
    ])
}
