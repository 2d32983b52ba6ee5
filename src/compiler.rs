// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! The bytecode compiler: a single-pass Pratt parser that emits directly
//! into a [`Chunk`] as it recognizes each construct, with no intermediate
//! AST.
//!
//! Parser state is flat (`current`, `previous`, `had_error`,
//! `panic_mode`); the grammar is driven by a table mapping each token
//! type to its prefix/infix parse functions and binding precedence
//! (`get_rule`), looked up and dispatched from [`Compiler::parse_precedence`].

#[cfg(test)]
mod compiler_test;

use crate::chunk::{Chunk, OpCode};
use crate::object::{self, ObjString};
use crate::scanner::{Scanner, Token, TokenType};
use crate::table::Table;
use crate::value::Value;
use std::rc::Rc;
use tracing::debug;

/// Operator-precedence ladder, lowest to highest. Declaration order is
/// discriminant order, so `Precedence::Term < Precedence::Factor` etc.
/// holds via derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    /// One level higher, used to recurse into the right operand of a
    /// left-associative binary operator (`1+2+3` parses as `(1+2)+3`
    /// because the right side is compiled at `self + 1`, refusing to
    /// itself consume a `+`).
    const fn next(self) -> Self {
        match self {
            Self::None => Self::Assignment,
            Self::Assignment => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Equality,
            Self::Equality => Self::Comparison,
            Self::Comparison => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Unary,
            Self::Unary | Self::Call => Self::Primary,
            Self::Primary => Self::Primary,
        }
    }
}

/// A prefix or infix parse routine. `can_assign` is threaded through so
/// `variable()` can decide whether a trailing `=` starts an assignment
/// (only legal when the surrounding expression is being parsed at
/// `Precedence::Assignment` or looser).
type ParseFn = for<'a> fn(&mut Compiler<'a>, bool);

/// One row of the Pratt table.
struct ParseRule {
    prefix: Option<ParseFn>,
    infix: Option<ParseFn>,
    precedence: Precedence,
}

const fn rule(prefix: Option<ParseFn>, infix: Option<ParseFn>, precedence: Precedence) -> ParseRule {
    ParseRule {
        prefix,
        infix,
        precedence,
    }
}

/// Look up the parse rule for a token type. One row per token, matching
/// the table-per-line clarity the distilled spec asks for.
fn get_rule(kind: TokenType) -> ParseRule {
    match kind {
        TokenType::LeftParen => rule(Some(grouping), None, Precedence::None),
        TokenType::Minus => rule(Some(unary), Some(binary), Precedence::Term),
        TokenType::Plus => rule(None, Some(binary), Precedence::Term),
        TokenType::Slash => rule(None, Some(binary), Precedence::Factor),
        TokenType::Star => rule(None, Some(binary), Precedence::Factor),
        TokenType::Bang => rule(Some(unary), None, Precedence::None),
        TokenType::BangEqual => rule(None, Some(binary), Precedence::Equality),
        TokenType::EqualEqual => rule(None, Some(binary), Precedence::Equality),
        TokenType::Greater | TokenType::GreaterEqual | TokenType::Less | TokenType::LessEqual => {
            rule(None, Some(binary), Precedence::Comparison)
        }
        TokenType::Identifier => rule(Some(variable), None, Precedence::None),
        TokenType::String => rule(Some(string), None, Precedence::None),
        TokenType::Number => rule(Some(number), None, Precedence::None),
        TokenType::False | TokenType::Nil | TokenType::True => rule(Some(literal), None, Precedence::None),
        _ => rule(None, None, Precedence::None),
    }
}

/// Single-pass compiler state.
pub struct Compiler<'a> {
    scanner: Scanner<'a>,
    current: Token<'a>,
    previous: Token<'a>,
    had_error: bool,
    panic_mode: bool,
    chunk: &'a mut Chunk,
    strings: &'a mut Table,
    objects: &'a mut Vec<Rc<ObjString>>,
}

/// Compile `source` into `chunk`, interning string literals and
/// identifiers into `strings`/`objects` along the way.
///
/// Returns `true` on success. On failure the chunk may contain partially
/// emitted bytecode; the caller (the VM's `interpret`) must discard it
/// rather than execute it.
pub fn compile<'a>(
    source: &'a str,
    chunk: &'a mut Chunk,
    strings: &'a mut Table,
    objects: &'a mut Vec<Rc<ObjString>>,
) -> bool {
    let dummy = Token {
        kind: TokenType::Eof,
        lexeme: "",
        line: 0,
    };
    let mut compiler = Compiler {
        scanner: Scanner::new(source),
        current: dummy,
        previous: dummy,
        had_error: false,
        panic_mode: false,
        chunk,
        strings,
        objects,
    };

    compiler.advance();
    while !compiler.match_token(TokenType::Eof) {
        compiler.declaration();
    }
    compiler.emit_return();

    !compiler.had_error
}

impl<'a> Compiler<'a> {
    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenType::Error {
                break;
            }
            self.error_at_current(self.current.lexeme);
        }
    }

    fn consume(&mut self, kind: TokenType, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    fn check(&self, kind: TokenType) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenType) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message);
    }

    fn error(&mut self, message: &str) {
        self.error_at(self.previous, message);
    }

    fn error_at(&mut self, token: Token<'a>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;

        eprint!("[line {}] Error", token.line);
        match token.kind {
            TokenType::Eof => eprint!(" at end"),
            // Scanner-originated errors carry the message as their own
            // lexeme; there's no source location to quote beyond the line.
            TokenType::Error => {
                eprintln!(": {}", token.lexeme);
                return;
            }
            _ => eprint!(" at '{}'", token.lexeme),
        }
        eprintln!(": {message}");
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenType::Eof {
            if self.previous.kind == TokenType::Semicolon {
                return;
            }
            match self.current.kind {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.chunk.write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op as u8);
    }

    fn emit_op_at(&mut self, op: OpCode, line: u32) {
        self.chunk.write(op as u8, line);
    }

    fn emit_bytes(&mut self, op: OpCode, operand: u8) {
        self.emit_op(op);
        self.emit_byte(operand);
    }

    fn emit_return(&mut self) {
        self.emit_op(OpCode::Return);
    }

    fn emit_constant(&mut self, value: Value) {
        match self.chunk.add_constant(value) {
            Some(index) => self.emit_bytes(OpCode::Constant, index),
            None => self.error("Too many constants in one chunk."),
        }
    }

    /// Intern `name`'s lexeme and add it to the constant pool, returning
    /// its index. Used for both global-variable names and (indirectly)
    /// string literals.
    fn identifier_constant(&mut self, name: Token<'a>) -> u8 {
        let interned = object::copy_string(self.strings, self.objects, name.lexeme);
        self.chunk
            .add_constant(Value::string(interned))
            .unwrap_or_else(|| {
                self.error("Too many constants in one chunk.");
                0
            })
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn declaration(&mut self) {
        if self.match_token(TokenType::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.panic_mode {
            self.synchronize();
        }
    }

    fn var_declaration(&mut self) {
        self.consume(TokenType::Identifier, "Expect variable name.");
        let global = self.identifier_constant(self.previous);

        if self.match_token(TokenType::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.");
        self.emit_bytes(OpCode::DefineGlobal, global);
    }

    fn statement(&mut self) {
        if self.match_token(TokenType::Print) {
            self.print_statement();
        } else if self.match_token(TokenType::LeftBrace) {
            self.block();
        } else {
            self.expression_statement();
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    /// No new scope is introduced (see DESIGN.md) — a block just gives
    /// `declaration()` somewhere to recurse syntactically.
    fn block(&mut self) {
        while !self.check(TokenType::RightBrace) && !self.check(TokenType::Eof) {
            self.declaration();
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block.");
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix_rule) = get_rule(self.previous.kind).prefix else {
            self.error("Expect expression.");
            return;
        };
        let can_assign = precedence <= Precedence::Assignment;
        prefix_rule(self, can_assign);

        while precedence <= get_rule(self.current.kind).precedence {
            self.advance();
            let infix_rule = get_rule(self.previous.kind)
                .infix
                .expect("a token reachable here always has an infix rule by construction of get_rule");
            infix_rule(self, can_assign);
        }

        if can_assign && self.match_token(TokenType::Equal) {
            self.error("Invalid assignment target.");
        }
    }
}

fn number(compiler: &mut Compiler<'_>, _can_assign: bool) {
    let value: f64 = compiler
        .previous
        .lexeme
        .parse()
        .expect("the scanner only ever produces syntactically valid number lexemes");
    compiler.emit_constant(Value::number(value));
}

fn string(compiler: &mut Compiler<'_>, _can_assign: bool) {
    let lexeme = compiler.previous.lexeme;
    let content = &lexeme[1..lexeme.len() - 1];
    let interned = object::copy_string(compiler.strings, compiler.objects, content);
    compiler.emit_constant(Value::string(interned));
}

fn literal(compiler: &mut Compiler<'_>, _can_assign: bool) {
    match compiler.previous.kind {
        TokenType::False => compiler.emit_op(OpCode::False),
        TokenType::Nil => compiler.emit_op(OpCode::Nil),
        TokenType::True => compiler.emit_op(OpCode::True),
        other => unreachable!("literal() invoked for non-literal token {other:?}"),
    }
}

fn grouping(compiler: &mut Compiler<'_>, _can_assign: bool) {
    compiler.expression();
    compiler.consume(TokenType::RightParen, "Expect ')' after expression.");
}

fn variable(compiler: &mut Compiler<'_>, can_assign: bool) {
    let name = compiler.previous;
    let arg = compiler.identifier_constant(name);
    if can_assign && compiler.match_token(TokenType::Equal) {
        compiler.expression();
        compiler.emit_bytes(OpCode::SetGlobal, arg);
    } else {
        compiler.emit_bytes(OpCode::GetGlobal, arg);
    }
}

fn unary(compiler: &mut Compiler<'_>, _can_assign: bool) {
    let operator = compiler.previous.kind;
    let line = compiler.previous.line;
    compiler.parse_precedence(Precedence::Unary);
    match operator {
        TokenType::Bang => compiler.emit_op_at(OpCode::Not, line),
        TokenType::Minus => compiler.emit_op_at(OpCode::Negate, line),
        other => unreachable!("unary() invoked for non-unary token {other:?}"),
    }
}

fn binary(compiler: &mut Compiler<'_>, _can_assign: bool) {
    let operator = compiler.previous.kind;
    let line = compiler.previous.line;
    let operand_precedence = get_rule(operator).precedence;
    compiler.parse_precedence(operand_precedence.next());

    match operator {
        TokenType::Plus => compiler.emit_op_at(OpCode::Add, line),
        TokenType::Minus => compiler.emit_op_at(OpCode::Subtract, line),
        TokenType::Star => compiler.emit_op_at(OpCode::Multiply, line),
        TokenType::Slash => compiler.emit_op_at(OpCode::Divide, line),
        TokenType::EqualEqual => compiler.emit_op_at(OpCode::Equal, line),
        TokenType::BangEqual => {
            compiler.emit_op_at(OpCode::Equal, line);
            compiler.emit_op_at(OpCode::Not, line);
        }
        TokenType::Greater => compiler.emit_op_at(OpCode::Greater, line),
        TokenType::GreaterEqual => {
            compiler.emit_op_at(OpCode::Less, line);
            compiler.emit_op_at(OpCode::Not, line);
        }
        TokenType::Less => compiler.emit_op_at(OpCode::Less, line),
        TokenType::LessEqual => {
            compiler.emit_op_at(OpCode::Greater, line);
            compiler.emit_op_at(OpCode::Not, line);
        }
        other => unreachable!("binary() invoked for non-binary token {other:?}"),
    }
    debug!(?operator, "compiled binary operator");
}
