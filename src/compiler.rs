//! Single-pass code generator: AST -> bytecode image.

use crate::ast::{BaseType, BinOp, Expr, Program, Stmt, TypeDesc};
use crate::bytecode::{Emitter, Reg64, Reg8, MAX_STRING_LITERALS, STATIC_DATA_BASE, SYSNUM_EXIT, SYSNUM_WRITE_OUT};
use crate::error::CompileError;
use crate::symtab::{FunctionInfo, RelocKind, RelocationTable, Symbol, SymbolTable};
use log::debug;

fn void_ty() -> TypeDesc {
    TypeDesc { base: BaseType::Void, pointer_depth: 0 }
}

pub struct CompileOutput {
    pub image: Vec<u8>,
    pub errors: Vec<CompileError>,
    pub has_errors: bool,
}

pub struct Compiler {
    emitter: Emitter,
    symtab: SymbolTable,
    relocations: RelocationTable,
    strings: Vec<String>,
    stack_loc: u64,
    current_return_type: Option<TypeDesc>,
    errors: Vec<CompileError>,
    has_errors: bool,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            emitter: Emitter::new(),
            symtab: SymbolTable::new(),
            relocations: RelocationTable::new(),
            strings: Vec::new(),
            stack_loc: 0,
            current_return_type: None,
            errors: Vec::new(),
            has_errors: false,
        }
    }

    fn error(&mut self, err: CompileError) {
        self.has_errors = true;
        self.errors.push(err);
    }

    fn resolve_var(&self, expr: &Expr) -> Option<Symbol> {
        match expr {
            Expr::Ident(name) => self.symtab.resolve(name).cloned(),
            _ => None,
        }
    }

    fn intern_string(&mut self, s: &str) -> Result<u64, CompileError> {
        if let Some(idx) = self.strings.iter().position(|existing| existing == s) {
            let offset: usize = self.strings[..idx].iter().map(|p| p.len() + 1).sum();
            return Ok(STATIC_DATA_BASE + offset as u64);
        }
        if self.strings.len() >= MAX_STRING_LITERALS {
            return Err(CompileError::StringTableFull { max: MAX_STRING_LITERALS });
        }
        let offset: usize = self.strings.iter().map(|p| p.len() + 1).sum();
        self.strings.push(s.to_string());
        Ok(STATIC_DATA_BASE + offset as u64)
    }

    // --- expressions -----------------------------------------------------

    fn gen_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::NumberLit(n) => self.emitter.load_qword(Reg64::A, *n as u64),
            Expr::CharLit(c) => self.emitter.load_qword(Reg64::A, *c as u64),
            Expr::StringLit(s) => match self.intern_string(s) {
                Ok(addr) => self.emitter.load_qword(Reg64::A, addr),
                Err(e) => self.error(e),
            },
            Expr::Ident(name) => match self.symtab.resolve(name).cloned() {
                None => self.error(CompileError::UndefinedIdentifier(name.clone())),
                Some(Symbol::Function(info)) => self.emitter.load_qword(Reg64::A, info.label),
                Some(Symbol::Local { offset, .. }) => {
                    self.emitter.stack_read_qword(self.stack_loc - offset, Reg64::A)
                }
            },
            Expr::Call(callee, args) => self.gen_call(callee, args),
            Expr::Assign(target, value) => self.gen_assign(target, value),
            Expr::AddressOf(inner) => self.gen_address_of(inner),
            Expr::Deref(inner) => {
                self.gen_expr(inner);
                self.emitter.deref_qword(Reg64::A, Reg64::A);
            }
            Expr::Inc(inner) => self.gen_inc(inner),
            Expr::BinaryOp(BinOp::Add, a, b) => {
                self.gen_expr(a);
                self.emitter.push_qword(Reg64::A);
                self.stack_loc += 8;

                self.gen_expr(b);

                self.emitter.pop_qword(Reg64::B);
                self.stack_loc -= 8;

                self.emitter.add_qword(Reg64::A, Reg64::B, Reg64::A);
            }
            Expr::BinaryOp(BinOp::LessThan, a, b) => {
                self.gen_expr(a);
                self.emitter.push_qword(Reg64::A);
                self.stack_loc += 8;

                self.gen_expr(b);

                self.emitter.pop_qword(Reg64::B);
                self.stack_loc -= 8;

                // The left operand was pushed first and the right operand was
                // evaluated directly into A without popping the left back out,
                // so at this point A holds the right operand and B the left.
                self.emitter.compare_qword(Reg64::A, Reg64::B);
                self.emitter.load_qword(Reg64::A, 0);
                self.emitter.map_greater_byte(Reg8::A);
            }
        }
    }

    fn gen_call(&mut self, callee: &Expr, args: &[Expr]) {
        for arg in args.iter().rev() {
            self.gen_expr(arg);
            self.emitter.push_qword(Reg64::A);
        }

        match callee {
            // Resolved through a relocation rather than `info.label` directly:
            // a predeclared forward reference still carries the placeholder
            // label 0 at this point, and only gets its real address once
            // `gen_func` walks the definition later in the source.
            Expr::Ident(name) if self.symtab.resolve_function(name).is_some() => {
                let call_site = self.emitter.call_placeholder();
                self.relocations.add(RelocKind::Call, call_site, name);
            }
            _ => {
                self.error(CompileError::NonLvalueCall);
                self.gen_expr(callee);
                let site = self.emitter.pos() as u64;
                self.emitter.move_dynamic(Reg64::A, site + 11);
                self.emitter.call_placeholder();
            }
        }
    }

    fn gen_assign(&mut self, target: &Expr, value: &Expr) {
        let Expr::Ident(name) = target else {
            // Assigning to a non-identifier target silently produces no
            // instructions, matching the original's lvalue handling.
            return;
        };

        match self.symtab.resolve(name).cloned() {
            Some(Symbol::Local { offset, .. }) => {
                self.gen_expr(value);
                self.emitter.stack_write_qword(self.stack_loc - offset, Reg64::A);
            }
            _ => self.error(CompileError::AssignToUndeclared(name.clone())),
        }
    }

    fn gen_address_of(&mut self, inner: &Expr) {
        match self.resolve_var(inner) {
            Some(Symbol::Local { offset, .. }) => {
                self.emitter.stack_pointer_from_offset(self.stack_loc - offset, Reg64::A);
            }
            _ => self.error(CompileError::NonLvalueAddressOf),
        }
    }

    fn gen_inc(&mut self, inner: &Expr) {
        match self.resolve_var(inner) {
            Some(Symbol::Local { offset, .. }) => {
                let slot = self.stack_loc - offset;
                self.emitter.stack_read_qword(slot, Reg64::A);
                self.emitter.inc_qword(Reg64::A);
                self.emitter.stack_write_qword(slot, Reg64::A);
            }
            _ => match inner {
                Expr::Deref(ptr) => {
                    self.gen_expr(ptr);
                    let site = self.emitter.pos() as u64;
                    self.emitter.move_dynamic(Reg64::A, site + 11);
                    self.emitter.inc_qword_self_patched();
                }
                _ => self.error(CompileError::NonLvalueIncrement),
            },
        }
    }

    // --- statements --------------------------------------------------------

    fn gen_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => self.gen_expr(e),
            Stmt::Func { name, return_type, params, body } => {
                self.gen_func(name, *return_type, params, body)
            }
            Stmt::Return(value) => self.gen_return(value),
            Stmt::VarDecl { name, ty, init } => self.gen_vardecl(name, *ty, init.as_ref()),
            Stmt::While { cond, body } => self.gen_while(cond, body),
        }
    }

    fn gen_func(&mut self, name: &str, return_type: TypeDesc, params: &[(String, TypeDesc)], body: &[Stmt]) {
        let label = self.emitter.pos() as u64;
        self.symtab.declare_function(
            name,
            FunctionInfo { label, params: params.to_vec(), return_type },
        );

        // Each function starts a fresh stack frame: locals from one function
        // must not contribute to another function's offsets.
        let saved_cursor = self.stack_loc;
        self.stack_loc = 0;
        self.symtab.push_scope();

        for (pname, pty) in params {
            self.symtab.declare_local(pname, *pty, self.stack_loc);
            self.stack_loc += 8;
        }

        let saved_return_type = self.current_return_type.replace(return_type);
        for s in body {
            self.gen_stmt(s);
        }
        self.current_return_type = saved_return_type;

        for _ in params {
            self.emitter.pop_qword(Reg64::A);
            self.stack_loc -= 8;
        }
        self.emitter.ret();

        self.symtab.pop_scope();
        self.stack_loc = saved_cursor;
    }

    fn gen_return(&mut self, value: &Option<Expr>) {
        match self.current_return_type {
            None => self.error(CompileError::ReturnOutsideFunction),
            Some(rt) if value.is_some() && rt.is_void_value() => {
                self.error(CompileError::VoidReturnValue)
            }
            _ => {}
        }

        if let Some(expr) = value {
            self.gen_expr(expr);
        }
        self.emitter.ret();
    }

    fn gen_vardecl(&mut self, name: &str, ty: TypeDesc, init: &Option<Expr>) {
        self.symtab.declare_local(name, ty, self.stack_loc);

        match init {
            Some(expr) => self.gen_expr(expr),
            None => self.emitter.load_qword(Reg64::A, 0),
        }
        self.emitter.push_qword(Reg64::A);
        self.stack_loc += 8;
    }

    fn gen_while(&mut self, cond: &Expr, body: &[Stmt]) {
        let start = self.emitter.pos() as u64;
        self.gen_expr(cond);
        self.emitter.set_flags_byte(Reg64::A);
        let exit_ph = self.emitter.jump_if_zero_placeholder();

        for s in body {
            self.gen_stmt(s);
        }

        self.emitter.jump(start);
        let end = self.emitter.pos() as u64;
        self.emitter.patch_address(exit_ph, end);
    }

    // --- prelude / built-in library ------------------------------------------

    fn emit_prelude(&mut self) -> usize {
        self.emitter.build_header();

        let main_call_site = self.emitter.call_placeholder();
        self.relocations.add(RelocKind::Call, main_call_site, "main");

        // main's return value sits in A; hand it to the exit syscall as its
        // argument register rather than patching it in as an immediate.
        self.emitter.move_qword(Reg64::A, Reg64::SyscallArg1);
        self.emitter.syscall(SYSNUM_EXIT);

        main_call_site
    }

    /// Registers every top-level function's name, params, and return type
    /// before any code is generated, so a call appearing earlier in the
    /// source than its callee's definition still resolves to a function
    /// symbol (and gets a relocation) instead of reporting `NonLvalueCall`.
    /// The label is a placeholder (0) until `gen_func` walks the real
    /// definition and overwrites it with the emitted address.
    fn predeclare_functions(&mut self, program: &Program) {
        for stmt in program {
            if let Stmt::Func { name, return_type, params, .. } = stmt {
                self.symtab.declare_function(
                    name,
                    FunctionInfo { label: 0, params: params.clone(), return_type: *return_type },
                );
            }
        }
    }

    fn declare_builtin(&mut self, name: &str) {
        let label = self.emitter.pos() as u64;
        self.symtab.declare_function(name, FunctionInfo { label, params: vec![], return_type: void_ty() });
    }

    fn emit_write(&mut self) {
        self.declare_builtin("write");
        self.emitter.pop_qword(Reg64::SyscallArg1);
        self.emitter.pop_qword(Reg64::SyscallArg2);
        self.emitter.syscall(SYSNUM_WRITE_OUT);
        self.emitter.ret();
    }

    fn emit_inc(&mut self) {
        self.declare_builtin("inc");
        self.emitter.pop_qword(Reg64::A);
        self.emitter.load_qword(Reg64::B, 1);
        self.emitter.add_qword(Reg64::A, Reg64::B, Reg64::A);
        self.emitter.ret();
    }

    fn emit_strlen(&mut self) {
        self.declare_builtin("strlen");
        self.emitter.pop_qword(Reg64::A);
        self.emitter.move_qword(Reg64::A, Reg64::B);

        let loop_start = self.emitter.pos() as u64;
        self.emitter.deref_byte(Reg64::A, Reg8::A);
        self.emitter.set_flags_from_byte(Reg8::A);
        let exit_ph = self.emitter.jump_if_zero_placeholder();
        self.emitter.inc_qword(Reg64::A);
        self.emitter.jump(loop_start);

        let exit_pos = self.emitter.pos() as u64;
        self.emitter.patch_address(exit_ph, exit_pos);

        self.emitter.sub_qword(Reg64::A, Reg64::B, Reg64::A);
        self.emitter.ret();
    }

    fn emit_printf(&mut self) {
        self.declare_builtin("printf");
        self.emitter.pop_qword(Reg64::D); // format pointer

        self.emitter.load_byte(Reg8::B, b'%');

        let loop_start = self.emitter.pos() as u64;
        self.emitter.deref_byte(Reg64::D, Reg8::A);
        self.emitter.set_flags_from_byte(Reg8::A);
        let exit_ph = self.emitter.jump_if_zero_placeholder();

        self.emitter.compare_byte(Reg8::A, Reg8::B);
        let subst_ph = self.emitter.jump_if_equal_placeholder();

        // not '%': write the byte at [D] as-is
        self.emitter.move_qword(Reg64::D, Reg64::SyscallArg1);
        self.emitter.load_qword(Reg64::SyscallArg2, 1);
        self.emitter.syscall(SYSNUM_WRITE_OUT);
        let after_write_ph = self.emitter.jump_placeholder();

        let subst_pos = self.emitter.pos() as u64;
        self.emitter.patch_address(subst_ph, subst_pos);

        // '%': write a literal '_' from a scratch stack slot
        self.emitter.load_qword(Reg64::C, b'_' as u64);
        self.emitter.push_qword(Reg64::C);
        self.emitter.stack_pointer_from_offset(0, Reg64::SyscallArg1);
        self.emitter.load_qword(Reg64::SyscallArg2, 1);
        self.emitter.syscall(SYSNUM_WRITE_OUT);
        self.emitter.pop_qword(Reg64::C);

        let after_write_pos = self.emitter.pos() as u64;
        self.emitter.patch_address(after_write_ph, after_write_pos);

        self.emitter.inc_qword(Reg64::D);
        self.emitter.jump(loop_start);

        let exit_pos = self.emitter.pos() as u64;
        self.emitter.patch_address(exit_ph, exit_pos);
        self.emitter.ret();
    }

    fn emit_puts(&mut self) {
        self.declare_builtin("puts");
        self.emitter.stack_read_qword(8, Reg64::A);
        self.emitter.push_qword(Reg64::A);

        let strlen_label = self.symtab.resolve_function("strlen").expect("strlen declared before puts").label;
        self.emitter.call(strlen_label);
        self.emitter.push_qword(Reg64::A);

        self.emitter.stack_read_qword(16, Reg64::A);
        self.emitter.push_qword(Reg64::A);

        let write_label = self.symtab.resolve_function("write").expect("write declared before puts").label;
        self.emitter.call(write_label);

        self.emitter.pop_qword(Reg64::A); // discard the caller's argument slot
        self.emitter.ret();
    }

    fn emit_putchar(&mut self) {
        self.declare_builtin("putchar");
        self.emitter.stack_pointer_from_offset(8, Reg64::SyscallArg1);
        self.emitter.load_qword(Reg64::SyscallArg2, 1);
        self.emitter.syscall(SYSNUM_WRITE_OUT);
        self.emitter.pop_qword(Reg64::A);
        self.emitter.ret();
    }

    fn emit_dumpstate(&mut self) {
        self.declare_builtin("dumpstate");
        self.emitter.dump_state();
        self.emitter.ret();
    }

    fn emit_string_data(&mut self) {
        if self.emitter.pos() as u64 > STATIC_DATA_BASE {
            debug!(
                "code length {} reached the static data base address {}",
                self.emitter.pos(),
                STATIC_DATA_BASE
            );
        }
    }

    pub fn compile(mut self, program: &Program) -> CompileOutput {
        let main_call_site = self.emit_prelude();
        self.emit_write();
        self.emit_inc();
        self.emit_strlen();
        self.emit_printf();
        self.emit_puts();
        self.emit_putchar();
        self.emit_dumpstate();

        self.predeclare_functions(program);

        for stmt in program {
            self.gen_stmt(stmt);
        }

        self.emit_string_data();

        match self.symtab.resolve_function("main").cloned() {
            Some(info) => self.emitter.patch_address(main_call_site, info.label),
            None => self.error(CompileError::MissingMain),
        }

        let pending: Vec<(usize, String)> = self
            .relocations
            .entries()
            .iter()
            .filter(|r| r.kind == RelocKind::Call && r.target != "main")
            .map(|r| (r.site_offset, r.target.clone()))
            .collect();

        for (site_offset, target) in pending {
            match self.symtab.resolve_function(&target).cloned() {
                Some(info) => self.emitter.patch_address(site_offset, info.label),
                None => self.error(CompileError::UndefinedIdentifier(target)),
            }
        }

        let mut image = self.emitter.into_buffer();
        for s in &self.strings {
            for b in s.bytes() {
                image.put_byte(b);
            }
            image.put_byte(0);
        }

        CompileOutput { image: image.as_slice().to_vec(), errors: self.errors, has_errors: self.has_errors }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
