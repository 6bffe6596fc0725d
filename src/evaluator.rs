//! Tree-walking evaluator (`spec.md` §4.3): two-pass program execution,
//! statement/expression evaluation, member resolution, method dispatch,
//! class instantiation, and native interop glue.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::*;
use crate::environment::Environment;
use crate::error::{Flow, RuntimeError, RuntimeErrorKind};
use crate::heap::{Heap, HeapData, HeapId, ObjectData};
use crate::interop::{unwrap, wrap, NativeMember};
use crate::value::{NativeFn, NativeFunction, ScriptFunction, ThisBinding, Value};

type EResult<T> = Result<T, RuntimeError>;

/// Active call context: the current (possibly block-nested) lexical scope
/// plus the receiver a method body is running against, if any. Threaded
/// explicitly through statement/expression evaluation rather than kept as
/// evaluator-wide mutable state, so nested calls each get their own context.
struct Frame {
    env: Environment,
    this_binding: Option<ThisBinding>,
}

impl Frame {
    fn global(globals: &Environment) -> Self {
        Self {
            env: globals.clone(),
            this_binding: None,
        }
    }
}

/// Owns the heap, the global environment, and the class/enum tables built up
/// by [`Evaluator::execute_program`]. One `Evaluator` backs one `Engine`
/// (`spec.md` §5: "one Engine owns one global environment and heap").
pub struct Evaluator {
    pub globals: Environment,
    pub heap: Heap,
    classes: HashMap<String, Rc<ClassDecl>>,
    max_call_depth: u32,
    call_depth: u32,
}

impl Evaluator {
    pub fn new(max_call_depth: u32) -> Self {
        Self {
            globals: Environment::new_global(),
            heap: Heap::new(),
            classes: HashMap::new(),
            max_call_depth,
            call_depth: 0,
        }
    }

    /// Two-pass execution of a program's top-level declarations
    /// (`spec.md` §4.3 "Program execution").
    pub fn execute_program(&mut self, program: &Program) -> EResult<()> {
        for decl in &program.decls {
            match decl {
                TopLevelDecl::Class(c) => self.register_class(c),
                TopLevelDecl::Func(f) => self.register_function(f),
                TopLevelDecl::Enum(e) => self.register_enum(e)?,
                TopLevelDecl::Var(_) => {}
            }
        }
        for decl in &program.decls {
            if let TopLevelDecl::Var(v) = decl {
                let mut frame = Frame::global(&self.globals);
                let value = self.eval_var_initial_value(v, &mut frame)?;
                self.globals.define(v.name.clone(), value);
            }
        }
        Ok(())
    }

    /// Looks up a global function and invokes it (`Engine::call`).
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> EResult<Value> {
        let callee = self
            .globals
            .get(name)
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::UndefinedIdentifier(name.to_string()), None))?;
        self.invoke(callee, args, None)
    }

    fn register_class(&mut self, decl: &ClassDecl) {
        self.classes.insert(decl.name.clone(), Rc::new(decl.clone()));
        // Construction is exclusively through `new Name(args)` (`spec.md` §6's
        // script surface names no bare-call construction form); a same-named
        // global callable would need to run arbitrary script body from inside
        // a `NativeFn`, which only gets `&mut Heap`, not the evaluator, so it
        // is not registered here.
    }

    fn register_function(&mut self, decl: &FuncDecl) {
        let func = ScriptFunction {
            name: Rc::from(decl.name.as_str()),
            decl: Rc::new(decl.clone()),
            this_val: None,
        };
        self.globals.define(decl.name.clone(), Value::Function(func));
    }

    /// Registers `EnumName::Member` as `Int` globals (§4.3 "Enum member
    /// resolution" [ADDED]): explicit initializers are evaluated in the
    /// global scope; otherwise each member is one more than the previous
    /// (first member defaults to `0`).
    fn register_enum(&mut self, decl: &EnumDecl) -> EResult<()> {
        let mut next = 0i32;
        let mut frame = Frame::global(&self.globals);
        for member in &decl.values {
            let value = match &member.value {
                Some(expr) => Value::truncate_to_int(self.eval_expr(expr, &mut frame)?.as_numeric().unwrap_or(0.0)),
                None => next,
            };
            self.globals.define(format!("{}::{}", decl.name, member.name), Value::Int(value));
            next = value.wrapping_add(1);
        }
        Ok(())
    }

    // ---- variable initialization (`spec.md` §4.3 "Variable initialization") ----

    fn eval_var_initial_value(&mut self, var: &VarDecl, frame: &mut Frame) -> EResult<Value> {
        if let Some(init) = &var.initializer {
            return self.eval_expr(init, frame);
        }
        if let Some(size_expr) = &var.array_size_init {
            let n = self.eval_expr(size_expr, frame)?.as_numeric().unwrap_or(0.0);
            let n = (n.max(0.0)) as usize;
            let elem_type = var.type_ref.template_arg.as_deref();
            let default_elem = match elem_type {
                Some(t) => self.default_value(t)?,
                None => Value::Int(0),
            };
            return Ok(Value::array(vec![default_elem; n]));
        }
        self.default_value(&var.type_ref)
    }

    /// Default value for a declared type with no initializer (`spec.md`
    /// §4.3): bare array → empty array; handle-typed → null handle; known
    /// non-handle class → implicit default construction; else the
    /// primitive zero value, or null handle for an unknown type.
    fn default_value(&mut self, type_ref: &TypeRef) -> EResult<Value> {
        if type_ref.is_array() {
            return Ok(Value::array(Vec::new()));
        }
        if type_ref.is_handle {
            return Ok(Value::Handle(None));
        }
        if self.classes.contains_key(&type_ref.name) {
            return self.instantiate_class(&type_ref.name, Vec::new(), None);
        }
        Ok(match type_ref.name.as_str() {
            "int" | "uint" | "int8" | "int16" | "int32" | "int64" | "uint8" | "uint16" | "uint32" | "uint64" => Value::Int(0),
            "float" | "double" => Value::Float(0.0),
            "bool" => Value::Bool(false),
            "string" => Value::String(Rc::from("")),
            "void" => Value::Void,
            _ => Value::Handle(None),
        })
    }

    // ---- identifier resolution (§4.3 [ADDED] "Field resolution inside methods") ----

    fn resolve_identifier(&self, name: &str, frame: &Frame) -> Option<Value> {
        if let Some(v) = frame.env.get_before(name, &self.globals) {
            return Some(v);
        }
        if let Some(ThisBinding::Object(id)) = frame.this_binding {
            if let Some(v) = self.heap.object(id).and_then(|o| o.fields.get(name)) {
                return Some(v.clone());
            }
        }
        self.globals.get(name)
    }

    fn assign_identifier(&mut self, name: &str, value: Value, frame: &Frame) {
        if frame.env.has_before(name, &self.globals) {
            frame.env.set_before(name, value, &self.globals);
            return;
        }
        if let Some(ThisBinding::Object(id)) = frame.this_binding {
            if let Some(obj) = self.heap.object_mut(id) {
                if obj.fields.contains_key(name) {
                    obj.fields.insert(name.to_string(), value);
                    return;
                }
            }
        }
        self.globals.set(name, value);
    }

    // ---- statements (`spec.md` §4.3 "Statements") ----

    fn exec_block(&mut self, block: &Block, frame: &mut Frame) -> EResult<Flow> {
        let saved = frame.env.clone();
        frame.env = frame.env.child();
        let result = self.exec_stmts(&block.stmts, frame);
        frame.env = saved;
        result
    }

    fn exec_stmts(&mut self, stmts: &[Stmt], frame: &mut Frame) -> EResult<Flow> {
        for stmt in stmts {
            match self.exec_stmt(stmt, frame)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, frame: &mut Frame) -> EResult<Flow> {
        match stmt {
            Stmt::Block(block) => self.exec_block(block, frame),
            Stmt::Var(var) => {
                let value = self.eval_var_initial_value(var, frame)?;
                frame.env.define(var.name.clone(), value);
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval_expr(expr, frame)?;
                Ok(Flow::Normal)
            }
            Stmt::If { cond, then_branch, else_branch } => {
                if self.eval_expr(cond, frame)?.is_truthy() {
                    self.exec_stmt(then_branch, frame)
                } else if let Some(else_branch) = else_branch {
                    self.exec_stmt(else_branch, frame)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::For { init, cond, update, body } => self.exec_for(init, cond, update, body, frame),
            Stmt::While { cond, body } => self.exec_while(cond, body, frame),
            Stmt::DoWhile { body, cond } => self.exec_do_while(body, cond, frame),
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, frame)?,
                    None => Value::Void,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Switch { discriminant, cases } => self.exec_switch(discriminant, cases, frame),
        }
    }

    fn exec_for(&mut self, init: &Option<Box<Stmt>>, cond: &Option<Expr>, update: &Option<Expr>, body: &Stmt, frame: &mut Frame) -> EResult<Flow> {
        let saved = frame.env.clone();
        frame.env = frame.env.child();
        let result = self.exec_for_body(init, cond, update, body, frame);
        frame.env = saved;
        result
    }

    fn exec_for_body(&mut self, init: &Option<Box<Stmt>>, cond: &Option<Expr>, update: &Option<Expr>, body: &Stmt, frame: &mut Frame) -> EResult<Flow> {
        if let Some(init) = init {
            self.exec_stmt(init, frame)?;
        }
        loop {
            let keep_going = match cond {
                Some(cond) => self.eval_expr(cond, frame)?.is_truthy(),
                None => true,
            };
            if !keep_going {
                break;
            }
            match self.exec_stmt(body, frame)? {
                Flow::Break => break,
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Continue | Flow::Normal => {}
            }
            if let Some(update) = update {
                self.eval_expr(update, frame)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_while(&mut self, cond: &Expr, body: &Stmt, frame: &mut Frame) -> EResult<Flow> {
        loop {
            if !self.eval_expr(cond, frame)?.is_truthy() {
                break;
            }
            match self.exec_stmt(body, frame)? {
                Flow::Break => break,
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Continue | Flow::Normal => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_do_while(&mut self, body: &Stmt, cond: &Expr, frame: &mut Frame) -> EResult<Flow> {
        loop {
            match self.exec_stmt(body, frame)? {
                Flow::Break => break,
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Continue | Flow::Normal => {}
            }
            if !self.eval_expr(cond, frame)?.is_truthy() {
                break;
            }
        }
        Ok(Flow::Normal)
    }

    /// C-style fall-through (`spec.md` §4.3 "Switch"): once a case matches,
    /// every subsequent case body runs until a `Break` signal or the switch
    /// ends.
    fn exec_switch(&mut self, discriminant: &Expr, cases: &[SwitchCase], frame: &mut Frame) -> EResult<Flow> {
        let disc = self.eval_expr(discriminant, frame)?;
        let mut matched = false;
        for case in cases {
            if !matched {
                matched = match &case.value {
                    Some(value_expr) => self.eval_expr(value_expr, frame)?.equals(&disc),
                    None => true,
                };
            }
            if matched {
                match self.exec_stmts(&case.body, frame)? {
                    Flow::Break => return Ok(Flow::Normal),
                    Flow::Normal => {}
                    other => return Ok(other),
                }
            }
        }
        Ok(Flow::Normal)
    }

    // ---- expressions (`spec.md` §4.3 "Expressions") ----

    fn eval_expr(&mut self, expr: &Expr, frame: &mut Frame) -> EResult<Value> {
        match expr {
            Expr::Int(n) => Ok(Value::Int(*n as i32)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::String(Rc::from(s.as_str()))),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Identifier(name) => self
                .resolve_identifier(name, frame)
                .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::UndefinedIdentifier(name.clone()), None)),
            Expr::Assign { target, op, value, line } => self.eval_assign(target, *op, value, *line, frame),
            Expr::HandleAssign { target, value, .. } => self.eval_handle_assign(target, value, frame),
            Expr::Binary { op, left, right, line } => self.eval_binary(*op, left, right, *line, frame),
            Expr::Unary { op, operand, .. } => self.eval_unary(*op, operand, frame),
            Expr::IncDec { target, increment, prefix, .. } => self.eval_incdec(target, *increment, *prefix, frame),
            Expr::Call { callee, args, line } => self.eval_call(callee, args, *line, frame),
            Expr::Member { object, member, line } => self.eval_member(object, member, *line, frame),
            Expr::Index { object, index, line } => self.eval_index(object, index, *line, frame),
            Expr::New { class_name, args, line } => {
                let values = self.eval_args(args, frame)?;
                self.instantiate_class(class_name, values, Some(*line))
            }
            Expr::Cast { target_type, expr, .. } => {
                let value = self.eval_expr(expr, frame)?;
                Ok(self.cast_value(&target_type.name, &value))
            }
            Expr::Ternary { cond, then_expr, else_expr } => {
                if self.eval_expr(cond, frame)?.is_truthy() {
                    self.eval_expr(then_expr, frame)
                } else {
                    self.eval_expr(else_expr, frame)
                }
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr], frame: &mut Frame) -> EResult<Vec<Value>> {
        args.iter().map(|a| self.eval_expr(a, frame)).collect()
    }

    fn eval_assign(&mut self, target: &Expr, op: AssignOp, value_expr: &Expr, line: u32, frame: &mut Frame) -> EResult<Value> {
        let rhs = self.eval_expr(value_expr, frame)?;
        let new_value = if op == AssignOp::Assign {
            rhs
        } else {
            let current = self.eval_lvalue_for_compound(target, frame)?;
            self.apply_binary(compound_to_binop(op), &current, &rhs, line)?
        };
        self.assign_to_target(target, new_value.clone(), frame)?;
        Ok(new_value)
    }

    /// Reads a compound-assignment target's current value. A bare
    /// identifier that was never defined reads as `Int(0)` (`spec.md` §4.3:
    /// "Missing lvalues ... read as Int(0) to allow first-use patterns");
    /// member/index targets use their normal (error-on-absent) read path.
    fn eval_lvalue_for_compound(&mut self, target: &Expr, frame: &mut Frame) -> EResult<Value> {
        match target {
            Expr::Identifier(name) => Ok(self.resolve_identifier(name, frame).unwrap_or(Value::Int(0))),
            other => self.eval_expr(other, frame),
        }
    }

    fn assign_to_target(&mut self, target: &Expr, value: Value, frame: &mut Frame) -> EResult<()> {
        match target {
            Expr::Identifier(name) => {
                self.assign_identifier(name, value, frame);
                Ok(())
            }
            Expr::Member { object, member, line } => {
                let obj_val = self.eval_expr(object, frame)?;
                self.set_member(&obj_val, member, value, Some(*line))
            }
            Expr::Index { object, index, line } => {
                let obj_val = self.eval_expr(object, frame)?;
                let idx_val = self.eval_expr(index, frame)?;
                self.set_index(&obj_val, &idx_val, value, Some(*line))
            }
            _ => Err(RuntimeError::new(RuntimeErrorKind::InvalidAssignmentTarget, Some(line_of(target)))),
        }
    }

    fn eval_handle_assign(&mut self, target: &Expr, value_expr: &Expr, frame: &mut Frame) -> EResult<Value> {
        let rhs = self.eval_expr(value_expr, frame)?;
        let handle = coerce_to_handle(rhs);
        self.assign_to_target(target, handle.clone(), frame)?;
        Ok(handle)
    }

    fn eval_binary(&mut self, op: BinOp, left_expr: &Expr, right_expr: &Expr, line: u32, frame: &mut Frame) -> EResult<Value> {
        match op {
            BinOp::And => {
                let left = self.eval_expr(left_expr, frame)?;
                if !left.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval_expr(right_expr, frame)?.is_truthy()))
            }
            BinOp::Or => {
                let left = self.eval_expr(left_expr, frame)?;
                if left.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval_expr(right_expr, frame)?.is_truthy()))
            }
            _ => {
                let left = self.eval_expr(left_expr, frame)?;
                let right = self.eval_expr(right_expr, frame)?;
                self.apply_binary(op, &left, &right, line)
            }
        }
    }

    fn apply_binary(&self, op: BinOp, left: &Value, right: &Value, line: u32) -> EResult<Value> {
        match op {
            BinOp::Add if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) => Ok(Value::String(Rc::from(
                format!("{}{}", left.stringify(&self.heap), right.stringify(&self.heap)).as_str(),
            ))),
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => Ok(self.numeric_binary(op, left, right)),
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => Ok(bitwise_binary(op, left, right)),
            BinOp::Eq => Ok(Value::Bool(left.equals(right))),
            BinOp::NotEq => Ok(Value::Bool(!left.equals(right))),
            BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => match (left.as_numeric(), right.as_numeric()) {
                (Some(l), Some(r)) => Ok(Value::Bool(match op {
                    BinOp::Lt => l < r,
                    BinOp::Gt => l > r,
                    BinOp::LtEq => l <= r,
                    BinOp::GtEq => l >= r,
                    _ => unreachable!(),
                })),
                _ => Err(RuntimeError::new(RuntimeErrorKind::UnknownOperator(binop_symbol(op).to_string()), Some(line))),
            },
            BinOp::And | BinOp::Or => unreachable!("short-circuit ops are handled in eval_binary"),
        }
    }

    /// Follows the left operand's kind for the result (`spec.md` §4.3):
    /// `Float` if the left operand is a `Float`, `Int` (32-bit truncated)
    /// otherwise. Division/modulo by zero yields zero rather than trapping.
    fn numeric_binary(&self, op: BinOp, left: &Value, right: &Value) -> Value {
        let l = left.as_numeric().unwrap_or(0.0);
        let r = right.as_numeric().unwrap_or(0.0);
        let result = match op {
            BinOp::Add => l + r,
            BinOp::Sub => l - r,
            BinOp::Mul => l * r,
            BinOp::Div => {
                if r == 0.0 {
                    0.0
                } else {
                    l / r
                }
            }
            BinOp::Mod => {
                if r == 0.0 {
                    0.0
                } else {
                    l % r
                }
            }
            _ => unreachable!(),
        };
        if matches!(left, Value::Float(_)) {
            Value::Float(result)
        } else {
            Value::Int(Value::truncate_to_int(result))
        }
    }

    fn eval_unary(&mut self, op: UnOp, operand_expr: &Expr, frame: &mut Frame) -> EResult<Value> {
        let value = self.eval_expr(operand_expr, frame)?;
        Ok(match op {
            UnOp::HandleOf => coerce_to_handle(value),
            UnOp::Neg => match value {
                Value::Float(f) => Value::Float(-f),
                other => Value::Int(Value::truncate_to_int(-other.as_numeric().unwrap_or(0.0))),
            },
            UnOp::Not => Value::Bool(!value.is_truthy()),
            UnOp::BitNot => Value::Int(!Value::truncate_to_int(value.as_numeric().unwrap_or(0.0))),
        })
    }

    /// Prefix returns the updated value; postfix returns the value read
    /// before the update (`spec.md` §4.3).
    fn eval_incdec(&mut self, target: &Expr, increment: bool, prefix: bool, frame: &mut Frame) -> EResult<Value> {
        let current = self.eval_lvalue_for_compound(target, frame)?;
        let delta = if increment { 1.0 } else { -1.0 };
        let updated = match current {
            Value::Float(f) => Value::Float(f + delta),
            ref other => Value::Int(Value::truncate_to_int(other.as_numeric().unwrap_or(0.0) + delta)),
        };
        self.assign_to_target(target, updated.clone(), frame)?;
        Ok(if prefix { updated } else { current })
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], line: u32, frame: &mut Frame) -> EResult<Value> {
        let callee_val = self.eval_expr(callee, frame)?;
        let arg_vals = self.eval_args(args, frame)?;
        self.invoke(callee_val, arg_vals, Some(line))
    }

    /// `CallExpr` binds its receiver implicitly: when `callee` is a
    /// `MemberExpr`, evaluating it (below, via `eval_member`/`get_member`)
    /// already returns a `Function`/`NativeFunction` with the receiver bound
    /// in, so `eval_call` itself never special-cases the callee shape
    /// (`spec.md` §4.3).
    fn invoke(&mut self, callee: Value, args: Vec<Value>, line: Option<u32>) -> EResult<Value> {
        match callee {
            Value::NativeFunction(nf) => (nf.func)(&mut self.heap, &args),
            Value::Function(sf) => self.call_script_function(&sf, args),
            _ => Err(RuntimeError::new(RuntimeErrorKind::NotCallable, line)),
        }
    }

    fn call_script_function(&mut self, sf: &ScriptFunction, args: Vec<Value>) -> EResult<Value> {
        if self.call_depth >= self.max_call_depth {
            return Err(RuntimeError::new(RuntimeErrorKind::RecursionLimitExceeded(self.max_call_depth), None));
        }
        self.call_depth += 1;
        let result = self.call_script_function_inner(sf, args);
        self.call_depth -= 1;
        result
    }

    fn call_script_function_inner(&mut self, sf: &ScriptFunction, args: Vec<Value>) -> EResult<Value> {
        let top = self.globals.child();
        if let Some(this_binding) = sf.this_val {
            let this_value = match this_binding {
                ThisBinding::Object(id) => Value::Object(id),
                ThisBinding::Native(id) => Value::Native(id),
            };
            top.define("this", this_value);
        }
        for (i, param) in sf.decl.params.iter().enumerate() {
            let value = match args.get(i) {
                Some(v) => v.clone(),
                None => self.default_value(&param.type_ref)?,
            };
            top.define(param.name.clone(), value);
        }
        let mut frame = Frame {
            env: top,
            this_binding: sf.this_val,
        };
        let flow = self.exec_block(&sf.decl.body, &mut frame)?;
        Ok(match flow {
            Flow::Return(v) => v,
            _ => Value::Void,
        })
    }

    /// `instantiateClass` (`spec.md` §4.3): fields are initialized in the
    /// **global** environment (not the object's own frame), then the
    /// constructor, if any, is called with `this` bound to the new object.
    fn instantiate_class(&mut self, name: &str, args: Vec<Value>, line: Option<u32>) -> EResult<Value> {
        let class = self
            .classes
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::UnknownClass(name.to_string()), line))?;
        let id = self.heap.allocate(HeapData::Object(ObjectData::new(name)));
        let mut global_frame = Frame::global(&self.globals);
        for field in class.fields() {
            let value = self.eval_var_initial_value(field, &mut global_frame)?;
            if let Some(obj) = self.heap.object_mut(id) {
                obj.fields.insert(field.name.clone(), value);
            }
        }
        if let Some(ctor) = class.constructor() {
            let func = ScriptFunction {
                name: Rc::from(ctor.name.as_str()),
                decl: Rc::new(ctor.clone()),
                this_val: Some(ThisBinding::Object(id)),
            };
            self.call_script_function(&func, args)?;
        }
        Ok(Value::Object(id))
    }

    /// `CastExpr` (`spec.md` §4.3): integer-family truncates, float-family
    /// takes the numeric value, `bool` uses truthiness, `string` stringifies,
    /// an unrecognized target type name returns the value unchanged.
    fn cast_value(&self, target_type_name: &str, value: &Value) -> Value {
        match target_type_name {
            "int" | "uint" | "int8" | "int16" | "int32" | "int64" | "uint8" | "uint16" | "uint32" | "uint64" => {
                Value::Int(Value::truncate_to_int(value.as_numeric().unwrap_or(0.0)))
            }
            "float" | "double" => Value::Float(value.as_numeric().unwrap_or(0.0)),
            "bool" => Value::Bool(value.is_truthy()),
            "string" => Value::String(Rc::from(value.stringify(&self.heap).as_str())),
            _ => value.clone(),
        }
    }

    // ---- member access (`spec.md` §4.3 "Member resolution") ----

    fn eval_member(&mut self, object_expr: &Expr, member: &str, line: u32, frame: &mut Frame) -> EResult<Value> {
        if let Expr::Identifier(name) = object_expr {
            let combined = format!("{name}::{member}");
            if let Some(v) = self.globals.get(&combined) {
                return Ok(v);
            }
        }
        let obj_val = self.eval_expr(object_expr, frame)?;
        self.get_member(&obj_val, member, Some(line))
    }

    fn get_member(&self, obj: &Value, name: &str, line: Option<u32>) -> EResult<Value> {
        match obj {
            Value::Handle(Some(id)) => match self.heap.get(*id) {
                HeapData::Object(_) => self.get_member(&Value::Object(*id), name, line),
                HeapData::Native(_) => self.get_member(&Value::Native(*id), name, line),
            },
            Value::Handle(None) => Err(RuntimeError::new(RuntimeErrorKind::NullHandleDereference, line)),
            Value::Object(id) => self.get_object_member(*id, name, line),
            Value::Native(id) => self.get_native_member(*id, name, line),
            Value::Array(elems) => self.array_member(elems.clone(), name, line),
            Value::String(s) => self.string_member(s.clone(), name, line),
            _ => Err(RuntimeError::new(RuntimeErrorKind::UnknownMember(name.to_string()), line)),
        }
    }

    fn get_object_member(&self, id: HeapId, name: &str, line: Option<u32>) -> EResult<Value> {
        let obj_data = self.heap.object(id).expect("Object value names a live heap slot");
        if let Some(v) = obj_data.fields.get(name) {
            return Ok(v.clone());
        }
        let class = self
            .classes
            .get(&obj_data.type_name)
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::UnknownClass(obj_data.type_name.clone()), line))?;
        let method = class
            .method(name)
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::UnknownMember(name.to_string()), line))?;
        Ok(Value::Function(ScriptFunction {
            name: Rc::from(method.name.as_str()),
            decl: Rc::new(method.clone()),
            this_val: Some(ThisBinding::Object(id)),
        }))
    }

    fn get_native_member(&self, id: HeapId, name: &str, line: Option<u32>) -> EResult<Value> {
        let native = self.heap.native(id).expect("Native value names a live heap slot");
        match native.value.get_member(name) {
            Some(NativeMember::Value(host)) => Ok(wrap(host)),
            Some(NativeMember::Method) => Ok(bind_native_method(id, name)),
            None => Err(RuntimeError::new(RuntimeErrorKind::UnknownMember(name.to_string()), line)),
        }
    }

    fn array_member(&self, elems: Rc<RefCell<Vec<Value>>>, name: &str, line: Option<u32>) -> EResult<Value> {
        let func: NativeFn = match name {
            "size" | "length" => {
                let elems = elems.clone();
                Rc::new(move |_heap, _args| Ok(Value::Int(elems.borrow().len() as i32)))
            }
            "empty" => {
                let elems = elems.clone();
                Rc::new(move |_heap, _args| Ok(Value::Bool(elems.borrow().is_empty())))
            }
            "push" | "insertLast" => {
                let elems = elems.clone();
                Rc::new(move |_heap, args| {
                    elems.borrow_mut().push(args.first().cloned().unwrap_or(Value::Null));
                    Ok(Value::Void)
                })
            }
            "pop" | "removeLast" => {
                let elems = elems.clone();
                Rc::new(move |_heap, _args| Ok(elems.borrow_mut().pop().unwrap_or(Value::Null)))
            }
            "resize" => {
                let elems = elems.clone();
                Rc::new(move |_heap, args| {
                    let n = args.first().and_then(Value::as_numeric).unwrap_or(0.0).max(0.0) as usize;
                    elems.borrow_mut().resize(n, Value::Int(0));
                    Ok(Value::Void)
                })
            }
            "reserve" => Rc::new(|_heap, _args| Ok(Value::Void)),
            "insertAt" => {
                let elems = elems.clone();
                Rc::new(move |_heap, args| {
                    let mut elems = elems.borrow_mut();
                    let idx = (args.first().and_then(Value::as_numeric).unwrap_or(0.0) as usize).min(elems.len());
                    elems.insert(idx, args.get(1).cloned().unwrap_or(Value::Null));
                    Ok(Value::Void)
                })
            }
            "removeAt" => {
                let elems = elems.clone();
                Rc::new(move |_heap, args| {
                    let mut elems = elems.borrow_mut();
                    let idx = args.first().and_then(Value::as_numeric).unwrap_or(0.0) as usize;
                    if idx < elems.len() {
                        Ok(elems.remove(idx))
                    } else {
                        Ok(Value::Null)
                    }
                })
            }
            "find" => {
                let elems = elems.clone();
                Rc::new(move |_heap, args| {
                    let needle = args.first().cloned().unwrap_or(Value::Null);
                    let elems = elems.borrow();
                    Ok(Value::Int(elems.iter().position(|e| e.equals(&needle)).map_or(-1, |p| p as i32)))
                })
            }
            _ => return Err(RuntimeError::new(RuntimeErrorKind::UnknownMember(name.to_string()), line)),
        };
        Ok(Value::NativeFunction(NativeFunction { name: Rc::from(name), func }))
    }

    fn string_member(&self, s: Rc<str>, name: &str, line: Option<u32>) -> EResult<Value> {
        let func: NativeFn = match name {
            "len" | "length" => {
                let s = s.clone();
                Rc::new(move |_heap, _args| Ok(Value::Int(s.chars().count() as i32)))
            }
            "empty" => {
                let s = s.clone();
                Rc::new(move |_heap, _args| Ok(Value::Bool(s.is_empty())))
            }
            "toInt" => {
                let s = s.clone();
                Rc::new(move |_heap, _args| Ok(Value::Int(s.trim().parse::<i64>().map(|n| n as i32).unwrap_or(0))))
            }
            "toFloat" => {
                let s = s.clone();
                Rc::new(move |_heap, _args| Ok(Value::Float(s.trim().parse::<f64>().unwrap_or(0.0))))
            }
            "toUpper" => {
                let s = s.clone();
                Rc::new(move |_heap, _args| Ok(Value::String(Rc::from(s.to_uppercase().as_str()))))
            }
            "toLower" => {
                let s = s.clone();
                Rc::new(move |_heap, _args| Ok(Value::String(Rc::from(s.to_lowercase().as_str()))))
            }
            "getToken" => {
                let s = s.clone();
                Rc::new(move |_heap, args| {
                    let idx = args.first().and_then(Value::as_numeric).unwrap_or(0.0) as usize;
                    Ok(Value::String(Rc::from(s.split_whitespace().nth(idx).unwrap_or(""))))
                })
            }
            "substr" => {
                let s = s.clone();
                Rc::new(move |_heap, args| {
                    let chars: Vec<char> = s.chars().collect();
                    let start = (args.first().and_then(Value::as_numeric).unwrap_or(0.0).max(0.0) as usize).min(chars.len());
                    let len = args
                        .get(1)
                        .and_then(Value::as_numeric)
                        .map(|n| n.max(0.0) as usize)
                        .unwrap_or(chars.len() - start);
                    let end = (start + len).min(chars.len());
                    Ok(Value::String(Rc::from(chars[start..end].iter().collect::<String>().as_str())))
                })
            }
            "findFirst" => {
                let s = s.clone();
                Rc::new(move |heap, args| {
                    let needle = match args.first() {
                        Some(Value::String(n)) => n.to_string(),
                        Some(other) => other.stringify(heap),
                        None => String::new(),
                    };
                    Ok(Value::Int(s.find(&needle).map_or(-1, |byte_idx| s[..byte_idx].chars().count() as i32)))
                })
            }
            _ => return Err(RuntimeError::new(RuntimeErrorKind::UnknownMember(name.to_string()), line)),
        };
        Ok(Value::NativeFunction(NativeFunction { name: Rc::from(name), func }))
    }

    fn set_member(&mut self, obj: &Value, name: &str, value: Value, line: Option<u32>) -> EResult<()> {
        match obj {
            Value::Handle(Some(id)) => match self.heap.get(*id) {
                HeapData::Object(_) => self.set_member(&Value::Object(*id), name, value, line),
                HeapData::Native(_) => self.set_member(&Value::Native(*id), name, value, line),
            },
            Value::Handle(None) => Err(RuntimeError::new(RuntimeErrorKind::NullHandleDereference, line)),
            Value::Object(id) => {
                let obj_data = self.heap.object_mut(*id).expect("Object value names a live heap slot");
                obj_data.fields.insert(name.to_string(), value);
                Ok(())
            }
            Value::Native(id) => {
                let host_value = unwrap(&value, &self.heap);
                let native = self.heap.native_mut(*id).expect("Native value names a live heap slot");
                native
                    .value
                    .set_member(name, host_value)
                    .map_err(|e| RuntimeError::new(RuntimeErrorKind::Host(e), line))
            }
            _ => Err(RuntimeError::new(RuntimeErrorKind::InvalidAssignmentTarget, line)),
        }
    }

    // ---- indexing (`spec.md` §4.3 "IndexExpr") ----

    fn eval_index(&mut self, object: &Expr, index: &Expr, line: u32, frame: &mut Frame) -> EResult<Value> {
        let obj_val = self.eval_expr(object, frame)?;
        let idx_val = self.eval_expr(index, frame)?;
        self.index_get(&obj_val, &idx_val, Some(line))
    }

    fn index_get(&self, obj: &Value, index: &Value, line: Option<u32>) -> EResult<Value> {
        match obj {
            Value::Array(elems) => {
                let elems = elems.borrow();
                let idx = as_index(index);
                if idx < 0 || idx as usize >= elems.len() {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::IndexOutOfBounds { index: idx, length: elems.len() },
                        line,
                    ));
                }
                Ok(elems[idx as usize].clone())
            }
            Value::Handle(Some(id)) => match self.heap.get(*id) {
                HeapData::Native(_) => self.index_get(&Value::Native(*id), index, line),
                HeapData::Object(_) => Err(RuntimeError::new(RuntimeErrorKind::UnknownOperator("[]".to_string()), line)),
            },
            Value::Handle(None) => Err(RuntimeError::new(RuntimeErrorKind::NullHandleDereference, line)),
            Value::Native(id) => {
                let native = self.heap.native(*id).expect("Native value names a live heap slot");
                native
                    .value
                    .index_get(as_index(index))
                    .map(wrap)
                    .map_err(|e| RuntimeError::new(RuntimeErrorKind::Host(e), line))
            }
            _ => Err(RuntimeError::new(RuntimeErrorKind::UnknownOperator("[]".to_string()), line)),
        }
    }

    fn set_index(&mut self, obj: &Value, index: &Value, value: Value, line: Option<u32>) -> EResult<()> {
        match obj {
            Value::Array(elems) => {
                let mut elems = elems.borrow_mut();
                let idx = as_index(index);
                if idx < 0 || idx as usize >= elems.len() {
                    return Err(RuntimeError::new(
                        RuntimeErrorKind::IndexOutOfBounds { index: idx, length: elems.len() },
                        line,
                    ));
                }
                elems[idx as usize] = value;
                Ok(())
            }
            Value::Handle(Some(id)) => match self.heap.get(*id) {
                HeapData::Native(_) => self.set_index(&Value::Native(*id), index, value, line),
                HeapData::Object(_) => Err(RuntimeError::new(RuntimeErrorKind::UnknownOperator("[]".to_string()), line)),
            },
            Value::Handle(None) => Err(RuntimeError::new(RuntimeErrorKind::NullHandleDereference, line)),
            Value::Native(id) => {
                let host_value = unwrap(&value, &self.heap);
                let native = self.heap.native_mut(*id).expect("Native value names a live heap slot");
                native
                    .value
                    .index_set(as_index(index), host_value)
                    .map_err(|e| RuntimeError::new(RuntimeErrorKind::Host(e), line))
            }
            _ => Err(RuntimeError::new(RuntimeErrorKind::UnknownOperator("[]".to_string()), line)),
        }
    }
}

fn bind_native_method(id: HeapId, name: &str) -> Value {
    let method_name = name.to_string();
    let func: NativeFn = Rc::new(move |heap: &mut Heap, args: &[Value]| -> Result<Value, RuntimeError> {
        let host_args: Vec<_> = args.iter().map(|v| unwrap(v, heap)).collect();
        let native = heap
            .native_mut(id)
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::Host("native receiver no longer exists".to_string()), None))?;
        native
            .value
            .call_method(&method_name, &host_args)
            .map(wrap)
            .map_err(|e| RuntimeError::new(RuntimeErrorKind::Host(e), None))
    });
    Value::NativeFunction(NativeFunction { name: Rc::from(name), func })
}

/// `HandleAssignExpr`/unary `@` coercion (`spec.md` §4.3): a handle passes
/// through, `Null` becomes a null handle, an object/native is wrapped, and
/// anything else becomes a null handle.
fn coerce_to_handle(value: Value) -> Value {
    match value {
        Value::Handle(_) => value,
        Value::Null => Value::Handle(None),
        Value::Object(id) | Value::Native(id) => Value::Handle(Some(id)),
        _ => Value::Handle(None),
    }
}

fn bitwise_binary(op: BinOp, left: &Value, right: &Value) -> Value {
    let l = Value::truncate_to_int(left.as_numeric().unwrap_or(0.0));
    let r = Value::truncate_to_int(right.as_numeric().unwrap_or(0.0));
    let shift = (r as u32) & 31;
    Value::Int(match op {
        BinOp::BitAnd => l & r,
        BinOp::BitOr => l | r,
        BinOp::BitXor => l ^ r,
        BinOp::Shl => l << shift,
        BinOp::Shr => l >> shift,
        _ => unreachable!(),
    })
}

fn as_index(value: &Value) -> i64 {
    value.as_numeric().map(|f| f as i64).unwrap_or(0)
}

fn compound_to_binop(op: AssignOp) -> BinOp {
    match op {
        AssignOp::AddAssign => BinOp::Add,
        AssignOp::SubAssign => BinOp::Sub,
        AssignOp::MulAssign => BinOp::Mul,
        AssignOp::DivAssign => BinOp::Div,
        AssignOp::ModAssign => BinOp::Mod,
        AssignOp::AndAssign => BinOp::BitAnd,
        AssignOp::OrAssign => BinOp::BitOr,
        AssignOp::XorAssign => BinOp::BitXor,
        AssignOp::Assign => unreachable!("plain assignment does not read the current value"),
    }
}

fn binop_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::Eq => "==",
        BinOp::NotEq => "!=",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::LtEq => "<=",
        BinOp::GtEq => ">=",
        BinOp::And => "&&",
        BinOp::Or => "||",
    }
}

fn line_of(expr: &Expr) -> u32 {
    expr.line().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn run(src: &str) -> Evaluator {
        let tokens = Lexer::new(src).tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        let mut eval = Evaluator::new(256);
        eval.execute_program(&program).unwrap();
        eval
    }

    #[test]
    fn counter_class_scenario() {
        let mut eval = run(
            "class TestClass { int v; TestClass(int initial) { v = initial; } void inc() { v++; } }
             int main(int start) { TestClass t = new TestClass(start); t.inc(); t.inc(); t.inc(); return t.v; }",
        );
        let result = eval.call("main", vec![Value::Int(12)]).unwrap();
        assert!(matches!(result, Value::Int(15)));
    }

    #[test]
    fn switch_fallthrough_scenario() {
        let mut eval = run("int f(int x) { switch(x){ case 1: case 2: return 20; case 3: return 30; default: return 0; } }");
        for (input, expected) in [(1, 20), (2, 20), (3, 30), (9, 0)] {
            let result = eval.call("f", vec![Value::Int(input)]).unwrap();
            assert!(matches!(result, Value::Int(v) if v == expected), "f({input}) = {result:?}");
        }
    }

    #[test]
    fn short_circuit_and_does_not_evaluate_right_side() {
        let mut eval = run("int c = 0; bool side() { c = c + 1; return true; } bool r; void run() { r = false && side(); }");
        eval.call("run", vec![]).unwrap();
        assert!(matches!(eval.globals.get("c"), Some(Value::Int(0))));
        assert!(matches!(eval.globals.get("r"), Some(Value::Bool(false))));
    }

    #[test]
    fn handle_aliasing_mutates_through_both_names() {
        let mut eval = run(
            "class Box { int n; }
             void run() { Box a = new Box(); a.n = 5; Box@ h = @a; h.n = 9; g = a.n; }
             int g;",
        );
        eval.call("run", vec![]).unwrap();
        assert!(matches!(eval.globals.get("g"), Some(Value::Int(9))));
    }

    #[test]
    fn array_operations_scenario() {
        let mut eval = run(
            "int s; int idx; int sizeAfter; int first;
             void run() {
                 int[] xs;
                 xs.push(1); xs.push(2); xs.push(3);
                 s = xs.size();
                 idx = xs.find(2);
                 xs.removeAt(0);
                 sizeAfter = xs.size();
                 first = xs[0];
             }",
        );
        eval.call("run", vec![]).unwrap();
        assert!(matches!(eval.globals.get("s"), Some(Value::Int(3))));
        assert!(matches!(eval.globals.get("idx"), Some(Value::Int(1))));
        assert!(matches!(eval.globals.get("sizeAfter"), Some(Value::Int(2))));
        assert!(matches!(eval.globals.get("first"), Some(Value::Int(2))));
    }

    #[test]
    fn array_index_out_of_bounds_is_a_runtime_error() {
        let mut eval = run("int f() { int[] xs; return xs[0]; }");
        let err = eval.call("f", vec![]).unwrap_err();
        assert!(matches!(err.kind, RuntimeErrorKind::IndexOutOfBounds { .. }));
    }

    #[test]
    fn missing_lvalue_compound_assign_reads_as_zero() {
        let mut eval = run("int f() { y += 5; return y; }");
        let result = eval.call("f", vec![]).unwrap();
        assert!(matches!(result, Value::Int(5)));
    }

    #[test]
    fn enum_member_resolves_to_registered_int() {
        let mut eval = run("enum Color { Red, Green, Blue = 10 } int f() { return Color::Blue; }");
        let result = eval.call("f", vec![]).unwrap();
        assert!(matches!(result, Value::Int(10)));
    }

    #[test]
    fn two_pass_registration_allows_forward_reference() {
        let mut eval = run("int a() { return b(); } int b() { return 7; }");
        let result = eval.call("a", vec![]).unwrap();
        assert!(matches!(result, Value::Int(7)));
    }

    #[test]
    fn recursion_limit_raises_runtime_error() {
        let mut eval = Evaluator::new(8);
        let tokens = Lexer::new("int loop(int n) { return loop(n + 1); }").tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        eval.execute_program(&program).unwrap();
        let err = eval.call("loop", vec![Value::Int(0)]).unwrap_err();
        assert!(matches!(err.kind, RuntimeErrorKind::RecursionLimitExceeded(8)));
    }

    #[test]
    fn int_bitwise_and_shift_truncate_to_32_bits() {
        let mut eval = run("int f() { return (-1) >> 1; }");
        let result = eval.call("f", vec![]).unwrap();
        assert!(matches!(result, Value::Int(-1)));
    }
}
