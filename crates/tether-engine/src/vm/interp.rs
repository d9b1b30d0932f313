//! Tree-walking evaluation of statements and expressions

use std::sync::Arc;

use crate::parser::ast::*;
use crate::vm::builtins;
use crate::vm::heap::{Closure, HeapObject, ObjectId, ObjectKind};
use crate::vm::realm::{Abrupt, Completion, ErrorKind, Frame, Hint, Realm};
use crate::vm::value::{to_int32, to_uint32, Value};

/// Statement completion
#[derive(Debug)]
pub(crate) enum Flow {
    /// Completed normally, with the completion value if any
    Normal(Option<Value>),
    Return(Value),
    Break,
    Continue,
}

/// Assignable location
enum Reference {
    Binding(Name),
    Property(Value, Name),
}

fn needs_scope(body: &[Stmt]) -> bool {
    body.iter().any(|stmt| {
        matches!(
            stmt.kind,
            StmtKind::Declaration(VarKind::Let | VarKind::Const, _)
        )
    })
}

/// Render a callee expression for error messages
fn describe(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Identifier(name) => name.to_string(),
        ExprKind::This => "this".to_string(),
        ExprKind::Member { object, property } => format!("{}.{}", describe(object), property),
        ExprKind::Index { object, .. } => format!("{}[...]", describe(object)),
        ExprKind::Call { callee, .. } => format!("{}(...)", describe(callee)),
        ExprKind::Function(_) => "(intermediate value)".to_string(),
        _ => "expression".to_string(),
    }
}

impl Realm {
    // ========================================================================
    // Programs and functions
    // ========================================================================

    /// Evaluate a parsed program in the global scope; returns its
    /// completion value.
    pub(crate) fn run_program(&self, program: &Program) -> Completion<Value> {
        self.check_interrupt()?;
        let global = self.intrinsics.global;
        self.push_frame(Frame {
            function: None,
            resource: program.resource.clone(),
            line: 1,
            column: 1,
            this: Value::Undefined,
        })?;
        self.hoist(global, &program.var_names, &program.functions);
        let result = self.exec_statements(&program.body, global);
        self.pop_frame();
        match result? {
            Flow::Normal(value) => Ok(value.unwrap_or(Value::Undefined)),
            Flow::Return(value) => Ok(value),
            Flow::Break | Flow::Continue => Ok(Value::Undefined),
        }
    }

    fn hoist(&self, scope: ObjectId, var_names: &[Name], functions: &[Arc<FunctionNode>]) {
        for name in var_names {
            self.declare_hoisted(scope, name);
        }
        for node in functions {
            if let Some(name) = &node.name {
                let function = self.make_closure(node.clone(), scope);
                self.declare(scope, name.clone(), Value::Object(function), true);
            }
        }
    }

    /// Allocate a function object closing over `scope`
    pub(crate) fn make_closure(&self, node: Arc<FunctionNode>, scope: ObjectId) -> ObjectId {
        let prototype = self.new_object();
        let mut object = HeapObject::new(
            ObjectKind::Function(Closure { node, scope }),
            Some(self.intrinsics.function_proto),
        );
        object
            .props
            .insert_hidden(Arc::from("prototype"), Value::Object(prototype));
        let function = self.alloc(object);
        self.with_object_mut(prototype, |o| {
            o.props
                .insert_hidden(Arc::from("constructor"), Value::Object(function))
        });
        function
    }

    /// Call any callable value
    pub(crate) fn call(&self, callee: Value, this: Value, args: Vec<Value>) -> Completion<Value> {
        enum Target {
            Closure(Closure),
            Native(builtins::Builtin),
            Proxy(i32, tether_sdk::TemplateId),
            None,
        }
        let target = callee
            .as_object()
            .and_then(|id| {
                self.with_object(id, |o| match &o.kind {
                    ObjectKind::Function(closure) => Target::Closure(closure.clone()),
                    ObjectKind::Native(builtin) => Target::Native(*builtin),
                    ObjectKind::HostProxy { slot, template } => Target::Proxy(*slot, *template),
                    _ => Target::None,
                })
            })
            .unwrap_or(Target::None);
        match target {
            Target::Closure(closure) => self.call_closure(closure, this, args),
            Target::Native(builtin) => self.call_builtin(builtin, this, args, false),
            Target::Proxy(slot, template) => self.proxy_invoke(slot, template, args),
            Target::None => {
                let shown = self.primitive_string(&callee);
                Err(self.throw_error(ErrorKind::Type, format!("{} is not a function", shown)))
            }
        }
    }

    fn call_closure(&self, closure: Closure, this: Value, args: Vec<Value>) -> Completion<Value> {
        self.check_interrupt()?;
        let node = closure.node;
        let scope = self.new_scope(Some(closure.scope));

        let arguments = self.new_array(args.clone());
        self.declare(scope, Arc::from("arguments"), Value::Object(arguments), true);
        let mut args = args.into_iter();
        for param in &node.params {
            let value = args.next().unwrap_or(Value::Undefined);
            self.declare(scope, param.clone(), value, true);
        }
        self.hoist(scope, &node.var_names, &node.functions);

        self.push_frame(Frame {
            function: node.name.clone(),
            resource: node.resource.clone(),
            line: node.span.line,
            column: node.span.column,
            this,
        })?;
        let result = self.exec_statements(&node.body, scope);
        self.pop_frame();
        match result? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    /// `new callee(...args)`
    pub(crate) fn construct(&self, callee: Value, args: Vec<Value>, shown: &str) -> Completion<Value> {
        enum Target {
            Closure,
            Native(builtins::Builtin),
            Proxy,
            None,
        }
        let Some(id) = callee.as_object() else {
            return Err(self.not_a_constructor(shown));
        };
        let target = self
            .with_object(id, |o| match &o.kind {
                ObjectKind::Function(_) => Target::Closure,
                ObjectKind::Native(builtin) if builtins::is_constructor(*builtin) => {
                    Target::Native(*builtin)
                }
                ObjectKind::HostProxy { .. } => Target::Proxy,
                _ => Target::None,
            })
            .unwrap_or(Target::None);
        match target {
            Target::Closure => {
                let proto = match self.get_property(id, "prototype")? {
                    Value::Object(proto) => proto,
                    _ => self.intrinsics.object_proto,
                };
                let instance = self.alloc(HeapObject::new(ObjectKind::Ordinary, Some(proto)));
                let result = self.call(callee, Value::Object(instance), args)?;
                Ok(match result {
                    Value::Object(_) => result,
                    _ => Value::Object(instance),
                })
            }
            Target::Native(builtin) => self.call_builtin(builtin, Value::Undefined, args, true),
            Target::Proxy if self.is_callable(&callee) => self.call(callee, Value::Undefined, args),
            _ => Err(self.not_a_constructor(shown)),
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub(crate) fn exec_statements(&self, body: &[Stmt], scope: ObjectId) -> Completion<Flow> {
        let mut last = None;
        for stmt in body {
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal(value) => {
                    if value.is_some() {
                        last = value;
                    }
                }
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal(last))
    }

    fn exec_block(&self, body: &[Stmt], scope: ObjectId) -> Completion<Flow> {
        let scope = if needs_scope(body) {
            self.new_scope(Some(scope))
        } else {
            scope
        };
        self.exec_statements(body, scope)
    }

    fn exec_stmt(&self, stmt: &Stmt, scope: ObjectId) -> Completion<Flow> {
        self.set_position(stmt.span);
        match &stmt.kind {
            StmtKind::Expression(expr) => Ok(Flow::Normal(Some(self.eval(expr, scope)?))),
            StmtKind::Declaration(kind, declarators) => {
                self.exec_declaration(*kind, declarators, scope)?;
                Ok(Flow::Normal(None))
            }
            StmtKind::Function(_) | StmtKind::Empty => Ok(Flow::Normal(None)),
            StmtKind::Return(argument) => {
                let value = match argument {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.exec_stmt(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec_stmt(alternate, scope)
                } else {
                    Ok(Flow::Normal(None))
                }
            }
            StmtKind::Block { body, scoped } => {
                let scope = if *scoped {
                    self.new_scope(Some(scope))
                } else {
                    scope
                };
                self.exec_statements(body, scope)
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => self.exec_for(init.as_ref(), test.as_ref(), update.as_ref(), body, scope),
            StmtKind::ForIn {
                kind,
                name,
                object,
                body,
            } => self.exec_for_in(*kind, name, object, body, scope),
            StmtKind::While { test, body } => {
                let mut last = None;
                loop {
                    self.check_interrupt()?;
                    if !self.eval(test, scope)?.truthy() {
                        break;
                    }
                    match self.exec_stmt(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue => {}
                        Flow::Normal(value) => last = value.or(last),
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal(last))
            }
            StmtKind::DoWhile { body, test } => {
                let mut last = None;
                loop {
                    self.check_interrupt()?;
                    match self.exec_stmt(body, scope)? {
                        Flow::Break => break,
                        Flow::Continue => {}
                        Flow::Normal(value) => last = value.or(last),
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                    if !self.eval(test, scope)?.truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal(last))
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Throw(argument) => {
                let value = self.eval(argument, scope)?;
                Err(self.throw_at(value, stmt.span))
            }
            StmtKind::Try {
                block,
                param,
                handler,
                finalizer,
            } => self.exec_try(block, param.as_ref(), handler.as_deref(), finalizer.as_deref(), scope),
        }
    }

    fn exec_declaration(
        &self,
        kind: VarKind,
        declarators: &[VarDeclarator],
        scope: ObjectId,
    ) -> Completion<()> {
        for declarator in declarators {
            match (kind, &declarator.init) {
                (VarKind::Var, None) => {}
                (VarKind::Var, Some(init)) => {
                    let value = self.eval(init, scope)?;
                    self.assign(scope, &declarator.name, value)?;
                }
                (_, init) => {
                    let value = match init {
                        Some(init) => self.eval(init, scope)?,
                        None => Value::Undefined,
                    };
                    self.declare(
                        scope,
                        declarator.name.clone(),
                        value,
                        kind != VarKind::Const,
                    );
                }
            }
        }
        Ok(())
    }

    fn exec_for(
        &self,
        init: Option<&ForInit>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        scope: ObjectId,
    ) -> Completion<Flow> {
        let scope = match init {
            Some(ForInit::Declaration(VarKind::Let | VarKind::Const, _)) => {
                self.new_scope(Some(scope))
            }
            _ => scope,
        };
        match init {
            Some(ForInit::Declaration(kind, declarators)) => {
                self.exec_declaration(*kind, declarators, scope)?
            }
            Some(ForInit::Expression(expr)) => {
                self.eval(expr, scope)?;
            }
            None => {}
        }
        let mut last = None;
        loop {
            self.check_interrupt()?;
            if let Some(test) = test {
                if !self.eval(test, scope)?.truthy() {
                    break;
                }
            }
            match self.exec_stmt(body, scope)? {
                Flow::Break => break,
                Flow::Continue => {}
                Flow::Normal(value) => last = value.or(last),
                flow @ Flow::Return(_) => return Ok(flow),
            }
            if let Some(update) = update {
                self.eval(update, scope)?;
            }
        }
        Ok(Flow::Normal(last))
    }

    fn exec_for_in(
        &self,
        kind: Option<VarKind>,
        name: &Name,
        object: &Expr,
        body: &Stmt,
        scope: ObjectId,
    ) -> Completion<Flow> {
        let target = self.eval(object, scope)?;
        let keys = self.for_in_keys(&target)?;
        let lexical = matches!(kind, Some(VarKind::Let | VarKind::Const));
        let mut last = None;
        for key in keys {
            self.check_interrupt()?;
            let body_scope = if lexical {
                let inner = self.new_scope(Some(scope));
                self.declare(inner, name.clone(), Value::String(key), kind != Some(VarKind::Const));
                inner
            } else {
                self.assign(scope, name, Value::String(key))?;
                scope
            };
            match self.exec_stmt(body, body_scope)? {
                Flow::Break => break,
                Flow::Continue => {}
                Flow::Normal(value) => last = value.or(last),
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal(last))
    }

    /// Enumerable keys of an object and its prototype chain
    fn for_in_keys(&self, target: &Value) -> Completion<Vec<Name>> {
        match target {
            Value::Object(id) => {
                let mut keys = self.own_keys(*id)?;
                let mut proto = self.proto_of(*id);
                while let Some(current) = proto {
                    for key in self.ordinary_keys(current) {
                        if !keys.contains(&key) {
                            keys.push(key);
                        }
                    }
                    proto = self.proto_of(current);
                }
                Ok(keys)
            }
            Value::String(s) => Ok((0..s.encode_utf16().count())
                .map(|i| Arc::from(i.to_string().as_str()))
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    fn exec_try(
        &self,
        block: &[Stmt],
        param: Option<&Name>,
        handler: Option<&[Stmt]>,
        finalizer: Option<&[Stmt]>,
        scope: ObjectId,
    ) -> Completion<Flow> {
        let result = match (self.exec_block(block, scope), handler) {
            (Err(Abrupt::Throw(error)), Some(handler)) => {
                let catch_scope = self.new_scope(Some(scope));
                if let Some(param) = param {
                    self.declare(catch_scope, param.clone(), error, true);
                }
                self.exec_block(handler, catch_scope)
            }
            (result, _) => result,
        };
        // Termination skips finally blocks
        if matches!(result, Err(Abrupt::Terminate)) {
            return result;
        }
        if let Some(finalizer) = finalizer {
            match self.exec_block(finalizer, scope)? {
                Flow::Normal(_) => {}
                flow => return Ok(flow),
            }
        }
        result
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(crate) fn eval(&self, expr: &Expr, scope: ObjectId) -> Completion<Value> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::String(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Identifier(name) => self.read_binding(name, expr, scope),
            ExprKind::This => Ok(self.this_value()),
            ExprKind::Array(elements) => {
                let items = self.eval_list(elements, scope)?;
                Ok(Value::Object(self.new_array(items)))
            }
            ExprKind::Object(properties) => {
                let object = self.new_object();
                for (key, value) in properties {
                    let value = self.eval(value, scope)?;
                    self.ordinary_set(object, key.clone(), value)?;
                }
                Ok(Value::Object(object))
            }
            ExprKind::Function(node) => Ok(Value::Object(self.eval_function(node, scope))),
            ExprKind::Member { object, property } => {
                let target = self.eval(object, scope)?;
                self.get_at(&target, property, expr)
            }
            ExprKind::Index { object, index } => {
                let target = self.eval(object, scope)?;
                let key = self.eval(index, scope)?;
                let key = self.to_key(&key)?;
                self.get_at(&target, &key, expr)
            }
            ExprKind::Call { callee, args } => self.eval_call(expr, callee, args, scope),
            ExprKind::New { callee, args } => {
                let constructor = self.eval(callee, scope)?;
                let args = self.eval_list(args, scope)?;
                self.set_position(expr.span);
                self.construct(constructor, args, &describe(callee))
            }
            ExprKind::Unary { op, argument } => self.eval_unary(*op, argument, scope),
            ExprKind::Update {
                increment,
                prefix,
                target,
            } => {
                let reference = self.eval_reference(target, scope)?;
                let old = self.read_reference(&reference, target, scope)?;
                let old = self.to_number(&old)?;
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.write_reference(reference, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.set_position(expr.span);
                self.binary(*op, left, right)
            }
            ExprKind::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                match (op, left.truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.eval(right, scope),
                }
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            ExprKind::Assign { op, target, value } => {
                let reference = self.eval_reference(target, scope)?;
                let value = match op {
                    None => self.eval(value, scope)?,
                    Some(op) => {
                        let old = self.read_reference(&reference, target, scope)?;
                        let rhs = self.eval(value, scope)?;
                        self.binary(*op, old, rhs)?
                    }
                };
                self.write_reference(reference, value.clone(), scope)?;
                Ok(value)
            }
            ExprKind::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval(expr, scope)?;
                }
                Ok(last)
            }
        }
    }

    fn eval_list(&self, exprs: &[Expr], scope: ObjectId) -> Completion<Vec<Value>> {
        exprs.iter().map(|expr| self.eval(expr, scope)).collect()
    }

    fn eval_function(&self, node: &Arc<FunctionNode>, scope: ObjectId) -> ObjectId {
        // A named function expression sees its own name
        match &node.name {
            Some(name) => {
                let own = self.new_scope(Some(scope));
                let function = self.make_closure(node.clone(), own);
                self.declare(own, name.clone(), Value::Object(function), false);
                function
            }
            None => self.make_closure(node.clone(), scope),
        }
    }

    fn read_binding(&self, name: &Name, expr: &Expr, scope: ObjectId) -> Completion<Value> {
        match self.lookup(scope, name) {
            Some(value) => Ok(value),
            None => {
                self.set_position(expr.span);
                Err(self.throw_error(
                    ErrorKind::Reference,
                    format!("{} is not defined", name),
                ))
            }
        }
    }

    fn get_at(&self, target: &Value, key: &str, expr: &Expr) -> Completion<Value> {
        if target.is_nullish() {
            self.set_position(expr.span);
        }
        self.get(target, key)
    }

    fn eval_call(
        &self,
        expr: &Expr,
        callee: &Expr,
        args: &[Expr],
        scope: ObjectId,
    ) -> Completion<Value> {
        let (this, function) = match &callee.kind {
            ExprKind::Member { object, property } => {
                let target = self.eval(object, scope)?;
                let function = self.get_at(&target, property, callee)?;
                (target, function)
            }
            ExprKind::Index { object, index } => {
                let target = self.eval(object, scope)?;
                let key = self.eval(index, scope)?;
                let key = self.to_key(&key)?;
                let function = self.get_at(&target, &key, callee)?;
                (target, function)
            }
            _ => (Value::Undefined, self.eval(callee, scope)?),
        };
        let args = self.eval_list(args, scope)?;
        self.set_position(expr.span);
        if !self.is_callable(&function) {
            return Err(self.throw_error(
                ErrorKind::Type,
                format!("{} is not a function", describe(callee)),
            ));
        }
        self.call(function, this, args)
    }

    fn eval_unary(&self, op: UnaryOp, argument: &Expr, scope: ObjectId) -> Completion<Value> {
        match op {
            UnaryOp::Typeof => {
                let value = match &argument.kind {
                    ExprKind::Identifier(name) => {
                        self.lookup(scope, name).unwrap_or(Value::Undefined)
                    }
                    _ => self.eval(argument, scope)?,
                };
                Ok(Value::string(self.type_of(&value)))
            }
            UnaryOp::Delete => match &argument.kind {
                ExprKind::Member { object, property } => {
                    let target = self.eval(object, scope)?;
                    Ok(Value::Bool(self.delete(&target, property)?))
                }
                ExprKind::Index { object, index } => {
                    let target = self.eval(object, scope)?;
                    let key = self.eval(index, scope)?;
                    let key = self.to_key(&key)?;
                    Ok(Value::Bool(self.delete(&target, &key)?))
                }
                ExprKind::Identifier(_) => Ok(Value::Bool(false)),
                _ => {
                    self.eval(argument, scope)?;
                    Ok(Value::Bool(true))
                }
            },
            _ => {
                let value = self.eval(argument, scope)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Minus => Value::Number(-self.to_number(&value)?),
                    UnaryOp::Plus => Value::Number(self.to_number(&value)?),
                    UnaryOp::BitNot => Value::Number(f64::from(!to_int32(self.to_number(&value)?))),
                    _ => Value::Undefined,
                })
            }
        }
    }

    // ========================================================================
    // References
    // ========================================================================

    fn eval_reference(&self, target: &Expr, scope: ObjectId) -> Completion<Reference> {
        match &target.kind {
            ExprKind::Identifier(name) => Ok(Reference::Binding(name.clone())),
            ExprKind::Member { object, property } => {
                let object = self.eval(object, scope)?;
                Ok(Reference::Property(object, property.clone()))
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let key = self.eval(index, scope)?;
                Ok(Reference::Property(object, self.to_key(&key)?))
            }
            _ => Err(self.throw_error(
                ErrorKind::Syntax,
                "Invalid left-hand side in assignment",
            )),
        }
    }

    fn read_reference(&self, reference: &Reference, expr: &Expr, scope: ObjectId) -> Completion<Value> {
        match reference {
            Reference::Binding(name) => self.read_binding(name, expr, scope),
            Reference::Property(object, key) => self.get_at(object, key, expr),
        }
    }

    fn write_reference(&self, reference: Reference, value: Value, scope: ObjectId) -> Completion<()> {
        match reference {
            Reference::Binding(name) => self.assign(scope, &name, value),
            Reference::Property(object, key) => self.put(&object, key, value),
        }
    }

    // ========================================================================
    // Operators
    // ========================================================================

    pub(crate) fn binary(&self, op: BinaryOp, left: Value, right: Value) -> Completion<Value> {
        use BinaryOp::*;
        Ok(match op {
            Add => {
                let left = self.to_primitive(left, Hint::Default)?;
                let right = self.to_primitive(right, Hint::Default)?;
                if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                    let mut text = self.to_js_string(&left)?.to_string();
                    text.push_str(&self.to_js_string(&right)?);
                    Value::string(&text)
                } else {
                    Value::Number(self.to_number(&left)? + self.to_number(&right)?)
                }
            }
            Sub => Value::Number(self.to_number(&left)? - self.to_number(&right)?),
            Mul => Value::Number(self.to_number(&left)? * self.to_number(&right)?),
            Div => Value::Number(self.to_number(&left)? / self.to_number(&right)?),
            Mod => Value::Number(self.to_number(&left)? % self.to_number(&right)?),
            Eq => Value::Bool(self.loose_equals(left, right)?),
            NotEq => Value::Bool(!self.loose_equals(left, right)?),
            StrictEq => Value::Bool(left.strict_equals(&right)),
            StrictNotEq => Value::Bool(!left.strict_equals(&right)),
            Less => Value::Bool(self.less_than(left, right, false)?),
            Greater => Value::Bool(self.less_than(right, left, false)?),
            LessEq => Value::Bool(self.less_than(right, left, true)?),
            GreaterEq => Value::Bool(self.less_than(left, right, true)?),
            BitAnd | BitOr | BitXor | Shl | Shr => {
                let a = to_int32(self.to_number(&left)?);
                let b = to_int32(self.to_number(&right)?);
                let shift = (b as u32) & 31;
                Value::Number(f64::from(match op {
                    BitAnd => a & b,
                    BitOr => a | b,
                    BitXor => a ^ b,
                    Shl => a.wrapping_shl(shift),
                    _ => a >> shift,
                }))
            }
            UShr => {
                let a = to_uint32(self.to_number(&left)?);
                let shift = to_uint32(self.to_number(&right)?) & 31;
                Value::Number(f64::from(a >> shift))
            }
            In => {
                let Value::Object(id) = right else {
                    let shown = self.primitive_string(&left);
                    return Err(self.throw_error(
                        ErrorKind::Type,
                        format!("Cannot use 'in' operator to search for '{}' in {}", shown, self.primitive_string(&right)),
                    ));
                };
                let key = self.to_key(&left)?;
                Value::Bool(self.has_property(id, &key)?)
            }
            Instanceof => {
                if !self.is_callable(&right) {
                    return Err(self.throw_error(
                        ErrorKind::Type,
                        "Right-hand side of 'instanceof' is not callable",
                    ));
                }
                let Value::Object(instance) = left else {
                    return Ok(Value::Bool(false));
                };
                let Value::Object(prototype) = self.get(&right, "prototype")? else {
                    return Ok(Value::Bool(false));
                };
                let mut current = self.proto_of(instance);
                let mut found = false;
                while let Some(id) = current {
                    if id == prototype {
                        found = true;
                        break;
                    }
                    current = self.proto_of(id);
                }
                Value::Bool(found)
            }
        })
    }

    /// Abstract relational comparison `left < right`. With `negate` the
    /// result is `!(left < right)` except that undefined comparisons (NaN)
    /// stay false.
    fn less_than(&self, left: Value, right: Value, negate: bool) -> Completion<bool> {
        let left = self.to_primitive(left, Hint::Number)?;
        let right = self.to_primitive(right, Hint::Number)?;
        if let (Value::String(a), Value::String(b)) = (&left, &right) {
            let less = a.encode_utf16().lt(b.encode_utf16());
            return Ok(less != negate);
        }
        let a = self.to_number(&left)?;
        let b = self.to_number(&right)?;
        if a.is_nan() || b.is_nan() {
            return Ok(false);
        }
        Ok((a < b) != negate)
    }

    pub(crate) fn loose_equals(&self, left: Value, right: Value) -> Completion<bool> {
        use Value::*;
        Ok(match (&left, &right) {
            (Undefined | Null, Undefined | Null) => true,
            (Undefined | Null, _) | (_, Undefined | Null) => false,
            (Number(_), Number(_))
            | (String(_), String(_))
            | (Bool(_), Bool(_))
            | (Object(_), Object(_)) => left.strict_equals(&right),
            (Number(n), String(s)) | (String(s), Number(n)) => {
                *n == crate::vm::value::string_to_number(s)
            }
            (Bool(b), _) => {
                let n = Number(f64::from(u8::from(*b)));
                return self.loose_equals(n, right);
            }
            (_, Bool(b)) => {
                let n = Number(f64::from(u8::from(*b)));
                return self.loose_equals(left, n);
            }
            (Object(_), _) => {
                let primitive = self.to_primitive(left, Hint::Default)?;
                return self.loose_equals(primitive, right);
            }
            (_, Object(_)) => {
                let primitive = self.to_primitive(right, Hint::Default)?;
                return self.loose_equals(left, primitive);
            }
        })
    }
}
