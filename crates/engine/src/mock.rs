//! In-process mock engine
//!
//! Implements the SDK interfaces with observable state: reference counts,
//! call logs, context pool balance, and a registration log. Used by the
//! tests of this crate and, through the `mock` feature, by dependent crates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use scripthook_sdk::*;

/// Callback run when a mock function executes, before it returns
pub type OnCall = Box<dyn Fn(&[ScriptValue]) + Send + Sync>;

/// What a mock function does when executed
#[derive(Debug, Clone)]
pub enum Behavior {
    Return(ScriptValue),
    Throw(String),
    Abort,
}

#[derive(Default)]
struct EngineState {
    types: HashMap<TypeId, TypeInfo>,
    next_seq: TypeId,
    functions: Vec<Weak<MockFunction>>,
    pool: Vec<ContextRef>,
    outstanding: usize,
    requested: usize,
    fail_context_requests: bool,
    default_namespace: String,
    default_access_mask: u32,
    registrations: Vec<String>,
    methods: HashMap<(String, String), NativeMethod>,
    globals: HashMap<String, ObjectRef>,
}

/// Mock script engine
pub struct MockEngine {
    this: Weak<MockEngine>,
    state: Mutex<EngineState>,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            state: Mutex::new(EngineState {
                next_seq: TYPEID_DOUBLE + 1,
                default_access_mask: 1,
                ..Default::default()
            }),
        })
    }

    fn arc(&self) -> Arc<MockEngine> {
        self.this.upgrade().expect("mock engine dropped")
    }

    fn next_type_id(state: &mut EngineState, kind: TypeId) -> TypeId {
        let seq = state.next_seq;
        state.next_seq += 1;
        kind | seq
    }

    /// Register a type directly
    pub fn register_type(&self, namespace: &str, name: &str, flags: u32) -> TypeId {
        let mut state = self.state.lock();
        let kind = if flags & object_flags::ENUM != 0 {
            0
        } else {
            TYPEID_APPOBJECT
        };
        let type_id = Self::next_type_id(&mut state, kind);
        state
            .types
            .insert(type_id, TypeInfo::new(type_id, namespace, name, flags));
        type_id
    }

    /// Register a funcdef type and return its signature function
    pub fn funcdef(&self, namespace: &str, declaration: &str) -> Arc<MockFunction> {
        let parsed = ParsedDeclaration::parse(declaration);
        let type_id = self.register_type(namespace, &parsed.name, object_flags::FUNCDEF | object_flags::REF);

        MockFunction::builder(&self.arc(), &parsed.name)
            .namespace(namespace)
            .signature(type_id)
            .params(&parsed.params)
            .return_type(parsed.return_type)
            .build()
    }

    /// Look up the mock behind a function reference
    pub fn mock_function(&self, function: &FunctionRef) -> Option<Arc<MockFunction>> {
        let state = self.state.lock();
        state
            .functions
            .iter()
            .find(|weak| std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(function)))
            .and_then(Weak::upgrade)
    }

    /// Create a context outside the pool
    pub fn create_context(&self) -> ContextRef {
        Arc::new(MockContext::new(self.this.clone()))
    }

    /// Contexts borrowed and not yet returned
    pub fn outstanding_contexts(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Total pool requests
    pub fn contexts_requested(&self) -> usize {
        self.state.lock().requested
    }

    /// Make every pool request fail
    pub fn set_fail_context_requests(&self, fail: bool) {
        self.state.lock().fail_context_requests = fail;
    }

    /// Registration log, one entry per call
    pub fn registrations(&self) -> Vec<String> {
        self.state.lock().registrations.clone()
    }

    pub fn default_access_mask(&self) -> u32 {
        self.state.lock().default_access_mask
    }

    /// Object registered under a global property declaration
    pub fn global(&self, declaration: &str) -> Option<ObjectRef> {
        self.state.lock().globals.get(declaration).cloned()
    }

    /// Invoke a registered native method by type and method name
    pub fn call_native(
        &self,
        type_name: &str,
        method_name: &str,
        object: &ObjectRef,
        caller: Option<ModuleRef>,
        args: &[GenericArg],
    ) -> Option<ScriptValue> {
        let method = {
            let state = self.state.lock();
            state
                .methods
                .get(&(type_name.to_string(), method_name.to_string()))
                .cloned()?
        };

        let mut call = GenericCall::new(object, caller, args);
        method(&mut call);
        Some(call.return_value)
    }

    fn log(&self, entry: String) {
        self.state.lock().registrations.push(entry);
    }
}

impl ScriptEngine for MockEngine {
    fn type_info_by_id(&self, type_id: TypeId) -> Option<TypeInfo> {
        self.state.lock().types.get(&strip_handle(type_id)).cloned()
    }

    fn request_context(&self) -> ScriptResult<ContextRef> {
        let mut state = self.state.lock();
        if state.fail_context_requests {
            return Err(ErrorCode::OUT_OF_MEMORY);
        }

        state.requested += 1;
        state.outstanding += 1;
        let pooled = state.pool.pop();
        drop(state);

        Ok(pooled.unwrap_or_else(|| self.create_context()))
    }

    fn return_context(&self, context: ContextRef) {
        let _ = context.unprepare();
        let mut state = self.state.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        state.pool.push(context);
    }

    fn default_namespace(&self) -> String {
        self.state.lock().default_namespace.clone()
    }

    fn set_default_namespace(&self, namespace: &str) -> ScriptResult<()> {
        self.state.lock().default_namespace = namespace.to_string();
        Ok(())
    }

    fn set_default_access_mask(&self, mask: u32) -> u32 {
        std::mem::replace(&mut self.state.lock().default_access_mask, mask)
    }

    fn register_enum(&self, name: &str) -> ScriptResult<TypeId> {
        let namespace = self.default_namespace();
        self.log(format!("enum {name}"));
        Ok(self.register_type(&namespace, name, object_flags::ENUM))
    }

    fn register_enum_value(&self, enum_name: &str, name: &str, value: i32) -> ScriptResult<()> {
        self.log(format!("enum value {enum_name}::{name} = {value}"));
        Ok(())
    }

    fn register_object_type(&self, name: &str, flags: u32) -> ScriptResult<TypeId> {
        let namespace = self.default_namespace();
        {
            let state = self.state.lock();
            if state
                .types
                .values()
                .any(|info| info.name == name && info.namespace == namespace)
            {
                return Err(ErrorCode::ALREADY_REGISTERED);
            }
        }
        self.log(format!("type {name}"));
        Ok(self.register_type(&namespace, name, flags))
    }

    fn register_object_method(
        &self,
        type_name: &str,
        declaration: &str,
        method: NativeMethod,
    ) -> ScriptResult<()> {
        let parsed = ParsedDeclaration::parse(declaration);
        if parsed.name.is_empty() {
            return Err(ErrorCode::INVALID_DECLARATION);
        }

        let mut state = self.state.lock();
        state
            .registrations
            .push(format!("method {type_name}::{declaration}"));
        state
            .methods
            .insert((type_name.to_string(), parsed.name), method);
        Ok(())
    }

    fn register_global_property(&self, declaration: &str, object: ObjectRef) -> ScriptResult<()> {
        let mut state = self.state.lock();
        let entry = if state.default_namespace.is_empty() {
            declaration.to_string()
        } else {
            format!("{} [{}]", declaration, state.default_namespace)
        };
        let mask = state.default_access_mask;
        state
            .registrations
            .push(format!("property {} (access {:#x})", entry, mask));
        state.globals.insert(entry, object);
        Ok(())
    }

    fn register_funcdef(&self, declaration: &str) -> ScriptResult<FunctionRef> {
        if !declaration.contains('(') {
            return Err(ErrorCode::INVALID_DECLARATION);
        }
        let namespace = self.default_namespace();
        self.log(format!("funcdef {declaration}"));
        Ok(self.funcdef(&namespace, declaration))
    }
}

/// Declaration parsed just far enough for the mock
struct ParsedDeclaration {
    name: String,
    params: Vec<TypeId>,
    return_type: TypeId,
}

impl ParsedDeclaration {
    fn parse(declaration: &str) -> Self {
        let (head, rest) = declaration.split_once('(').unwrap_or((declaration, ""));
        let mut words: Vec<&str> = head.split_whitespace().collect();
        let name = words.pop().unwrap_or_default().to_string();
        let return_type = words.last().map_or(TYPEID_VOID, |ty| type_id_of(ty));

        let params = rest
            .split(')')
            .next()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|param| !param.is_empty())
            .map(|param| {
                let ty = param
                    .trim_start_matches("const ")
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .trim_end_matches(['&', '@']);
                type_id_of(ty)
            })
            .collect();

        Self {
            name,
            params,
            return_type,
        }
    }
}

fn type_id_of(name: &str) -> TypeId {
    match name {
        "void" => TYPEID_VOID,
        "bool" => TYPEID_BOOL,
        "int8" => TYPEID_INT8,
        "int16" => TYPEID_INT16,
        "int" | "int32" => TYPEID_INT32,
        "int64" => TYPEID_INT64,
        "uint8" => TYPEID_UINT8,
        "uint16" => TYPEID_UINT16,
        "uint" | "uint32" => TYPEID_UINT32,
        "uint64" => TYPEID_UINT64,
        "float" => TYPEID_FLOAT,
        "double" => TYPEID_DOUBLE,
        // Enums such as HookReturnCode are passed as int32.
        "HookReturnCode" => TYPEID_INT32,
        _ => TYPEID_APPOBJECT,
    }
}

/// Mock module
pub struct MockModule {
    id: ModuleId,
    name: String,
    access_mask: u32,
    priority: i32,
}

impl MockModule {
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            id: ModuleId(id),
            name: name.to_string(),
            access_mask: u32::MAX,
            priority: 0,
        }
    }

    pub fn with_access_mask(mut self, mask: u32) -> Self {
        self.access_mask = mask;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn build(self) -> ModuleRef {
        Arc::new(self)
    }
}

impl ScriptModule for MockModule {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn access_mask(&self) -> u32 {
        self.access_mask
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// Mock script function with an observable reference count and call log
pub struct MockFunction {
    engine: Arc<MockEngine>,
    name: String,
    namespace: String,
    type_id: TypeId,
    module: Option<ModuleRef>,
    params: Vec<TypeId>,
    return_type: TypeId,
    delegate: Option<(FunctionRef, TypeInfo)>,
    behavior: Mutex<Behavior>,
    on_call: Option<OnCall>,
    refs: AtomicI32,
    calls: AtomicUsize,
    last_args: Mutex<Vec<ScriptValue>>,
    last_receiver: Mutex<Option<ObjectRef>>,
}

impl MockFunction {
    pub fn builder(engine: &Arc<MockEngine>, name: &str) -> MockFunctionBuilder {
        MockFunctionBuilder {
            engine: engine.clone(),
            name: name.to_string(),
            namespace: String::new(),
            type_id: TYPEID_APPOBJECT,
            module: None,
            params: Vec::new(),
            return_type: TYPEID_VOID,
            delegate: None,
            behavior: Behavior::Return(ScriptValue::Void),
            on_call: None,
        }
    }

    /// Current engine-side reference count; starts at 1
    pub fn ref_count(&self) -> i32 {
        self.refs.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_args(&self) -> Vec<ScriptValue> {
        self.last_args.lock().clone()
    }

    pub fn last_receiver<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.last_receiver
            .lock()
            .clone()
            .and_then(|object| object.downcast::<T>().ok())
    }

    /// Change what the function does on its next executions
    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

}

impl ScriptFunction for MockFunction {
    fn engine(&self) -> EngineRef {
        self.engine.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn declaration(&self) -> String {
        if self.namespace.is_empty() {
            format!("{}()", self.name)
        } else {
            format!("{}::{}()", self.namespace, self.name)
        }
    }

    fn type_id(&self) -> TypeId {
        self.type_id
    }

    fn module(&self) -> Option<ModuleRef> {
        self.module.clone()
    }

    fn param_count(&self) -> usize {
        self.params.len()
    }

    fn param_type_id(&self, index: usize) -> Option<TypeId> {
        self.params.get(index).copied()
    }

    fn return_type_id(&self) -> TypeId {
        self.return_type
    }

    fn delegate_function(&self) -> Option<FunctionRef> {
        self.delegate.as_ref().map(|(method, _)| method.clone())
    }

    fn delegate_object_type(&self) -> Option<TypeInfo> {
        self.delegate.as_ref().map(|(_, object_type)| object_type.clone())
    }

    fn is_compatible_with_type_id(&self, type_id: TypeId) -> bool {
        self.type_id == type_id
    }

    fn add_ref(&self) -> i32 {
        self.refs.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn release(&self) -> i32 {
        self.refs.fetch_sub(1, Ordering::SeqCst) - 1
    }
}

/// Builder for [`MockFunction`]
pub struct MockFunctionBuilder {
    engine: Arc<MockEngine>,
    name: String,
    namespace: String,
    type_id: TypeId,
    module: Option<ModuleRef>,
    params: Vec<TypeId>,
    return_type: TypeId,
    delegate: Option<(FunctionRef, TypeInfo)>,
    behavior: Behavior,
    on_call: Option<OnCall>,
}

impl MockFunctionBuilder {
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Signature type id of the function
    pub fn signature(mut self, type_id: TypeId) -> Self {
        self.type_id = type_id;
        self
    }

    pub fn module(mut self, module: &ModuleRef) -> Self {
        self.module = Some(module.clone());
        self
    }

    pub fn params(mut self, params: &[TypeId]) -> Self {
        self.params = params.to_vec();
        self
    }

    pub fn return_type(mut self, type_id: TypeId) -> Self {
        self.return_type = type_id;
        self
    }

    /// Make this a delegate of `method` bound to an object of `object_type`
    pub fn delegate_of(mut self, method: &FunctionRef, object_type: TypeInfo) -> Self {
        self.delegate = Some((method.clone(), object_type));
        self
    }

    pub fn returns(mut self, value: ScriptValue) -> Self {
        self.behavior = Behavior::Return(value);
        self
    }

    pub fn throws(mut self, message: &str) -> Self {
        self.behavior = Behavior::Throw(message.to_string());
        self
    }

    pub fn aborts(mut self) -> Self {
        self.behavior = Behavior::Abort;
        self
    }

    pub fn on_call<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[ScriptValue]) + Send + Sync + 'static,
    {
        self.on_call = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> Arc<MockFunction> {
        let function = Arc::new(MockFunction {
            engine: self.engine.clone(),
            name: self.name,
            namespace: self.namespace,
            type_id: self.type_id,
            module: self.module,
            params: self.params,
            return_type: self.return_type,
            delegate: self.delegate,
            behavior: Mutex::new(self.behavior),
            on_call: self.on_call,
            refs: AtomicI32::new(1),
            calls: AtomicUsize::new(0),
            last_args: Mutex::new(Vec::new()),
            last_receiver: Mutex::new(None),
        });

        self.engine
            .state
            .lock()
            .functions
            .push(Arc::downgrade(&function));
        function
    }
}

#[derive(Default)]
struct ContextState {
    function: Option<FunctionRef>,
    object: Option<ObjectRef>,
    args: Vec<Option<ScriptValue>>,
    return_value: Option<ScriptValue>,
}

/// Mock execution context
pub struct MockContext {
    engine: Weak<MockEngine>,
    state: Mutex<ContextState>,
}

impl MockContext {
    fn new(engine: Weak<MockEngine>) -> Self {
        Self {
            engine,
            state: Mutex::new(ContextState::default()),
        }
    }

    fn mock_engine(&self) -> Arc<MockEngine> {
        self.engine.upgrade().expect("mock engine dropped")
    }
}

impl ScriptContext for MockContext {
    fn engine(&self) -> EngineRef {
        self.mock_engine()
    }

    fn prepare(&self, function: &FunctionRef) -> ScriptResult<()> {
        let mut state = self.state.lock();
        *state = ContextState {
            function: Some(function.clone()),
            args: vec![None; function.param_count()],
            ..Default::default()
        };
        Ok(())
    }

    fn set_object(&self, object: &ObjectRef) -> ScriptResult<()> {
        let mut state = self.state.lock();
        if state.function.is_none() {
            return Err(ErrorCode::CONTEXT_NOT_PREPARED);
        }
        state.object = Some(object.clone());
        Ok(())
    }

    fn set_arg(&self, index: usize, value: &ScriptValue) -> ScriptResult<()> {
        let mut state = self.state.lock();
        let function = state
            .function
            .clone()
            .ok_or(ErrorCode::CONTEXT_NOT_PREPARED)?;
        let expected = function
            .param_type_id(index)
            .ok_or(ErrorCode::INVALID_ARG)?;

        if strip_handle(expected) != strip_handle(value.type_id()) {
            return Err(ErrorCode::INVALID_TYPE);
        }

        state.args[index] = Some(value.clone());
        Ok(())
    }

    fn execute(&self) -> ExecutionState {
        let (function, object, args) = {
            let state = self.state.lock();
            let Some(function) = state.function.clone() else {
                return ExecutionState::Uninitialized;
            };
            let Some(args) = state.args.iter().cloned().collect::<Option<Vec<_>>>() else {
                return ExecutionState::Error;
            };
            (function, state.object.clone(), args)
        };

        let Some(mock) = self.mock_engine().mock_function(&function) else {
            return ExecutionState::Error;
        };

        mock.calls.fetch_add(1, Ordering::SeqCst);
        *mock.last_args.lock() = args.clone();
        *mock.last_receiver.lock() = object;

        if let Some(on_call) = &mock.on_call {
            on_call(&args);
        }

        let behavior = mock.behavior.lock().clone();
        match behavior {
            Behavior::Return(value) => {
                self.state.lock().return_value = Some(value);
                ExecutionState::Finished
            }
            Behavior::Throw(message) => ExecutionState::Exception(message),
            Behavior::Abort => ExecutionState::Aborted,
        }
    }

    fn return_value(&self, type_id: TypeId) -> Option<ScriptValue> {
        if type_id == TYPEID_VOID {
            return None;
        }
        self.state.lock().return_value.clone()
    }

    fn unprepare(&self) -> ScriptResult<()> {
        *self.state.lock() = ContextState::default();
        Ok(())
    }
}
