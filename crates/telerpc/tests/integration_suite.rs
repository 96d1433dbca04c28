use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use rand::Rng;
use serde_json::json;
use tokio::sync::Barrier;

use telerpc::Context;
use telerpc::Dispatcher;
use telerpc::Error;
use telerpc::Manifest;
use telerpc::NullPolicy;
use telerpc::Registry;
use telerpc::Request;
use telerpc::UNDEFINED_SENTINEL;
use telerpc::Val;
use telerpc::ValidationErrorKind;
use telerpc::get_context;

const E2E: &str = "src/lib/tele/e2e.telephone.ts";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// --- Fixture functions ---

async fn hello(args: Vec<Val>) -> anyhow::Result<Val> {
    let name = args[0].as_str().unwrap_or_default();
    Ok(format!("Hello, {}!", name).into())
}

async fn add(args: Vec<Val>) -> anyhow::Result<Val> {
    match (args[0].as_f64(), args[1].as_f64()) {
        (Some(a), Some(b)) => Ok((a + b).into()),
        _ => anyhow::bail!("Invalid arguments: a and b must be numbers"),
    }
}

async fn error_function(_args: Vec<Val>) -> anyhow::Result<Val> {
    anyhow::bail!("This is a test error")
}

async fn function_with_no_args(_args: Vec<Val>) -> anyhow::Result<Val> {
    Ok("No arguments here!".into())
}

async fn function_with_optional_arg(args: Vec<Val>) -> anyhow::Result<Val> {
    let name = match args.first() {
        None | Some(Val::Undefined) => "world",
        Some(Val::String(name)) => name.as_str(),
        Some(other) => anyhow::bail!("Unexpected type of name:{}", other),
    };
    Ok(format!("Hello, {}!", name).into())
}

async fn process_object(args: Vec<Val>) -> anyhow::Result<Val> {
    let data = &args[0];
    let name = data.get("name").and_then(Val::as_str).unwrap_or_default();
    let age = data.get("age").and_then(Val::as_f64).unwrap_or_default();
    Ok(format!("Received object for {} who is {} years old.", name, age).into())
}

fn join_strings(val: Option<&Val>) -> String {
    val.and_then(Val::as_array)
        .unwrap_or_default()
        .iter()
        .filter_map(Val::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

async fn process_array(args: Vec<Val>) -> anyhow::Result<Val> {
    Ok(format!("Received array with items: {}.", join_strings(args.first())).into())
}

async fn process_mixed(args: Vec<Val>) -> anyhow::Result<Val> {
    let data = &args[0];
    let name = data
        .get("user")
        .and_then(|user| user.get("name"))
        .and_then(Val::as_str)
        .unwrap_or_default();
    Ok(format!("User {} has roles: {}.", name, join_strings(data.get("roles"))).into())
}

fn e2e_registry() -> anyhow::Result<Registry> {
    let registry = Registry::builder()
        .declare(E2E, "hello", "name: string", hello)
        .declare(E2E, "add", "a: number, b: number", add)
        .declare(E2E, "errorFunction", "", error_function)
        .declare(E2E, "functionWithNoArgs", "", function_with_no_args)
        .declare(E2E, "functionWithOptionalArg", "name?: string", function_with_optional_arg)
        .declare(E2E, "processObject", "data: { name: string; age: number }", process_object)
        .declare(E2E, "processArray", "data: string[]", process_array)
        .declare(
            E2E,
            "processMixed",
            "data: { user: { name: string }; roles: string[] }",
            process_mixed,
        )
        .value(E2E, "VERSION", "1.0.0")
        .build()?;
    Ok(registry)
}

fn call(function: &str, args: Vec<Val>) -> Request {
    Request::new(E2E, function, args)
}

// --- Test 1: Successful Calls ---

#[tokio::test]
async fn test_successful_calls() -> anyhow::Result<()> {
    init_tracing();
    let rpc = Dispatcher::new(e2e_registry()?);

    let cases = [
        (call("hello", vec!["Tester".into()]), json!("Hello, Tester!")),
        (call("add", vec![5.into(), 7.into()]), json!(12)),
        (call("functionWithNoArgs", vec![]), json!("No arguments here!")),
        (call("functionWithOptionalArg", vec!["User".into()]), json!("Hello, User!")),
        (call("functionWithOptionalArg", vec![]), json!("Hello, world!")),
    ];

    for (request, expected) in cases {
        let function = request.function_name.clone();
        let response = rpc.handle_route(request).await?;
        assert_eq!(response.to_json(), json!({ "result": expected }), "function: {function}");
    }
    Ok(())
}

#[tokio::test]
async fn test_structured_arguments() -> anyhow::Result<()> {
    init_tracing();
    let registry = e2e_registry()?;

    let object = Val::from(json!({ "name": "Ada", "age": 36, "extra": true }));
    let response = telerpc::handle_route(&registry, call("processObject", vec![object])).await?;
    assert_eq!(response.result.as_str(), Some("Received object for Ada who is 36 years old."));

    let array = Val::from(json!(["a", "b", "c"]));
    let response = telerpc::handle_route(&registry, call("processArray", vec![array])).await?;
    assert_eq!(response.result.as_str(), Some("Received array with items: a, b, c."));

    let mixed = Val::from(json!({ "user": { "name": "Bob" }, "roles": ["admin", "dev"] }));
    let response = telerpc::handle_route(&registry, call("processMixed", vec![mixed])).await?;
    assert_eq!(response.result.as_str(), Some("User Bob has roles: admin, dev."));
    Ok(())
}

// --- Test 2: Lookup Failures ---

#[tokio::test]
async fn test_unknown_namespace_and_function() -> anyhow::Result<()> {
    init_tracing();
    let rpc = Dispatcher::new(e2e_registry()?);

    let err = rpc
        .handle_route(Request::new("src/lib/tele/missing.ts", "hello", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NamespaceNotFound { .. }));
    assert_eq!(err.to_string(), "RPC filePath \"src/lib/tele/missing.ts\" not found.");

    let err = rpc.handle_route(call("nonExistentFunction", vec![])).await.unwrap_err();
    assert!(matches!(err, Error::FunctionNotFound { .. }));
    assert!(err.message().contains(&format!("RPC function \"{}:nonExistentFunction\" not found", E2E)));

    let err = rpc.handle_route(call("VERSION", vec![])).await.unwrap_err();
    assert!(matches!(err, Error::FunctionNotFound { .. }));
    Ok(())
}

// --- Test 3: Validation Rejections ---

#[tokio::test]
async fn test_validation_rejects_before_invocation() -> anyhow::Result<()> {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let registry = Registry::builder()
        .declare(E2E, "add", "a: number, b: number", move |args: Vec<Val>| {
            counter.fetch_add(1, Ordering::SeqCst);
            add(args)
        })
        .build()?;
    let rpc = Dispatcher::new(registry);

    let err = rpc.handle_route(call("add", vec![5.into(), "world".into()])).await.unwrap_err();
    let Error::Validation(validation) = &err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert_eq!(
        validation.kind,
        ValidationErrorKind::TypeMismatch {
            path: "b".into(),
            expected: "number".into(),
            found: "string",
        }
    );

    let err = rpc.handle_route(call("add", vec![5.into()])).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("RPC call to \"{}:add\": Expected 2 arguments, but got 1.", E2E)
    );

    assert_eq!(calls.load(Ordering::SeqCst), 0);

    rpc.handle_route(call("add", vec![5.into(), 7.into()])).await?;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_null_policy_is_configurable() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(e2e_registry()?);

    // Permissive: null reaches the function, which decides.
    let permissive = Dispatcher::new(registry.clone());
    let err = permissive
        .handle_route(call("add", vec![Val::Null, 1.into()]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Invocation { .. }));
    assert_eq!(err.message(), "Invalid arguments: a and b must be numbers");

    let strict = Dispatcher::builder(registry).null_policy(NullPolicy::Strict).build();
    let err = strict
        .handle_route(call("add", vec![Val::Null, 1.into()]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let response = strict.handle_route(call("functionWithOptionalArg", vec![Val::Undefined])).await?;
    assert_eq!(response.result.as_str(), Some("Hello, world!"));
    Ok(())
}

// --- Test 4: Invocation Failures ---

#[tokio::test]
async fn test_function_error_keeps_its_message() -> anyhow::Result<()> {
    init_tracing();
    let rpc = Dispatcher::new(e2e_registry()?);

    let err = rpc.handle_route(call("errorFunction", vec![])).await.unwrap_err();
    assert!(!err.is_pre_invocation());
    assert_eq!(err.message(), "This is a test error");
    assert_eq!(
        err.to_string(),
        format!("RPC call to \"{}:errorFunction\" failed: This is a test error", E2E)
    );
    Ok(())
}

#[tokio::test]
async fn test_panicking_function_becomes_invocation_error() -> anyhow::Result<()> {
    init_tracing();
    let registry = Registry::builder()
        .declare("ns", "explode", "", |_args: Vec<Val>| async move {
            if true {
                panic!("kaboom");
            }
            anyhow::Ok(Val::Undefined)
        })
        .build()?;
    let registry = Arc::new(registry);

    let rpc = Dispatcher::new(registry.clone());
    let err = rpc.handle_route(Request::new("ns", "explode", vec![])).await.unwrap_err();
    assert!(matches!(err, Error::Invocation { .. }));
    assert_eq!(err.message(), "kaboom");

    let unguarded = Dispatcher::builder(registry).catch_panics(false).build();
    let joined = tokio::spawn(async move {
        unguarded.handle_route(Request::new("ns", "explode", vec![])).await
    })
    .await;
    assert!(joined.unwrap_err().is_panic());
    Ok(())
}

// --- Test 5: JSON Surface ---

#[tokio::test]
async fn test_handle_json_status_and_bodies() -> anyhow::Result<()> {
    init_tracing();
    let rpc = Dispatcher::new(e2e_registry()?);

    let body = json!({ "filePath": E2E, "functionName": "add", "args": [5, 7] }).to_string();
    assert_eq!(rpc.handle_json(&body, Context::empty()).await, (200, json!({ "result": 12 })));

    let body = json!({ "filePath": E2E, "functionName": "errorFunction", "args": [] }).to_string();
    let (status, value) = rpc.handle_json(&body, Context::empty()).await;
    assert_eq!(status, 500);
    assert_eq!(value["error"]["message"], "This is a test error");

    let body = json!({ "filePath": E2E, "functionName": "hello", "args": [123] }).to_string();
    let (status, value) = rpc.handle_json(&body, Context::empty()).await;
    assert_eq!(status, 400);
    assert_eq!(value["error"]["kind"], "ValidationError");
    assert_eq!(
        value["error"]["message"],
        format!("RPC call to \"{}:hello\": Argument 'name' expected type 'string' but got 'number'.", E2E)
    );

    let (status, value) = rpc.handle_json("{ not json", Context::empty()).await;
    assert_eq!(status, 400);
    assert_eq!(value["error"]["kind"], "MalformedRequest");
    Ok(())
}

#[tokio::test]
async fn test_undefined_sentinel_in_json_args() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(e2e_registry()?);
    let body = json!({
        "filePath": E2E,
        "functionName": "functionWithOptionalArg",
        "args": [UNDEFINED_SENTINEL],
    })
    .to_string();

    let rpc = Dispatcher::new(registry.clone());
    let (status, value) = rpc.handle_json(&body, Context::empty()).await;
    assert_eq!((status, value), (200, json!({ "result": "Hello, world!" })));

    // Without substitution the sentinel is just a string.
    let raw = Dispatcher::builder(registry).undefined_sentinel(None).build();
    let (_, value) = raw.handle_json(&body, Context::empty()).await;
    assert_eq!(value["result"], format!("Hello, {}!", UNDEFINED_SENTINEL));
    Ok(())
}

#[tokio::test]
async fn test_sentinel_object_field_counts_as_missing() -> anyhow::Result<()> {
    init_tracing();
    let rpc = Dispatcher::new(e2e_registry()?);
    let body = json!({
        "filePath": E2E,
        "functionName": "processObject",
        "args": [{ "name": UNDEFINED_SENTINEL, "age": 3 }],
    })
    .to_string();

    let (status, value) = rpc.handle_json(&body, Context::empty()).await;
    assert_eq!(status, 400);
    assert_eq!(value["error"]["kind"], "ValidationError");
    assert_eq!(
        value["error"]["message"],
        format!("RPC call to \"{}:processObject\": Missing property 'name' in argument 'data'.", E2E)
    );
    Ok(())
}

// --- Test 6: Context Isolation ---

#[derive(Debug)]
struct Caller(&'static str);

fn caller_name() -> anyhow::Result<&'static str> {
    let context = get_context()?;
    let caller = context
        .get::<Caller>()
        .ok_or_else(|| anyhow::anyhow!("no caller in context"))?;
    Ok(caller.0)
}

#[tokio::test]
async fn test_interleaved_dispatches_see_their_own_context() -> anyhow::Result<()> {
    init_tracing();
    let barrier = Arc::new(Barrier::new(2));
    let registry = Registry::builder()
        .declare("ctx", "whoami", "", move |_args: Vec<Val>| {
            let barrier = barrier.clone();
            async move {
                let before = caller_name()?;
                // Both calls are suspended here at the same time.
                barrier.wait().await;
                let after = caller_name()?;
                anyhow::Ok(Val::Array(vec![before.into(), after.into()]))
            }
        })
        .build()?;
    let rpc = Dispatcher::new(registry);

    let alice = Request::new("ctx", "whoami", vec![]).with_context(Context::new(Caller("alice")));
    let bob = Request::new("ctx", "whoami", vec![]).with_context(Context::new(Caller("bob")));
    let (a, b) = tokio::join!(rpc.handle_route(alice), rpc.handle_route(bob));

    assert_eq!(a?.result, Val::Array(vec!["alice".into(), "alice".into()]));
    assert_eq!(b?.result, Val::Array(vec!["bob".into(), "bob".into()]));
    assert!(telerpc::get_context_or_none().is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatches_with_jitter() -> anyhow::Result<()> {
    init_tracing();
    let registry = Registry::builder()
        .declare("ctx", "echo", "tag: number", |args: Vec<Val>| async move {
            let delay = rand::thread_rng().gen_range(0..5u64);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            let context = get_context()?;
            let mine = context.get::<usize>().copied().unwrap_or(usize::MAX);
            anyhow::Ok(Val::Array(vec![args[0].clone(), (mine as f64).into()]))
        })
        .build()?;
    let rpc = Arc::new(Dispatcher::new(registry));

    let mut handles = Vec::new();
    for i in 0..64usize {
        let rpc = rpc.clone();
        handles.push(tokio::spawn(async move {
            let request = Request::new("ctx", "echo", vec![(i as f64).into()]).with_context(Context::new(i));
            rpc.handle_route(request).await
        }));
    }

    for handle in handles {
        let response = handle.await??;
        let pair = response.result.as_array().unwrap_or_default().to_vec();
        assert_eq!(pair.len(), 2);
        assert_eq!(pair[0], pair[1]);
    }
    Ok(())
}

#[tokio::test]
async fn test_context_unavailable_inside_spawned_task() -> anyhow::Result<()> {
    init_tracing();
    let registry = Registry::builder()
        .declare("ctx", "detached", "", |_args: Vec<Val>| async move {
            let detached = tokio::spawn(async { get_context().is_err() }).await?;
            let carried = tokio::spawn(telerpc::propagate(async { caller_name().ok() })).await?;
            anyhow::Ok(Val::Array(vec![detached.into(), carried.into()]))
        })
        .build()?;

    let request = Request::new("ctx", "detached", vec![]).with_context(Context::new(Caller("carol")));
    let response = Dispatcher::new(registry).handle_route(request).await?;
    assert_eq!(response.result, Val::Array(vec![true.into(), "carol".into()]));
    Ok(())
}

// --- Test 7: Manifest Binding ---

#[tokio::test]
async fn test_registry_from_manifest_json() -> anyhow::Result<()> {
    init_tracing();
    let manifest = Manifest::from_json(
        r#"{
            "src/lib/tele/e2e.telephone.ts": {
                "hello": [{ "name": "name", "type": "string" }],
                "processObject": [
                    { "name": "data", "type": { "name": "string", "age": "number" } }
                ]
            }
        }"#,
    )?;

    let registry = Registry::from_manifest(&manifest)
        .bind(E2E, "hello", hello)?
        .bind(E2E, "processObject", process_object)?
        .build()?;
    let rpc = Dispatcher::new(registry);

    let response = rpc.handle_route(call("hello", vec!["Manifest".into()])).await?;
    assert_eq!(response.result.as_str(), Some("Hello, Manifest!"));

    let partial = Val::from(json!({ "name": "Ada" }));
    let err = rpc.handle_route(call("processObject", vec![partial])).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("RPC call to \"{}:processObject\": Missing property 'age' in argument 'data'.", E2E)
    );

    assert_eq!(rpc.registry().manifest(), manifest);
    Ok(())
}
