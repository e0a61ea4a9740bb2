//! End-to-end scenarios exercised through the public façade rather than any
//! one module in isolation. The three that need a real `python3` interpreter
//! are ignored by default.
//!
//! Run everything, including the interpreter-backed ones, with:
//! `cargo test -p toolindex-core -- --ignored`

use std::collections::HashMap;
use std::fs;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use serde_json::{json, Value};

use toolindex_core::{
    CallOutput, Default as ParamDefault, IndexBuilder, IndexConfig, IndexError, InlineTool,
    NameError, ParamDescriptor, ParamKind, TypeTag,
};

struct Greet;

impl InlineTool for Greet {
    const NAME: &'static str = "mock.greet";
    const DESCRIPTION: &'static str = "Greets someone by name.";

    fn params() -> Vec<ParamDescriptor> {
        vec![
            ParamDescriptor {
                name: "name".into(),
                kind: ParamKind::PositionalOrKeyword,
                default: ParamDefault::None,
                type_tag: TypeTag::String,
            },
            ParamDescriptor {
                name: "excited".into(),
                kind: ParamKind::PositionalOrKeyword,
                default: ParamDefault::Value(json!(false)),
                type_tag: TypeTag::Boolean,
            },
        ]
    }

    fn return_type() -> TypeTag {
        TypeTag::String
    }

    fn call(&self, args: Value) -> BoxFuture<'static, Result<CallOutput, IndexError>> {
        async move {
            let name = args.get("name").and_then(Value::as_str).unwrap_or_default();
            let excited = args.get("excited").and_then(Value::as_bool).unwrap_or(false);
            let greeting = if excited {
                format!("Hello, {name}!")
            } else {
                format!("Hello, {name}")
            };
            Ok(CallOutput::Single(json!(greeting)))
        }
        .boxed()
    }
}

#[tokio::test]
async fn scenario_1_inline_defaults_reinject_on_omission_and_explicit_null() {
    let index = IndexBuilder::new(IndexConfig::default())
        .with_tool(Greet)
        .build()
        .unwrap();

    let out = index
        .execute("mock.greet", json!({"name": "Ada"}))
        .await
        .unwrap();
    assert_eq!(out, json!("Hello, Ada"));

    let out = index
        .execute("mock.greet", json!({"name": "Ada", "excited": null}))
        .await
        .unwrap();
    assert_eq!(out, json!("Hello, Ada"));
}

struct RestrictedMode;

impl InlineTool for RestrictedMode {
    const NAME: &'static str = "mock.mode";
    const DESCRIPTION: &'static str = "Doubles a restricted integer mode.";

    fn params() -> Vec<ParamDescriptor> {
        vec![ParamDescriptor {
            name: "bar".into(),
            kind: ParamKind::PositionalOrKeyword,
            default: ParamDefault::None,
            type_tag: TypeTag::Literal {
                values: vec![json!(1), json!(2), json!(3)],
            },
        }]
    }

    fn return_type() -> TypeTag {
        TypeTag::Integer
    }

    fn call(&self, args: Value) -> BoxFuture<'static, Result<CallOutput, IndexError>> {
        async move {
            let bar = args.get("bar").and_then(Value::as_i64).unwrap_or(0);
            Ok(CallOutput::Single(json!(bar * 2)))
        }
        .boxed()
    }
}

#[tokio::test]
async fn scenario_2_restricted_integer_values_round_trip_through_schema_and_call() {
    let index = IndexBuilder::new(IndexConfig::default())
        .with_tool(RestrictedMode)
        .build()
        .unwrap();

    let schema = index
        .schema("mock.mode", toolindex_core::Dialect::Anthropic)
        .unwrap();
    let enum_values = schema["input_schema"]["properties"]["bar"]["enum"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    assert_eq!(enum_values, vec![json!("1"), json!("2"), json!("3")]);

    let out = index
        .execute("mock.mode", json!({"bar": "2"}))
        .await
        .unwrap();
    assert_eq!(out, json!(4));
}

struct AFoo;

impl InlineTool for AFoo {
    const NAME: &'static str = "a.foo";
    const DESCRIPTION: &'static str = "First foo.";

    fn params() -> Vec<ParamDescriptor> {
        vec![]
    }

    fn return_type() -> TypeTag {
        TypeTag::String
    }

    fn call(&self, _args: Value) -> BoxFuture<'static, Result<CallOutput, IndexError>> {
        async move { Ok(CallOutput::Single(json!("a"))) }.boxed()
    }
}

struct BFoo;

impl InlineTool for BFoo {
    const NAME: &'static str = "b.foo";
    const DESCRIPTION: &'static str = "Second foo.";

    fn params() -> Vec<ParamDescriptor> {
        vec![]
    }

    fn return_type() -> TypeTag {
        TypeTag::String
    }

    fn call(&self, _args: Value) -> BoxFuture<'static, Result<CallOutput, IndexError>> {
        async move { Ok(CallOutput::Single(json!("b"))) }.boxed()
    }
}

#[tokio::test]
async fn scenario_6_ambiguous_short_name_names_both_candidates() {
    let index = IndexBuilder::new(IndexConfig::default())
        .with_tool(AFoo)
        .with_tool(BFoo)
        .build()
        .unwrap();

    let err = index.execute("foo", json!({})).await.unwrap_err();
    match err {
        IndexError::Name(NameError::Ambiguous { query, candidates }) => {
            assert_eq!(query, "foo");
            assert_eq!(candidates, vec!["a.foo".to_string(), "b.foo".to_string()]);
        }
        other => panic!("expected an ambiguous-name error, got {other:?}"),
    }

    let out = index.execute("a.foo", json!({})).await.unwrap();
    assert_eq!(out, json!("a"));
}

#[test]
fn scenario_6_duplicate_tool_name_fails_construction() {
    let result = IndexBuilder::new(IndexConfig::default())
        .with_tool(AFoo)
        .with_tool(AFoo)
        .build();
    assert!(matches!(result, Err(IndexError::Name(NameError::Duplicate { .. }))));
}

fn write_manifest(dir: &std::path::Path, tools: &[&str]) {
    let list = tools
        .iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(", ");
    fs::write(dir.join("tools.toml"), format!("[index]\ntools = [{list}]\n")).unwrap();
}

/// These three need a real `python3` on `PATH` to spawn the extractor and
/// runner subprocesses against; they're skipped in ordinary `cargo test`
/// runs. Run with: `cargo test -p toolindex-core -- --ignored`
#[tokio::test]
#[ignore]
async fn scenario_3_local_manifest_of_three_tools_each_callable() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), &["mock.alpha", "mock.beta", "mock.gamma"]);
    fs::write(
        dir.path().join("mock.py"),
        r#"
def alpha(name: str) -> str:
    return f"hello {name}"

def beta(x: int, y: int = 1) -> int:
    return x + y

def gamma() -> str:
    return "gamma"
"#,
    )
    .unwrap();
    fs::write(dir.path().join("requirements.txt"), "").unwrap();

    let index = IndexBuilder::new(IndexConfig::default())
        .with_source(dir.path().to_str().unwrap())
        .build()
        .unwrap();

    assert!(toolindex_core::manifest::Manifest::hash_file_path(dir.path()).exists());

    assert_eq!(
        index.execute("mock.alpha", json!({"name": "Ada"})).await.unwrap(),
        json!("hello Ada")
    );
    assert_eq!(
        index.execute("mock.beta", json!({"x": 2, "y": 3})).await.unwrap(),
        json!(5)
    );
    assert_eq!(index.execute("mock.gamma", json!({})).await.unwrap(), json!("gamma"));
}

#[tokio::test]
#[ignore]
async fn scenario_4_async_generator_streams_in_order_and_drains_to_last_value() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), &["mock.lettered"]);
    fs::write(
        dir.path().join("mock.py"),
        r#"
async def lettered():
    for letter in ("a", "b", "c"):
        yield letter
"#,
    )
    .unwrap();

    let index = IndexBuilder::new(IndexConfig::default())
        .with_source(dir.path().to_str().unwrap())
        .build()
        .unwrap();

    let stream = index.stream_execute("mock.lettered", json!({})).await.unwrap();
    let values: Vec<Value> = stream.map(|v| v.unwrap()).collect().await;
    assert_eq!(values, vec![json!("a"), json!("b"), json!("c")]);

    let last = index.execute("mock.lettered", json!({})).await.unwrap();
    assert_eq!(last, json!("c"));
}

#[tokio::test]
#[ignore]
async fn scenario_5_per_source_env_vars_are_isolated() {
    // SAFETY: this test owns the process env var it's setting and nothing
    // else in this single-threaded-per-test binary reads or writes it.
    unsafe {
        std::env::set_var("HOSTONLY", "leaked");
    }

    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), &["mock.read_env"]);
    fs::write(
        dir.path().join("mock.py"),
        r#"
import os

def read_env() -> str:
    token = os.environ.get("TOKEN", "missing")
    hostonly = os.environ.get("HOSTONLY", "absent")
    return f"{token}/{hostonly}"
"#,
    )
    .unwrap();

    let source_id = dir.path().to_str().unwrap().to_string();
    let mut env_vars = HashMap::new();
    env_vars.insert(source_id.clone(), HashMap::from([("TOKEN".to_string(), "xyz".to_string())]));

    let config = IndexConfig::default().with_env_vars(env_vars);
    let index = IndexBuilder::new(config).with_source(&source_id).build().unwrap();

    let out = index.execute("mock.read_env", json!({})).await.unwrap();
    assert_eq!(out, json!("xyz/absent"));

    // SAFETY: see above.
    unsafe {
        std::env::remove_var("HOSTONLY");
    }
}
