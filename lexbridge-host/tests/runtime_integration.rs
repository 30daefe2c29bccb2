//! Integration tests for the scanner runtime.
//!
//! Covers module compilation and caching, instantiation failures, and the
//! async build path.

mod common;

use common::*;
use lexbridge_core::{BridgeConfig, BridgeError, EntryPoints};
use lexbridge_host::{CompiledScanner, ScannerRuntime, ScannerRuntimeConfig};
use std::sync::Arc;

#[test]
fn runtime_creation_custom_config() {
    let config = ScannerRuntimeConfig::default()
        .with_max_memory_pages(512)
        .with_fuel(true, 500_000)
        .with_epoch_interruption(true)
        .with_epoch_deadline(10)
        .with_cache(true);

    let runtime = ScannerRuntime::new(config).expect("Failed to create runtime");
    assert_eq!(runtime.initial_fuel(), Some(500_000));
    assert_eq!(runtime.epoch_deadline(), Some(10));
    assert_eq!(runtime.config().max_memory_pages, 512);
}

#[test]
fn runtime_rejects_invalid_config() {
    let config = ScannerRuntimeConfig::default().with_max_memory_pages(70_000);
    let err = ScannerRuntime::new(config).err().expect("Config accepted");
    assert_eq!(err.code(), "E401");
}

#[test]
fn module_compilation_invalid() {
    let runtime = runtime();
    let err = runtime
        .compile("garbage", b"not a wasm module")
        .expect_err("Garbage compiled");

    assert!(matches!(err, BridgeError::ModuleLoad { ref module, .. } if module == "garbage"));
    assert!(!err.is_recoverable());
}

#[test]
fn module_validation() {
    let runtime = runtime();
    assert!(runtime.validate(&guest(&[WORD_SCANNER])).is_ok());
    assert_eq!(
        runtime.validate(b"\0asm\x02\0\0\0").expect_err("Bad version accepted").code(),
        "E502"
    );
}

#[test]
fn module_caching() {
    let config = ScannerRuntimeConfig::testing().with_cache(true);
    let runtime = ScannerRuntime::new(config).expect("Failed to create runtime");
    let wasm = guest(&[WORD_SCANNER]);

    let first = runtime.compile("first", &wasm).expect("Compile failed");
    assert_eq!(runtime.cache_size(), 1);

    let second = runtime.compile("second", &wasm).expect("Compile failed");
    assert_eq!(runtime.cache_size(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.name(), "first");

    let other = runtime
        .compile("other", &guest(&[SETUP, DONE]))
        .expect("Compile failed");
    assert_eq!(runtime.cache_size(), 2);
    assert_ne!(other.hash(), first.hash());

    runtime.clear_cache();
    assert_eq!(runtime.cache_size(), 0);
}

#[test]
fn caching_disabled() {
    let runtime = runtime();
    let wasm = guest(&[WORD_SCANNER]);

    let first = runtime.compile("first", &wasm).expect("Compile failed");
    let second = runtime.compile("second", &wasm).expect("Compile failed");
    assert_eq!(runtime.cache_size(), 0);
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.hash(), second.hash());
}

#[test]
fn compiled_module_reports_exports() {
    let runtime = runtime();
    let module = runtime
        .compile("word", &guest(&[WORD_SCANNER]))
        .expect("Compile failed");

    let entry_points = EntryPoints::default();
    assert!(module.exports_func(&entry_points.setup));
    assert!(module.exports_func(&entry_points.step));
    assert!(!module.exports_func(&entry_points.post_instantiate));
}

#[test]
fn unsatisfied_import_fails_instantiation() {
    let runtime = runtime();
    let wasm = wat::parse_str(
        r#"(module
            (import "env" "_no_such_service" (func))
            (func (export "_xx_setup") (param i32))
            (func (export "_xx_run") (result i32) (i32.const 0)))"#,
    )
    .expect("Failed to parse WAT");
    let module = runtime.compile("needy", &wasm).expect("Compile failed");

    let err = lexbridge_host::instantiate(&runtime, &module, BridgeConfig::testing())
        .err()
        .expect("Instantiated");
    assert_eq!(err.code(), "E503");
}

#[test]
fn oversized_table_import_fails_instantiation() {
    let runtime = runtime();
    let wasm = wat::parse_str(
        r#"(module
            (import "env" "table" (table 3 funcref))
            (func (export "_xx_setup") (param i32))
            (func (export "_xx_run") (result i32) (i32.const 0)))"#,
    )
    .expect("Failed to parse WAT");
    let module = runtime.compile("wide_table", &wasm).expect("Compile failed");

    let err = lexbridge_host::instantiate(&runtime, &module, BridgeConfig::testing())
        .err()
        .expect("Instantiated");
    assert_eq!(err.code(), "E503");
}

#[test]
fn missing_step_export() {
    let runtime = runtime();
    let err = try_bridge(&runtime, &[SETUP], BridgeConfig::testing())
        .err()
        .expect("Instantiated");

    assert!(matches!(err, BridgeError::MissingExport { ref name, .. } if name == "_xx_run"));
    assert!(!err.is_recoverable());
}

#[test]
fn wrongly_typed_entry_point() {
    let runtime = runtime();
    let wrong = r#"
        (func (export "_xx_run") (param i32) (result i32)
            (local.get 0))
    "#;
    let err = try_bridge(&runtime, &[SETUP, wrong], BridgeConfig::testing())
        .err()
        .expect("Instantiated");
    assert!(matches!(err, BridgeError::MissingExport { ref name, .. } if name == "_xx_run"));
}

#[test]
fn custom_entry_point_names() {
    let runtime = runtime();
    let renamed = r#"
        (func (export "scan_init") (param i32))
        (func (export "scan_next") (result i32) (i32.const 0))
    "#;
    let entry_points = EntryPoints {
        setup: "scan_init".to_string(),
        step: "scan_next".to_string(),
        ..EntryPoints::default()
    };
    let config = BridgeConfig::testing().with_entry_points(entry_points);

    let mut bridge = bridge(&runtime, &[renamed], config);
    let summary = bridge.run_bytes(b"abc", |_| {}).expect("Run failed");
    assert_eq!(summary.steps, 1);
    assert_eq!(summary.tokens, 0);
}

#[test]
fn region_larger_than_runtime_limit() {
    let config = ScannerRuntimeConfig::testing().with_max_memory_pages(8);
    let runtime = ScannerRuntime::new(config).expect("Failed to create runtime");

    let err = try_bridge(&runtime, &[WORD_SCANNER], BridgeConfig::testing().with_pages(16))
        .err()
        .expect("Instantiated");
    assert_eq!(err.code(), "E401");
}

#[test]
fn trapping_post_instantiate_hook() {
    let runtime = runtime();
    let hook = r#"
        (func (export "__post_instantiate")
            (call $abort (i32.const 9)))
    "#;
    let err = try_bridge(&runtime, &[SETUP, DONE, hook], BridgeConfig::testing())
        .err()
        .expect("Instantiated");
    assert_eq!(err, BridgeError::GuestFault { code: 9 });
}

#[tokio::test]
async fn build_awaits_the_module() {
    let runtime = runtime();
    let wasm = guest(&[WORD_SCANNER]);

    let mut bridge = lexbridge_host::build(
        &runtime,
        async { runtime.compile("word", &wasm) },
        BridgeConfig::testing(),
    )
    .await
    .expect("Build failed");

    let tokens = bridge.collect(b"let x = 1;").expect("Run failed");
    assert_eq!(tokens.len(), 5);
}

#[tokio::test]
async fn build_from_blocking_compile() {
    let runtime = Arc::new(runtime());
    let compiling = {
        let runtime = Arc::clone(&runtime);
        let wasm = guest(&[WORD_SCANNER]);
        async move {
            tokio::task::spawn_blocking(move || runtime.compile("word", &wasm))
                .await
                .expect("Compile task panicked")
        }
    };

    let mut bridge = lexbridge_host::build(&runtime, compiling, BridgeConfig::default())
        .await
        .expect("Build failed");
    assert_eq!(bridge.collect(b"a b").expect("Run failed").len(), 2);
}

#[tokio::test]
async fn build_propagates_module_errors() {
    let runtime = runtime();
    let failed = std::future::ready(Err::<Arc<CompiledScanner>, _>(BridgeError::ModuleLoad {
        module: "remote".to_string(),
        cause: "fetch failed".to_string(),
    }));

    let err = lexbridge_host::build(&runtime, failed, BridgeConfig::testing())
        .await
        .err()
        .expect("Build succeeded");
    assert_eq!(err.code(), "E502");
}
