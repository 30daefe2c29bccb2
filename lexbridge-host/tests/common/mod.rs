//! Scanner guests and helpers shared by the integration tests.

#![allow(dead_code)]

use lexbridge_core::{Bridge, BridgeConfig, Result};
use lexbridge_host::{ScannerRuntime, ScannerRuntimeConfig, WasmScanner};

/// Every `env` import a guest may link against, plus scratch globals.
const PRELUDE: &str = r#"
    (import "env" "memory" (memory 1))
    (import "env" "table" (table 2 funcref))
    (import "env" "__memory_base" (global $memory_base i32))
    (import "env" "__table_base" (global $table_base i32))
    (import "env" "_memset" (func $memset (param i32 i32 i32) (result i32)))
    (import "env" "_memcpy" (func $memcpy (param i32 i32 i32) (result i32)))
    (import "env" "abort" (func $abort (param i32)))
    (import "env" "_token_callback" (func $emit (param i32 i32 i32 i32 i32)))
    (global $start (mut i32) (i32.const 0))
    (global $steps (mut i32) (i32.const 0))
"#;

/// Remembers the input offset and resets the step counter.
pub const SETUP: &str = r#"
    (func (export "_xx_setup") (param $start i32)
        (global.set $start (local.get $start))
        (global.set $steps (i32.const 0)))
"#;

/// Words (`[A-Za-z0-9_]+`) and single punctuation bytes, one per step.
///
/// Bytes up to 0x20 are whitespace, `\n` advances the line. Words are
/// tagged 13, punctuation 3.
pub const WORD_SCANNER: &str = r#"
    (global $pos (mut i32) (i32.const 0))
    (global $line (mut i32) (i32.const 1))

    (func $is_word (param $c i32) (result i32)
        (i32.or
            (i32.or
                (i32.lt_u (i32.sub (local.get $c) (i32.const 48)) (i32.const 10))
                (i32.lt_u
                    (i32.sub (i32.or (local.get $c) (i32.const 32)) (i32.const 97))
                    (i32.const 26)))
            (i32.eq (local.get $c) (i32.const 95))))

    (func (export "_xx_setup") (param $start i32)
        (global.set $pos (local.get $start))
        (global.set $line (i32.const 1)))

    (func (export "_xx_run") (result i32)
        (local $c i32)
        (local $begin i32)
        (local $type i32)
        (block $found
            (loop $skip
                (local.set $c (i32.load8_u (global.get $pos)))
                (br_if $found (i32.gt_u (local.get $c) (i32.const 32)))
                (if (i32.eqz (local.get $c))
                    (then (return (i32.const 0))))
                (if (i32.eq (local.get $c) (i32.const 10))
                    (then (global.set $line (i32.add (global.get $line) (i32.const 1)))))
                (global.set $pos (i32.add (global.get $pos) (i32.const 1)))
                (br $skip)))
        (local.set $begin (global.get $pos))
        (global.set $pos (i32.add (global.get $pos) (i32.const 1)))
        (local.set $type (i32.const 3))
        (if (call $is_word (local.get $c))
            (then
                (local.set $type (i32.const 13))
                (block $end
                    (loop $word
                        (br_if $end
                            (i32.eqz (call $is_word (i32.load8_u (global.get $pos)))))
                        (global.set $pos (i32.add (global.get $pos) (i32.const 1)))
                        (br $word)))))
        (call $emit
            (local.get $begin)
            (i32.sub (global.get $pos) (local.get $begin))
            (global.get $line)
            (local.get $type)
            (i32.const 0))
        (i32.const 1))
"#;

/// Emits the first three input bytes, then fails with -1 on the second step.
pub const FAIL_ON_SECOND_STEP: &str = r#"
    (func (export "_xx_run") (result i32)
        (global.set $steps (i32.add (global.get $steps) (i32.const 1)))
        (if (i32.eq (global.get $steps) (i32.const 1))
            (then
                (call $emit (global.get $start) (i32.const 3) (i32.const 1) (i32.const 14) (i32.const 0))
                (return (i32.const 1))))
        (i32.const -1))
"#;

/// Emits a token, then aborts with 42.
pub const ABORT_42: &str = r#"
    (func (export "_xx_run") (result i32)
        (call $emit (global.get $start) (i32.const 3) (i32.const 1) (i32.const 14) (i32.const 0))
        (call $abort (i32.const 42))
        (i32.const 1))
"#;

/// Fills 16 bytes at the stack base with 0xAB, then finishes.
pub const FILL_STACK: &str = r#"
    (func (export "_xx_run") (result i32)
        (drop (call $memset (global.get $memory_base) (i32.const 0x1AB) (i32.const 16)))
        (i32.const 0))
"#;

/// Fills 16 bytes starting 6 bytes before the end of the last page.
pub const FILL_PAST_END: &str = r#"
    (func (export "_xx_run") (result i32)
        (drop (call $memset
            (i32.add (global.get $memory_base) (i32.const 65530))
            (i32.const 0)
            (i32.const 16)))
        (i32.const 0))
"#;

/// Moves the first four input bytes one to the right and emits five bytes.
pub const OVERLAPPING_COPY: &str = r#"
    (func (export "_xx_run") (result i32)
        (drop (call $memcpy
            (i32.add (global.get $start) (i32.const 1))
            (global.get $start)
            (i32.const 4)))
        (call $emit (global.get $start) (i32.const 5) (i32.const 1) (i32.const 10) (i32.const 0))
        (i32.const 0))
"#;

/// Copies from an offset that wraps past the end of the region.
pub const COPY_PAST_END: &str = r#"
    (func (export "_xx_run") (result i32)
        (drop (call $memcpy (i32.const 0) (i32.const -16) (i32.const 32)))
        (i32.const 0))
"#;

/// Calls the trampoline from setup instead of from a step.
pub const EMIT_IN_SETUP: &str = r#"
    (func (export "_xx_setup") (param $start i32)
        (call $emit (local.get $start) (i32.const 1) (i32.const 1) (i32.const 1) (i32.const 0)))

    (func (export "_xx_run") (result i32)
        (i32.const 0))
"#;

/// Emits a token that starts before the staging window.
pub const EMIT_BEFORE_INPUT: &str = r#"
    (func (export "_xx_run") (result i32)
        (call $emit (i32.const 0) (i32.const 1) (i32.const 1) (i32.const 1) (i32.const 0))
        (i32.const 0))
"#;

/// Never finishes a step.
pub const SPIN: &str = r#"
    (func (export "_xx_run") (result i32)
        (loop $spin (br $spin))
        (i32.const 0))
"#;

/// Asks for another step forever, emitting nothing.
pub const ALWAYS_CONTINUE: &str = r#"
    (func (export "_xx_run") (result i32)
        (i32.const 1))
"#;

/// Finishes immediately.
pub const DONE: &str = r#"
    (func (export "_xx_run") (result i32)
        (i32.const 0))
"#;

/// Records the base globals at offsets 0 and 4 and a marker at 16.
pub const POST_INSTANTIATE: &str = r#"
    (func (export "__post_instantiate")
        (i32.store (i32.const 0) (global.get $memory_base))
        (i32.store (i32.const 4) (global.get $table_base))
        (i32.store8 (i32.const 16) (i32.const 7)))
"#;

/// Assemble a guest from the shared imports and `parts`.
pub fn guest(parts: &[&str]) -> Vec<u8> {
    let source = format!("(module {PRELUDE} {})", parts.join("\n"));
    wat::parse_str(source).expect("Failed to parse WAT")
}

/// Runtime with fuel metering and no module cache.
pub fn runtime() -> ScannerRuntime {
    ScannerRuntime::new(ScannerRuntimeConfig::testing()).expect("Failed to create runtime")
}

/// Compile `parts` and instantiate them behind a bridge.
pub fn try_bridge(
    runtime: &ScannerRuntime,
    parts: &[&str],
    config: BridgeConfig,
) -> Result<Bridge<WasmScanner>> {
    let module = runtime.compile("test_guest", &guest(parts))?;
    lexbridge_host::instantiate(runtime, &module, config)
}

/// Like [`try_bridge`], panicking on failure.
pub fn bridge(runtime: &ScannerRuntime, parts: &[&str], config: BridgeConfig) -> Bridge<WasmScanner> {
    try_bridge(runtime, parts, config).expect("Failed to build bridge")
}

/// Word scanner on a test-sized region.
pub fn word_bridge(runtime: &ScannerRuntime) -> Bridge<WasmScanner> {
    bridge(runtime, &[WORD_SCANNER], BridgeConfig::testing())
}
