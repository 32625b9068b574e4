//! Sample harness test module
//!
//! Built as a `cdylib`, this library is something the harness can load and
//! run. It deliberately contains one case of every kind: passing and failing
//! static tests, an error-returning test, async tests, instance methods, a
//! group whose constructor fails, a parameterized case and an unmarked helper.

use harness_abi::{
    export_async_test, export_constructor, export_destructor, export_manifest, export_method,
    export_test, MethodEntry, ModuleManifest, TypeEntry,
};

const TEST: &str = "core::prelude::v1::test";
const RSTEST: &str = "rstest::rstest";
const CASE: &str = "rstest::case";

fn parse_amount(text: &str) -> Result<i64, String> {
    text.trim()
        .parse()
        .map_err(|e| format!("invalid amount '{}': {}", text, e))
}

export_test!(sample_math_adds, || assert_eq!(2 + 2, 4));

export_test!(sample_math_overflows, || {
    let total = 250u8.checked_add(10);
    assert!(total.is_some(), "expected 250 + 10 to fit in a u8");
});

export_test!(sample_parse_rejects_garbage, || -> Result<(), String> {
    parse_amount("12x")?;
    Ok(())
});

export_test!(sample_helper, || {});

export_async_test!(sample_async_ready, async {
    let value = async { parse_amount(" 42 ") }.await;
    assert_eq!(value, Ok(42));
});

export_async_test!(sample_async_rejects, async {
    let value = async { parse_amount("forty") }.await;
    assert!(value.is_ok(), "async parse failed: {:?}", value);
});

/// Instance state for the ledger group
#[derive(Default)]
pub struct Ledger {
    entries: Vec<i64>,
}

impl Ledger {
    fn balance(&self) -> i64 {
        self.entries.iter().sum()
    }
}

export_constructor!(sample_ledger_new, Ledger);
export_destructor!(sample_ledger_drop, Ledger);

export_method!(sample_ledger_starts_empty, Ledger, |ledger: &mut Ledger| {
    assert_eq!(ledger.balance(), 0);
});

export_method!(sample_ledger_records, Ledger, |ledger: &mut Ledger| {
    ledger.entries.push(5);
    ledger.entries.push(-2);
    assert_eq!(ledger.balance(), 3);
});

export_method!(sample_ledger_applies_amount, Ledger, |_: &mut Ledger| {});

/// A group that cannot be instantiated
pub struct Vault;

export_constructor!(sample_vault_new, Vault, || Err::<Vault, _>(
    "vault key file is missing"
));

export_method!(sample_vault_opens, Vault, |_: &mut Vault| {});

/// The manifest describing every entry point above
pub fn manifest() -> ModuleManifest {
    ModuleManifest::new("harness.sample.tests")
        .with_type(
            TypeEntry::new("sample::math")
                .with_method(MethodEntry::new("adds", "sample_math_adds").marker(TEST))
                .with_method(MethodEntry::new("overflows", "sample_math_overflows").marker(TEST))
                .with_method(
                    MethodEntry::new("parse_rejects_garbage", "sample_parse_rejects_garbage")
                        .marker(RSTEST),
                )
                .with_method(MethodEntry::new("helper", "sample_helper"))
                .with_method(MethodEntry::new("async_ready", "sample_async_ready").marker(TEST))
                .with_method(
                    MethodEntry::new("async_rejects", "sample_async_rejects").marker(TEST),
                ),
        )
        .with_type(
            TypeEntry::new("sample::Ledger")
                .constructor("sample_ledger_new")
                .destructor("sample_ledger_drop")
                .with_method(
                    MethodEntry::new("starts_empty", "sample_ledger_starts_empty")
                        .marker(TEST)
                        .instance(),
                )
                .with_method(
                    MethodEntry::new("records", "sample_ledger_records")
                        .marker(RSTEST)
                        .marker(TEST)
                        .instance(),
                )
                .with_method(
                    MethodEntry::new("applies_amount", "sample_ledger_applies_amount")
                        .marker(CASE)
                        .parameter("amount", "i64")
                        .instance(),
                ),
        )
        .with_type(
            TypeEntry::new("sample::Vault")
                .constructor("sample_vault_new")
                .with_method(
                    MethodEntry::new("opens", "sample_vault_opens")
                        .marker(TEST)
                        .instance(),
                ),
        )
}

export_manifest!(manifest());
