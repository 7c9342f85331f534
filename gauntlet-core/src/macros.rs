//! Registration macros.
//!
//! Each macro registers one [`TestDef`](crate::TestDef) with the global
//! registry. The body is any `fn(&mut TestContext) -> TestResult` item or
//! non-capturing closure.

/// Register a unit test, optionally with a per-test time limit in seconds.
///
/// ```ignore
/// fn run_sort_smoke(ctx: &mut TestContext) -> TestResult {
///     let mut v = vec![3, 1, 2];
///     v.sort();
///     if v != [1, 2, 3] {
///         return Err("sort produced wrong order".into());
///     }
///     Ok(())
/// }
///
/// gauntlet::unit_test!("algo", "sort_smoke", run_sort_smoke);
/// gauntlet::unit_test!("algo", "sort_big", 30.0, run_sort_big);
/// ```
#[macro_export]
macro_rules! unit_test {
    ($group:literal, $name:literal, $body:expr) => {
        $crate::__submit_test!(
            $group,
            $name,
            $crate::TestKind::Unit,
            ::core::option::Option::None,
            $body
        );
    };
    ($group:literal, $name:literal, $limit:expr, $body:expr) => {
        $crate::__submit_test!(
            $group,
            $name,
            $crate::TestKind::Unit,
            ::core::option::Option::Some($limit),
            $body
        );
    };
}

/// Register a performance test.
///
/// The body reports its measurements through
/// [`TestContext::record_stat`](crate::TestContext::record_stat); the runner
/// dumps them after execution.
#[macro_export]
macro_rules! perf_test {
    ($group:literal, $name:literal, $body:expr) => {
        $crate::__submit_test!(
            $group,
            $name,
            $crate::TestKind::Performance,
            ::core::option::Option::None,
            $body
        );
    };
}

/// Register a manual test.
#[macro_export]
macro_rules! manual_test {
    ($group:literal, $name:literal, $body:expr) => {
        $crate::__submit_test!(
            $group,
            $name,
            $crate::TestKind::Manual,
            ::core::option::Option::None,
            $body
        );
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __submit_test {
    ($group:literal, $name:literal, $kind:expr, $limit:expr, $body:expr) => {
        $crate::internal::inventory::submit! {
            $crate::TestDef {
                id: ::core::concat!($group, ".", $name),
                name: $name,
                group: $group,
                kind: $kind,
                time_limit_secs: $limit,
                runner_fn: $body,
                file: ::core::file!(),
                line: ::core::line!(),
                module_path: ::core::module_path!(),
            }
        }
    };
}
