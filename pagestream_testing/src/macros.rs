//! Assertion macros shared by integration tests.

/// Await a future yielding `Option<T>` with a one second deadline and panic
/// with contextual diagnostics on timeout or `None`.
#[macro_export]
macro_rules! next_expect {
    ($fut:expr) => {{
        ::tokio::time::timeout(::std::time::Duration::from_secs(1), $fut)
            .await
            .expect(concat!("timed out at ", file!(), ":", line!()))
            .expect(concat!("stream ended at ", file!(), ":", line!()))
    }};
    ($fut:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        ::tokio::time::timeout(::std::time::Duration::from_secs(1), $fut)
            .await
            .expect(&m)
            .expect(&m)
    }};
}

/// Assert that a future yielding `Option<T>` does not produce a value within
/// 50 milliseconds, or resolves to `None`.
#[macro_export]
macro_rules! assert_quiet {
    ($fut:expr) => {{
        if let Ok(Some(item)) =
            ::tokio::time::timeout(::std::time::Duration::from_millis(50), $fut).await
        {
            panic!(
                "unexpected item {:?} at {}:{}",
                item,
                file!(),
                line!()
            );
        }
    }};
}

pub use crate::{assert_quiet, next_expect};
