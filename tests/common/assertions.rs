//! Assertion macros for engine and pad tests

/// Unwraps an `Ok`, panicking with the error's `Debug` output otherwise.
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("expected Ok, got Err({:?})", e),
        }
    };
    ($result:expr, $context:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $context, e),
        }
    };
}

/// Asserts the result is an error matching `$pattern`.
#[macro_export]
macro_rules! assert_err {
    ($result:expr, $pattern:pat) => {
        match $result {
            Err($pattern) => {}
            Err(e) => panic!("unexpected error variant: {:?}", e),
            Ok(_) => panic!("expected Err({}), got Ok", stringify!($pattern)),
        }
    };
}

/// Asserts a server frame has the given kind, as named by `fixtures::frame_kind`.
#[macro_export]
macro_rules! assert_frame {
    ($frame:expr, $kind:expr) => {{
        let frame: &serde_json::Value = &$frame;
        assert_eq!($crate::common::fixtures::frame_kind(frame), $kind, "unexpected frame: {}", frame);
    }};
}

/// Asserts a frame is `{"disconnect": reason}`.
#[macro_export]
macro_rules! assert_disconnect {
    ($frame:expr, $reason:expr) => {{
        let frame: serde_json::Value = $frame;
        assert_eq!(frame, serde_json::json!({ "disconnect": $reason }), "not a {} kick", $reason);
    }};
}

/// Asserts a frame is the access-denied reply to CLIENT_READY.
#[macro_export]
macro_rules! assert_denied {
    ($frame:expr) => {{
        let frame: serde_json::Value = $frame;
        assert_eq!(frame, serde_json::json!({ "accessStatus": "deny" }));
    }};
}
