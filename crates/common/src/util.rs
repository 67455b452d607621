/// Log error with [`core::fmt::Debug`] impl or [`core::fmt::Display`] if called with leading `%`
#[macro_export]
macro_rules! err {
    ($e:expr) => {
        if let Err(e) = $e {
            log::error!("[{}:{}] {e:?}", file!(), line!())
        }
    };
    ($e:expr, $s:expr) => {
        if let Err(e) = $e {
            let s = $s;
            log::error!("[{}:{}] - {s}: {e:?}", file!(), line!())
        }
    };
    (%$e:expr) => {
        if let Err(e) = $e {
            log::error!("[{}:{}] {e}", file!(), line!())
        }
    };
}

/// Extra `unwrap`-like methods for results that can't be propagated, e.g. inside a timer or a firmware event.
pub trait UnwrapExt {
    type T;
    /// Indicates an assertion that should be true but isn't worth failing over.
    fn unwrap_or_log(self, msg: impl core::fmt::Display);
    /// Convert to [`Option`], logging the error with `msg` as context.
    fn ok_or_log(self, msg: impl core::fmt::Display) -> Option<Self::T>;
}
impl<T> UnwrapExt for Option<T> {
    type T = T;

    fn unwrap_or_log(self, msg: impl core::fmt::Display) {
        if self.is_none() {
            log::error!("{msg}")
        }
    }
    fn ok_or_log(self, msg: impl core::fmt::Display) -> Option<T> {
        if self.is_none() {
            log::error!("{msg}: none")
        }
        self
    }
}
impl<T, E: core::fmt::Debug> UnwrapExt for Result<T, E> {
    type T = T;

    fn unwrap_or_log(self, msg: impl core::fmt::Display) {
        if let Err(e) = self {
            log::error!("{msg}: {e:?}")
        }
    }
    fn ok_or_log(self, msg: impl core::fmt::Display) -> Option<T> {
        match self {
            Ok(x) => Some(x),
            Err(e) => {
                log::error!("{msg}: {e:?}");
                None
            }
        }
    }
}
