#[macro_export]
macro_rules! err_create {
    ($t:expr) => {
        $crate::error::WalletError::from_bag(
            $crate::error::ErrorBag::from($t),
            file!(),
            line!(),
        )
    };
}

#[macro_export]
macro_rules! err_custom_create {
    ($($t:tt)*) => {
        $crate::error::WalletError::from_bag(
            $crate::error::ErrorBag::CustomError($crate::error::CustomError::new(&format!($($t)*))),
            file!(),
            line!(),
        )
    };
}

#[macro_export]
macro_rules! err_from {
    () => {
        |e| $crate::error::WalletError::from_bag($crate::error::ErrorBag::from(e), file!(), line!())
    };
}

/// Business rule rejection, e.g. `err_reject!(InvalidParams, "invalid_gas", "Invalid Gas")`
#[macro_export]
macro_rules! err_reject {
    ($kind:ident, $id:expr, $($t:tt)*) => {
        $crate::error::WalletError::from_bag(
            $crate::error::ErrorBag::Rejected($crate::error::RejectedError::new(
                $crate::error::ErrorKind::$kind,
                $id,
                format!($($t)*),
            )),
            file!(),
            line!(),
        )
    };
}
