pub use enclose::*;

/// Builds a watch function, optionally capturing clones first.
///
/// ```ignore
/// scope.watch(watch_fn!(s => s.get("name")), listener!(|_, _, _| {}));
/// scope.watch(watch_fn!((counter) _s => counter.get()), listener!(|_, _, _| {}));
/// ```
#[macro_export]
macro_rules! watch_fn {
    (( $($d_tt:tt)* ) $s:tt => $($b:tt)*) => {
        $crate::macros::enclose!(($( $d_tt )*) move |$s: &$crate::Scope| -> $crate::Value { $crate::Value::from({ $($b)* }) })
    };
    ($s:tt => $($b:tt)*) => {
        move |$s: &$crate::Scope| -> $crate::Value { $crate::Value::from({ $($b)* }) }
    };
}

/// Builds a watch listener taking `(new, old, scope)`, optionally capturing
/// clones first.
#[macro_export]
macro_rules! listener {
    (( $($d_tt:tt)* ) |$n:tt, $o:tt, $s:tt| $($b:tt)*) => {
        $crate::macros::enclose!(($( $d_tt )*) move |$n: &$crate::Value, $o: &$crate::Value, $s: &$crate::Scope| { $($b)* })
    };
    (|$n:tt, $o:tt, $s:tt| $($b:tt)*) => {
        move |$n: &$crate::Value, $o: &$crate::Value, $s: &$crate::Scope| { $($b)* }
    };
}
