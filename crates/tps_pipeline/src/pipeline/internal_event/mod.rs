//! Metric and log emission for pipeline events.
//!
//! Each event registers its `metrics` handles once, when the emitting component is
//! built, and then records through the cached handles on every `emit`.

mod pipeline;

pub use pipeline::*;

/// Declares an event struct holding pre-registered metric handles.
///
/// ```ignore
/// registered_event! {
///     Example => {
///         hits: Counter = counter!("example_hits_total"),
///     }
///
///     fn emit(&self, count: u64) {
///         self.hits.increment(count);
///     }
/// }
/// ```
#[macro_export]
macro_rules! registered_event {
    (
        $event:ident => {
            $( $field:ident: $type:ty = $value:expr ),* $(,)?
        }

        fn emit(&$slf:ident, $data_name:ident: $data:ty) $emit_body:block
    ) => {
        #[derive(Clone)]
        pub struct $event {
            $( $field: $type, )*
        }

        impl $event {
            pub fn register() -> Self {
                Self {
                    $( $field: $value, )*
                }
            }

            pub fn emit(&$slf, $data_name: $data) $emit_body
        }

        impl std::fmt::Debug for $event {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(stringify!($event))
            }
        }
    };
}
