//! Macros for declaring machine states.

/// Declare a state enum and implement [`State`](crate::core::State) for it.
///
/// State names are the variant names, as written.
///
/// # Example
///
/// ```
/// use headless_machine::core::State;
/// use headless_machine::state_enum;
///
/// state_enum! {
///     pub enum SelectState {
///         Idle,
///         Focused,
///         Open,
///         Disposed,
///     }
///     final: [Disposed]
/// }
///
/// assert_eq!(SelectState::Open.name(), "Open");
/// assert!(SelectState::Disposed.is_final());
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }

        $(final: [$($final:ident),* $(,)?])?
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            fn is_final(&self) -> bool {
                match self {
                    $($(Self::$final => true,)*)?
                    #[allow(unreachable_patterns)]
                    _ => false,
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::core::State;

    state_enum! {
        enum TestState {
            Idle,
            PointerDown,
            Open,
            Disposed,
        }
        final: [Disposed]
    }

    #[test]
    fn state_enum_macro_generates_trait() {
        assert_eq!(TestState::Idle.name(), "Idle");
        assert_eq!(TestState::PointerDown.name(), "PointerDown");
        assert!(!TestState::Open.is_final());
        assert!(TestState::Disposed.is_final());
    }

    #[test]
    fn state_enum_supports_visibility() {
        state_enum! {
            pub enum PublicState {
                A,
                B,
            }
            final: [B]
        }

        assert_eq!(PublicState::A.name(), "A");
        assert!(PublicState::B.is_final());
    }

    #[test]
    fn state_enum_works_without_final() {
        state_enum! {
            enum MinimalState {
                One,
                Two,
            }
        }

        assert!(!MinimalState::One.is_final());
        assert_eq!(MinimalState::Two.name(), "Two");
    }
}
