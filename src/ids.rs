//! Stable arena indices. The menu-node tree is cyclic (parent/list/next,
//! symbols back-pointing to their nodes and choice); rather than fight the
//! borrow checker with `Rc`/`Weak` everywhere we address everything through
//! these small `Copy` handles into the arenas owned by [`crate::Kconfig`].

use std::fmt;

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

arena_id!(SymbolId);
arena_id!(ChoiceId);
arena_id!(NodeId);
