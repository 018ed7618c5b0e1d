//! Document structure elements built on the object store: balanced name
//! trees and the document name dictionary, according to ISO 32000-1

mod name_tree;
mod names;

pub use name_tree::{check_limits, LimitsCheck, NameTree, BALANCE_TREE_MAX, BALANCE_TREE_MIN};
pub use names::{KnownTree, NamesDictionary};
