//! Core engine: select the payments behind the balance, then cash them out.

pub mod selector;
pub mod cashout;

pub use cashout::CashoutRunner;
pub use selector::select;
