//! Crate-private helpers shared across the channel, mailbox, and source
//! modules.

pub(crate) mod block_on;
pub(crate) mod cache_padded;
pub(crate) mod waiter;
