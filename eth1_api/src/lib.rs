pub use crate::{
    client_pool::{ExecutionClientPool, ForkWithClients, StaticClientPool},
    deposit_event::DepositEvent,
    eth1_api::Eth1Api,
    execution_client::{ExecutionClient, ExecutionHeader, ExecutionTransaction},
};

mod client_pool;
mod deposit_event;
mod eth1_api;
mod execution_client;
