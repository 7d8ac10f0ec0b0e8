//! Integration tests: end-to-end scenarios against deterministic mock
//! gateways, exercising the scanners, executor, risk manager, event log,
//! and orchestrator together.

mod mock_gateway;
mod scenarios;
