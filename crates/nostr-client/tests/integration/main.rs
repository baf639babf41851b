//! Integration tests for the relay client against an in-process mock relay.

mod aggregator;
mod harness;
mod worker;
