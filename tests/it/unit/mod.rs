//! Single-component tests, each driving one module in isolation.

mod connection_index_tests;
mod resolver_tests;
