//! Unit tests for individual components through the public API.

mod unit;
