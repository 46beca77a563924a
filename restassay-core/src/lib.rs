//! # restassay core
//!
//! Building blocks shared by the restassay test client and the mock server:
//!
//! - [`Matcher`] - a describable predicate over a value
//! - stock matchers ([`equal_to`], [`contains_string`], [`has_item`], ...)
//! - [`AssertionFailure`] - the error raised when a matcher rejects a value
//! - [`assert_that`] - check a value against a matcher with a reason
//!
//! ```
//! use restassay_core::{assert_that, contains_string, equal_to};
//!
//! assert!(assert_that("status", &200u16, &equal_to(200u16)).is_ok());
//!
//! let failure = assert_that("body", "<html/>", &contains_string("xml")).unwrap_err();
//! assert!(failure.message().contains("a string containing \"xml\""));
//! ```

mod failure;
mod matcher;

pub use failure::{AssertionFailure, assert_that};
pub use matcher::{
    Anything, ContainsString, EndsWith, EqualTo, HasItem, Matcher, MatchesPattern, Not,
    Predicate, StartsWith, anything, contains_string, ends_with, equal_to, has_item,
    matches_pattern, not, predicate, starts_with,
};
