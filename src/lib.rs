//! # Elero Bridge Library
//!
//! Drive Elero radio-controlled roller shutters, awnings and lights through
//! a CC1101 serial radio bridge.
//!
//! The protocol core ([`elero`], [`blind`], [`dispatcher`], [`poller`],
//! [`scan`]) is synchronous and takes the current time as a parameter.
//! Only [`radio`] performs I/O.

pub mod blind;
pub mod config;
pub mod dispatcher;
pub mod elero;
pub mod error;
pub mod hub;
pub mod poller;
pub mod publisher;
pub mod radio;
pub mod scan;
