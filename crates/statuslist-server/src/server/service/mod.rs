//! HTTP surface of the status list service.
//!
//! ## Structure
//!
//! - [`handler`] - shared state, router assembly and the health check.
//! - [`rest`] - publication and revocation of a tenant's lists.
//! - [`messaging`] - `create` and `verify` events on `POST /events`.
//! - [`verify`] - the remote list check behind the `verify` event.

pub mod handler;
pub mod messaging;
pub mod rest;
pub mod verify;

#[cfg(test)]
mod tests;
