//! Identity validation.
//!
//! An identity is the local part of a mail address; it is the unit written to
//! shadow route files. The domain part only decides *which* file.

pub mod validator;

pub use validator::{validate, EmailAddress};
