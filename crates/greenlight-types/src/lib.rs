pub mod validator;

pub use validator::{FieldErrors, Validator};
