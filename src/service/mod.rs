//! Write-side checks shared by the views.

mod validation;
pub use validation::RequestValidator;
