pub mod env;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod normalize;
pub mod number;
pub mod ops;
pub mod parser;
pub mod session;

pub use error::EvalError;
pub use evaluator::evaluate;
pub use lexer::*;
pub use normalize::normalize;
pub use number::Number;
pub use session::{ErrorDisplay, Key, Session};
