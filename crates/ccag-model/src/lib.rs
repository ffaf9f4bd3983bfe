pub mod combinatorial;
pub mod error;
pub mod matrix;
pub mod model;
pub mod parse;
pub mod suite;
pub mod tuple;
pub mod types;

pub use error::ModelError;
pub use model::{CellState, CoverageModel, CoverageSnapshot};
pub use parse::{parse_casa, ParseError};
pub use suite::TestSuite;
pub use tuple::Tuple;
pub use types::{Clause, LiteralMap, TestCase, TestModel};
