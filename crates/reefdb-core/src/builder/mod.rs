mod array;
mod object;

pub use array::ArrayBuilder;
pub use object::{ERRORS_FIELD, FIRST_ERROR_FIELD, ObjectBuilder, WARNINGS_FIELD};
