pub mod candidate;
pub mod feature;
pub mod intent;
pub mod validate;
