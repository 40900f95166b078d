use rand::distr::{Alphanumeric, SampleString};

/// Reader, processor and writer contracts shared by every transport.
pub mod item;

/// Step runner driving a reader through a processor into a writer.
pub mod step;

/// Generates a random name consisting of alphanumeric characters.
///
/// # Returns
///
/// A `String` containing the generated random name.
fn build_name() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 8)
}
