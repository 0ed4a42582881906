pub mod preprocessing;
pub mod features;
pub mod clustering;
pub mod labeling;
pub mod extraction;

pub use preprocessing::*;
pub use features::*;
pub use clustering::*;
pub use labeling::*;
pub use extraction::*;
