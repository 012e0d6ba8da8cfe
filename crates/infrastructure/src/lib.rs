pub mod aws;
pub mod credentials;
pub mod dead_letter;
pub mod dynamodb;
pub mod webhook;

pub use aws::*;
pub use credentials::*;
pub use dead_letter::*;
pub use dynamodb::*;
pub use webhook::*;
