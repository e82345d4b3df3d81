pub mod jwt;

pub use jwt::{JwtAudience, JwtError, JwtService};
